//! Archive builders turn a job's page files into the final output file.
//!
//! This module contains the common interface for builders and the two
//! format-specific implementations: [`cbz::ComicArchive`] and
//! [`epub::EbookPackage`].

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use memmap2::{Mmap, MmapOptions};
use tokio::task::spawn_blocking;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::{Error, Result};
use crate::path_utils::path_to_string_lossy;
use crate::types::{EbookMetadata, PageFile};

pub mod cbz;
pub mod epub;

/// Common interface for all archive builders.
///
/// The job drives a builder page by page so that it can poll for
/// cancellation between entries. Any error returned by a builder is
/// structural and ends the job.
#[async_trait]
pub trait ArchiveBuilder {
    /// Creates the archive file at `output_path` and writes any leading
    /// entries the format requires.
    ///
    /// The parent directory must already exist.
    fn new(output_path: &Path) -> Result<Self>
    where
        Self: Sized;

    /// Appends one page file. Pages must be added in ascending page order.
    async fn add_page(&mut self, page: &PageFile) -> Result<&mut Self>
    where
        Self: Sized;

    /// Sets package metadata. Formats without a metadata entry ignore it.
    async fn set_metadata(&mut self, metadata: &EbookMetadata) -> Result<&mut Self>
    where
        Self: Sized;

    /// Writes trailing entries, finalizes the archive and returns its path.
    async fn save(self) -> Result<PathBuf>;

    /// Drops the writer and deletes the partially written file.
    fn discard(self) -> Result<()>;

    /// Number of pages added so far.
    fn page_count(&self) -> usize;
}

/// Opens the output archive file, mapping failures to structural errors.
pub(crate) fn create_archive_file(output_path: &Path) -> Result<File> {
    File::create(output_path).map_err(|e| {
        Error::structural(
            &format!(
                "Cannot create archive '{}'",
                path_to_string_lossy(output_path)
            ),
            e,
        )
    })
}

/// Deletes a partially written archive; a file that is already gone is fine.
pub(crate) fn remove_partial(output_path: &Path) -> Result<()> {
    match std::fs::remove_file(output_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Memory-maps a page file for copying into an archive.
pub(crate) async fn map_page(page: &PageFile) -> Result<Mmap> {
    let path = page.path.clone();
    let file = File::open(&path).map_err(|e| {
        Error::structural(
            &format!("Cannot open page file '{}'", path_to_string_lossy(&path)),
            e,
        )
    })?;

    // SAFETY: page files live in the job's private working directory and are
    // not modified while the archive is being written.
    spawn_blocking(move || unsafe { MmapOptions::new().map(&file) })
        .await
        .map_err(|e| Error::AsyncTaskError(e.to_string()))?
        .map_err(|e| Error::structural("Cannot map page file", e))
}

/// Writes one entry on the blocking pool.
///
/// The writer is moved into the blocking task and put back afterwards. If the
/// task itself dies the writer is lost and later calls fail as structural
/// errors.
pub(crate) async fn write_entry<C>(
    zip: &mut Option<ZipWriter<File>>,
    name: String,
    options: SimpleFileOptions,
    content: C,
) -> Result<()>
where
    C: AsRef<[u8]> + Send + 'static,
{
    let mut writer = zip
        .take()
        .ok_or_else(|| Error::Structural("Zip writer not available".to_string()))?;

    let (writer, result) = spawn_blocking(move || {
        let result = writer
            .start_file(name.as_str(), options)
            .map_err(|e| Error::structural(&format!("Cannot start entry '{}'", name), e))
            .and_then(|_| {
                writer
                    .write_all(content.as_ref())
                    .map_err(|e| Error::structural(&format!("Cannot write entry '{}'", name), e))
            });
        (writer, result)
    })
    .await
    .map_err(|e| Error::AsyncTaskError(e.to_string()))?;

    *zip = Some(writer);
    result
}

/// Finalizes the central directory on the blocking pool.
pub(crate) async fn finish_archive(
    zip: &mut Option<ZipWriter<File>>,
    context: &str,
) -> Result<()> {
    let writer = zip
        .take()
        .ok_or_else(|| Error::Structural("Zip writer not available".to_string()))?;

    spawn_blocking(move || writer.finish())
        .await
        .map_err(|e| Error::AsyncTaskError(e.to_string()))?
        .map_err(|e| Error::structural(context, e))?;
    Ok(())
}

/// Escapes text for inclusion in XML element content and attribute values.
pub(crate) fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
