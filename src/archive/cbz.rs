use std::fs::File;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::archive::{
    ArchiveBuilder, create_archive_file, finish_archive, map_page, remove_partial, write_entry,
};
use crate::error::Result;
use crate::types::{EbookMetadata, PageFile};

/// A builder for CBZ (Comic Book ZIP) archives.
///
/// Each page file is stored at its base name (`page_001.jpg`, ...) with
/// deflate compression. No other entries are written.
pub struct ComicArchive {
    zip: Option<ZipWriter<File>>,
    options: SimpleFileOptions,
    output_path: PathBuf,
    page_count: usize,
}

#[async_trait]
impl ArchiveBuilder for ComicArchive {
    fn new(output_path: &Path) -> Result<Self> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        let file = create_archive_file(output_path)?;

        Ok(ComicArchive {
            zip: Some(ZipWriter::new(file)),
            options,
            output_path: output_path.to_path_buf(),
            page_count: 0,
        })
    }

    async fn add_page(&mut self, page: &PageFile) -> Result<&mut Self> {
        let mmap = map_page(page).await?;
        write_entry(&mut self.zip, page.file_name(), self.options, mmap).await?;
        self.page_count += 1;
        Ok(self)
    }

    async fn set_metadata(&mut self, _metadata: &EbookMetadata) -> Result<&mut Self> {
        debug!("CBZ archives carry no metadata entry");
        Ok(self)
    }

    async fn save(mut self) -> Result<PathBuf> {
        finish_archive(&mut self.zip, "Cannot finalize CBZ archive").await?;
        Ok(self.output_path)
    }

    fn discard(mut self) -> Result<()> {
        drop(self.zip.take());
        remove_partial(&self.output_path)
    }

    fn page_count(&self) -> usize {
        self.page_count
    }
}
