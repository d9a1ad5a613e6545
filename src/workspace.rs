//! Job-private working directory.
//!
//! Each job owns one [`WorkDir`] named after its job id, so concurrent jobs in
//! the same process never share page files. The directory is created lazily
//! by the page encoder and removed by [`WorkDir::release`] on every exit path.

use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::PageFile;

lazy_static! {
    /// Matches page files written by the encoder ("page_001.jpg", "page_1000.jpg").
    pub static ref PAGE_FILE_REGEX: Regex = Regex::new(r"^page_(\d+)\.jpg$").unwrap();
}

/// Handle to a per-job temporary directory.
#[derive(Debug)]
pub struct WorkDir {
    root: PathBuf,
    released: bool,
}

impl WorkDir {
    /// Reserves `<parent>/pagebind-<job_id>` without touching the file system.
    ///
    /// `parent` defaults to the system temporary directory.
    pub fn new(parent: Option<&Path>, job_id: Uuid) -> Self {
        let parent = parent
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        Self {
            root: parent.join(format!("pagebind-{}", job_id)),
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Directory the encoder writes page files into.
    pub fn pages_dir(&self) -> PathBuf {
        self.root.join("pages")
    }

    /// Lists the page files present in [`pages_dir`](Self::pages_dir), sorted
    /// ascending by file name.
    ///
    /// Because page names are fixed-width, file name order equals page order.
    /// A missing directory (every page failed before the first write) yields
    /// an empty list.
    pub fn collect_page_files(&self) -> Result<Vec<PageFile>> {
        let dir = self.pages_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut pages = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(index) = PAGE_FILE_REGEX
                .captures(&name)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<usize>().ok())
            else {
                debug!("Skipping foreign file in working directory: {}", name);
                continue;
            };
            pages.push((name, PageFile {
                index,
                path: entry.path(),
            }));
        }

        pages.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(pages.into_iter().map(|(_, page)| page).collect())
    }

    /// Removes the directory and everything in it.
    ///
    /// A directory that was never created counts as released.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        remove_tree(&self.root)
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = remove_tree(&self.root) {
                warn!("Failed to remove working directory {:?}: {}", self.root, e);
            }
        }
    }
}

fn remove_tree(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}
