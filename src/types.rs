//! Core data types, enums, and reports for the pagebind conversion library.
//!
//! This module defines the fundamental data structures used throughout pagebind:
//! - Output selection (`FileFormat`)
//! - Job lifecycle (`JobState`)
//! - Page files on temporary storage (`PageFile`, `PageNaming`)
//! - Per-item and final results (`PageOutcome`, `JobReport`)
//! - E-book package metadata (`EbookMetadata`)

use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Defines the output file format for the generated archive.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub enum FileFormat {
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "CBZ"))]
    Cbz,
    #[cfg_attr(feature = "serde", serde(rename = "EPUB"))]
    Epub,
}

impl FileFormat {
    /// File extension of the final archive, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Cbz => "cbz",
            FileFormat::Epub => "epub",
        }
    }

    /// Upper-case label used in status text and the optional output subdirectory.
    pub fn label(&self) -> &'static str {
        match self {
            FileFormat::Cbz => "CBZ",
            FileFormat::Epub => "EPUB",
        }
    }

    /// Name of the subdirectory used when output is nested by format (e.g. `CBZ_Converted`).
    pub fn subdirectory_name(&self) -> String {
        format!("{}_Converted", self.label())
    }

    /// Upper bound (in percent) of the image processing phase.
    pub(crate) fn processing_ceiling(&self) -> u8 {
        match self {
            FileFormat::Cbz => 80,
            FileFormat::Epub => 60,
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for FileFormat {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cbz" | "comic" => Ok(FileFormat::Cbz),
            "epub" | "ebook" => Ok(FileFormat::Epub),
            other => Err(crate::error::Error::Unsupported(format!(
                "Output format {:?}",
                other
            ))),
        }
    }
}

/// Lifecycle of a conversion job.
///
/// `Idle -> Running -> {Completed, Cancelled, Failed}`. `Running` is entered once.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub enum JobState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Cancelled | JobState::Failed
        )
    }
}

/// Fixed-width page numbering shared by page files, archive entries and manifest ids.
///
/// The width is at least 3 digits and grows with the page count, so that
/// `page_NNN` names always sort lexicographically in page order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNaming {
    width: usize,
}

impl PageNaming {
    pub const MIN_WIDTH: usize = 3;

    /// Naming scheme for a job with `page_count` inputs.
    pub fn for_count(page_count: usize) -> Self {
        let digits = page_count.max(1).to_string().len();
        Self {
            width: digits.max(Self::MIN_WIDTH),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// `page_001` style stem for a 1-based page index.
    pub fn stem(&self, index: usize) -> String {
        format!("page_{:0width$}", index, width = self.width)
    }

    /// `page_001.jpg`
    pub fn image_name(&self, index: usize) -> String {
        format!("{}.jpg", self.stem(index))
    }

    /// `page_001.xhtml`
    pub fn markup_name(&self, index: usize) -> String {
        format!("{}.xhtml", self.stem(index))
    }
}

impl Default for PageNaming {
    fn default() -> Self {
        Self {
            width: Self::MIN_WIDTH,
        }
    }
}

/// A JPEG page written to the job's working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFile {
    /// 1-based position of the source image in the input list.
    pub index: usize,
    pub path: PathBuf,
}

impl PageFile {
    /// Base name of the page file (e.g. `page_001.jpg`).
    pub fn file_name(&self) -> String {
        crate::path_utils::get_file_name_lossy(&self.path)
    }
}

/// Result of processing one input image.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PageOutcome {
    /// 1-based position in the input list.
    pub index: usize,
    pub source: PathBuf,
    pub success: bool,
    /// Failure description; `None` on success.
    pub message: Option<String>,
}

impl PageOutcome {
    pub fn converted(index: usize, source: PathBuf) -> Self {
        Self {
            index,
            source,
            success: true,
            message: None,
        }
    }

    pub fn failed(index: usize, source: PathBuf, message: impl Into<String>) -> Self {
        Self {
            index,
            source,
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Final result of a job. Always the last thing a job reports.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JobReport {
    /// Archive file name (e.g. `out.cbz`).
    pub file_name: String,
    /// Full path of the written archive; `None` unless the job completed.
    pub output_path: Option<PathBuf>,
    pub success: bool,
    pub state: JobState,
    pub pages_written: usize,
    pub pages_failed: usize,
    /// Diagnostic for failed or cancelled jobs.
    pub message: Option<String>,
}

/// Metadata embedded in the e-book package.
///
/// Every field has a deterministic default so that identical inputs produce
/// identical `content.opf` and `toc.ncx` files.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EbookMetadata {
    /// Book title; the job falls back to the output base name when empty.
    pub title: String,
    pub creator: String,
    pub language: String, // e.g. "en", "fr"
    /// Full identifier (e.g. `urn:isbn:...`); a name-based UUID is derived when absent.
    pub identifier: Option<String>,
}

impl EbookMetadata {
    pub const DEFAULT_CREATOR: &'static str = "pagebind";
    pub const DEFAULT_LANGUAGE: &'static str = "en";

    /// Creates metadata with a title and the default creator and language.
    pub fn default_with_title(title: String) -> Self {
        Self {
            title,
            creator: Self::DEFAULT_CREATOR.to_string(),
            language: Self::DEFAULT_LANGUAGE.to_string(),
            identifier: None,
        }
    }

    /// Fills empty fields so the package always carries a title, creator,
    /// language and identifier.
    pub(crate) fn resolved(&self, base_name: &str) -> Self {
        let pick = |value: &str, fallback: &str| {
            if value.trim().is_empty() {
                fallback.to_string()
            } else {
                value.to_string()
            }
        };
        let identifier = match &self.identifier {
            Some(id) if !id.trim().is_empty() => id.clone(),
            _ => format!(
                "urn:uuid:{}",
                uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_URL, base_name.as_bytes())
            ),
        };
        Self {
            title: pick(&self.title, base_name),
            creator: pick(&self.creator, Self::DEFAULT_CREATOR),
            language: pick(&self.language, Self::DEFAULT_LANGUAGE),
            identifier: Some(identifier),
        }
    }
}
