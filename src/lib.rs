//! pagebind - Image to Comic Archive / E-book Conversion Library
//!
//! This crate converts an ordered list of raster images into either a CBZ
//! comic archive (a zip of numbered JPEG pages) or an EPUB package (one
//! XHTML page per image, with OPF manifest and NCX navigation).
//!
//! A conversion runs as a [`ConversionJob`]: each image is decoded, flattened
//! onto an opaque background, written as a numbered JPEG into a job-private
//! working directory, and finally packed into the archive. Progress, status
//! text and per-page outcomes are delivered as [`progress::ConversionEvent`]s;
//! the job can be stopped cooperatively through its [`CancelToken`].
//!
//! # Getting Started
//!
//! ```rust,no_run
//! use pagebind::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> pagebind::error::Result<()> {
//!     let config = JobConfig::builder()
//!         .target_path(PathBuf::from("./converted"))
//!         .file_name("My Comic")
//!         .output_format(FileFormat::Epub)
//!         .build()?;
//!
//!     let inputs = vec![PathBuf::from("a.png"), PathBuf::from("b.jpg")];
//!     let (events, mut receiver) = event_channel();
//!     let job = ConversionJob::new(config, inputs)?.with_sink(events);
//!     let handle = job.spawn();
//!
//!     while let Some(event) = receiver.recv().await {
//!         match event {
//!             ConversionEvent::Progress(p) => println!("{}%", p),
//!             ConversionEvent::Status(text) => println!("{}", text),
//!             ConversionEvent::Page(outcome) if !outcome.success => {
//!                 println!("Skipped {:?}: {:?}", outcome.source, outcome.message)
//!             }
//!             ConversionEvent::Finished(report) => {
//!                 println!("{} -> success: {}", report.file_name, report.success);
//!                 break;
//!             }
//!             _ => {}
//!         }
//!     }
//!
//!     handle.join().await?;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod error;
pub mod job;
pub mod page;
pub mod path_utils;
pub mod progress;
pub mod types;
pub mod workspace;

pub use job::{CancelToken, ConversionJob, JobConfig, JobConfigBuilder, JobHandle};

// Re-export error and core types for direct access
pub use types::{
    EbookMetadata, FileFormat, JobReport, JobState, PageFile, PageNaming, PageOutcome,
};

/// Prelude module for convenient imports.
///
/// Re-exports the most commonly used types and traits, allowing you to
/// import everything you need with a single `use pagebind::prelude::*;` statement.
pub mod prelude {
    pub use super::{
        CancelToken, ConversionJob, EbookMetadata, FileFormat, JobConfig, JobConfigBuilder,
        JobHandle, JobReport, JobState, PageFile, PageNaming, PageOutcome, error, types,
    };
    pub use crate::archive::ArchiveBuilder;
    pub use crate::archive::cbz::ComicArchive;
    pub use crate::archive::epub::EbookPackage;
    pub use crate::progress::{
        ConversionEvent, FnSink, NoopSink, ProgressSink, SharedSink, event_channel,
    };
    pub use std::path::{Path, PathBuf};
    pub use std::sync::Arc;
}
