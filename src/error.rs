//! Custom error types and result handling for pagebind operations.
//!
//! All operations return a [`Result<T>`] which is a type alias for `std::result::Result<T, Error>`.
//!
//! Errors fall in two groups. Page-level errors (a source image that cannot be
//! decoded, a page that cannot be encoded or written) are recorded as outcomes
//! and the job moves on to the next input. Everything else is structural and
//! terminates the job. See [`Error::is_page_level`].
use std::path::PathBuf;

/// Type alias for Results with pagebind errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all pagebind operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O errors from the standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Image processing errors
    #[error(transparent)]
    Image(#[from] image::ImageError),
    /// Async task join errors
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    ConfigBuilder(#[from] crate::job::JobConfigBuilderError),
    /// A source image could not be read or decoded
    #[error("Failed to decode '{path:?}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    /// A normalized page could not be encoded or written to the working directory
    #[error("Failed to encode page {page}: {message}")]
    Encode { page: usize, message: String },
    /// Directory or archive creation/writing failed; aborts the whole job
    #[error("Structural failure: {0}")]
    Structural(String),
    /// The job observed a stop request
    #[error("Conversion cancelled by user")]
    Cancelled,
    /// A job was asked to run on an empty input list
    #[error("No input images were provided")]
    EmptyInput,
    /// Error for invalid file or directory paths
    #[error("The given path '{0:?}' is invalid: {1}")]
    InvalidPath(PathBuf, String),
    /// Error for failed asynchronous tasks
    #[error("Asynchronous task failed: {0}")]
    AsyncTaskError(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// Other errors that don't fit into specific categories
    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Returns `true` for failures isolated to a single input image.
    ///
    /// These are turned into outcome records by the job; any other error
    /// ends the job in the `Failed` state (or `Cancelled` for [`Error::Cancelled`]).
    pub fn is_page_level(&self) -> bool {
        matches!(
            self,
            Error::Decode { .. } | Error::Encode { .. } | Error::Image(_)
        )
    }

    /// Wraps any displayable failure as a structural error, prefixed with context.
    pub(crate) fn structural(context: &str, err: impl std::fmt::Display) -> Self {
        Error::Structural(format!("{}: {}", context, err))
    }
}

impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::Other(error)
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Self {
        Error::Other(error.to_string())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}
