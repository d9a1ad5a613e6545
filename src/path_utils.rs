//! Path utilities for output naming and safe path handling.
//!
//! Covers the base-name rules for output archives, the output location
//! layout (`<target>[/<FORMAT>_Converted]/<name>.<ext>`), and Windows long
//! path support for the archive file itself.

use crate::error::{Error, Result};
use crate::types::FileFormat;

use std::path::{Path, PathBuf};

/// Maximum path length for Windows without long path support
const WINDOWS_MAX_PATH: usize = 260;

/// Windows long path prefix
const WINDOWS_LONG_PATH_PREFIX: &str = r"\\?\";

/// Characters that are never allowed in an archive base name.
const RESERVED_NAME_CHARS: &[char] = &['<', '>', '"', '|', '?', '*', ':', '/', '\\'];

/// Gets the file name from a path with fallback to lossy conversion.
pub fn get_file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Converts a path to a string with fallback to lossy conversion.
pub fn path_to_string_lossy(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Checks a path for characters that break archive creation on common file systems.
///
/// # Arguments
///
/// * `path` - The path to validate
///
/// # Returns
///
/// * `Result<()>` - Ok if the path is valid, or an error describing the issue
pub fn validate_path(path: &Path) -> Result<()> {
    let path_str = path_to_string_lossy(path);

    // Skip validation for Windows long path prefix (\\?\) which contains a valid question mark
    let path_to_check = path_str
        .strip_prefix(WINDOWS_LONG_PATH_PREFIX)
        .unwrap_or(&path_str);

    if path_to_check
        .chars()
        .any(|c| matches!(c, '<' | '>' | '"' | '|' | '?' | '*'))
    {
        return Err(Error::InvalidPath(
            path.to_path_buf(),
            "Path contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

/// Prepares a path for Windows long path support if needed.
///
/// The path must already exist when the prefix is required, since the
/// prefixed form has to be absolute.
pub fn prepare_long_path(path: &Path) -> Result<PathBuf> {
    let path_str = path_to_string_lossy(path);

    if cfg!(windows)
        && path_str.len() > WINDOWS_MAX_PATH
        && !path_str.starts_with(WINDOWS_LONG_PATH_PREFIX)
    {
        let absolute_path = path.canonicalize().map_err(|e| {
            Error::InvalidPath(
                path.to_path_buf(),
                format!("Cannot canonicalize path: {}", e),
            )
        })?;
        Ok(PathBuf::from(format!(
            "{}{}",
            WINDOWS_LONG_PATH_PREFIX,
            path_to_string_lossy(&absolute_path)
        )))
    } else {
        Ok(path.to_path_buf())
    }
}

/// Reduces a user-supplied name to the safe base-name character set:
/// alphanumerics, spaces, `-` and `_`, trimmed.
///
/// Callers collecting a file name interactively should run it through this
/// before building a [`JobConfig`](crate::job::JobConfig).
pub fn sanitize_base_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Checks that a base name can be used verbatim as an archive file stem.
pub fn validate_base_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Other("Output file name is required".to_string()));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidPath(
            PathBuf::from(name),
            "Output file name cannot be a relative directory".to_string(),
        ));
    }
    if name
        .chars()
        .any(|c| c.is_control() || RESERVED_NAME_CHARS.contains(&c))
    {
        return Err(Error::InvalidPath(
            PathBuf::from(name),
            "Output file name contains reserved characters".to_string(),
        ));
    }
    Ok(())
}

/// Directory the archive lands in: the target path, optionally nested under
/// a format-named subdirectory.
pub fn output_directory(target: &Path, format: FileFormat, use_format_subdirectory: bool) -> PathBuf {
    if use_format_subdirectory {
        target.join(format.subdirectory_name())
    } else {
        target.to_path_buf()
    }
}

/// Full archive path: `<target>[/<FORMAT>_Converted]/<name>.<ext>`.
pub fn output_path(
    target: &Path,
    format: FileFormat,
    use_format_subdirectory: bool,
    base_name: &str,
) -> PathBuf {
    output_directory(target, format, use_format_subdirectory)
        .join(format!("{}.{}", base_name, format.extension()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_file_name_lossy() {
        let path = Path::new("test/file.txt");
        assert_eq!(get_file_name_lossy(path), "file.txt");
        assert_eq!(get_file_name_lossy(Path::new("/")), "unknown");
    }

    #[test]
    fn test_validate_path_with_invalid_chars() {
        assert!(validate_path(Path::new("test<invalid>path")).is_err());
        assert!(validate_path(Path::new("out/CBZ_Converted")).is_ok());
    }

    #[test]
    fn test_sanitize_base_name() {
        assert_eq!(sanitize_base_name("  My Comic: Vol. 1!  "), "My Comic Vol 1");
        assert_eq!(sanitize_base_name("chapitre_été-2"), "chapitre_été-2");
        assert_eq!(sanitize_base_name("../../etc"), "etc");
        assert_eq!(sanitize_base_name("???"), "");
    }

    #[test]
    fn test_validate_base_name() {
        assert!(validate_base_name("out").is_ok());
        assert!(validate_base_name("My Comic - 01").is_ok());
        assert!(validate_base_name("").is_err());
        assert!(validate_base_name("   ").is_err());
        assert!(validate_base_name("..").is_err());
        assert!(validate_base_name("a/b").is_err());
        assert!(validate_base_name("a:b").is_err());
    }

    #[test]
    fn test_output_path_layout() {
        let target = Path::new("/books");
        assert_eq!(
            output_path(target, FileFormat::Cbz, true, "out"),
            PathBuf::from("/books/CBZ_Converted/out.cbz")
        );
        assert_eq!(
            output_path(target, FileFormat::Epub, false, "out"),
            PathBuf::from("/books/out.epub")
        );
    }
}
