use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;

use crate::error::{Error, Result};
use crate::page::NormalizedPage;
use crate::types::{PageFile, PageNaming};

/// JPEG quality used for every page unless configured otherwise.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Writes `page` as `<dir>/page_NNN.jpg` for the 1-based `index`.
///
/// `dir` is created on first use. Every failure (directory creation, file
/// creation, encoding) is reported as [`Error::Encode`] for this page.
pub fn encode_page(
    page: &NormalizedPage,
    index: usize,
    naming: PageNaming,
    dir: &Path,
    quality: u8,
) -> Result<PageFile> {
    let encode_error = |message: String| Error::Encode {
        page: index,
        message,
    };

    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            encode_error(format!("Cannot create working directory {:?}: {}", dir, e))
        })?;
    }

    let path = dir.join(naming.image_name(index));
    let file = File::create(&path)
        .map_err(|e| encode_error(format!("Cannot create {:?}: {}", path, e)))?;

    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, quality)
        .encode_image(page.as_image())
        .map_err(|e| encode_error(e.to_string()))?;
    writer
        .flush()
        .map_err(|e| encode_error(format!("Cannot write {:?}: {}", path, e)))?;

    Ok(PageFile { index, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("pagebind-encode-{}-{}", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_encode_creates_directory_and_named_file() {
        let dir = scratch_dir("named");
        let page = NormalizedPage::from(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            20,
            10,
            Rgb([10, 200, 30]),
        )));

        let file = encode_page(&page, 7, PageNaming::default(), &dir, DEFAULT_JPEG_QUALITY)
            .unwrap();
        assert_eq!(file.index, 7);
        assert_eq!(file.file_name(), "page_007.jpg");
        assert!(file.path.is_file());

        let decoded = image::open(&file.path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (20, 10));
        assert!(!decoded.color().has_alpha());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_encode_into_unwritable_location_is_page_error() {
        let dir = scratch_dir("blocked");
        fs::create_dir_all(dir.parent().unwrap()).unwrap();
        // A regular file where the directory should be
        fs::write(&dir, b"not a directory").unwrap();

        let page = NormalizedPage::from(DynamicImage::ImageRgb8(RgbImage::new(2, 2)));
        let err = encode_page(&page, 1, PageNaming::default(), &dir, 95).unwrap_err();
        assert!(matches!(err, Error::Encode { page: 1, .. }));

        let _ = fs::remove_file(&dir);
    }
}
