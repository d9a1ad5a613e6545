use std::path::Path;

use image::{DynamicImage, ImageError, ImageReader, Rgb, RgbImage};

use crate::error::{Error, Result};

/// Default matte colour for transparent sources.
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// An opaque RGB raster with the same dimensions as its source.
#[derive(Debug, Clone)]
pub struct NormalizedPage {
    image: RgbImage,
}

impl NormalizedPage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }
}

impl From<DynamicImage> for NormalizedPage {
    fn from(image: DynamicImage) -> Self {
        Self {
            image: flatten(image, WHITE),
        }
    }
}

/// Decodes `path` and flattens it onto `background`.
///
/// The format is sniffed from the file contents, so a mislabelled extension
/// still decodes. Any read or decode problem is reported as [`Error::Decode`].
pub fn normalize_image(path: &Path, background: Rgb<u8>) -> Result<NormalizedPage> {
    let decode_error = |source: ImageError| Error::Decode {
        path: path.to_path_buf(),
        source,
    };

    let image = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| decode_error(ImageError::IoError(e)))?
        .decode()
        .map_err(decode_error)?;

    Ok(NormalizedPage {
        image: flatten(image, background),
    })
}

/// Composites images carrying an alpha channel onto an opaque `background`
/// of the same size; images without alpha are converted to RGB unchanged.
///
/// Palette images arrive here already expanded to RGB(A) by the decoder.
pub fn flatten(image: DynamicImage, background: Rgb<u8>) -> RgbImage {
    if !image.color().has_alpha() {
        return image.into_rgb8();
    }

    let rgba = image.into_rgba8();
    let (width, height) = rgba.dimensions();
    let mut flattened = RgbImage::from_pixel(width, height, background);

    for (dst, src) in flattened.pixels_mut().zip(rgba.pixels()) {
        let alpha = src[3] as u32;
        for c in 0..3 {
            let fg = src[c] as u32;
            let bg = dst[c] as u32;
            dst[c] = ((fg * alpha + bg * (255 - alpha) + 127) / 255) as u8;
        }
    }

    flattened
}
