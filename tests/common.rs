//! Common test utilities and constants for the pagebind crate.
//!
//! Provides functions for setting up test directories, creating source
//! images of various colour modes, and inspecting produced archives.

use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use pagebind::progress::ConversionEvent;
use rand::{Rng, distributions::Alphanumeric};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use zip::CompressionMethod;

#[allow(dead_code)]
pub const TEST_TMP_DIR: &str = "tests/tmp";
#[allow(dead_code)]
pub const LONG_TEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Unique per-test directory layout.
#[allow(dead_code)]
pub struct TestDirs {
    pub base_dir: PathBuf,
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    pub work_dir: PathBuf,
}

/// Creates a clean test directory with source, target and work subdirectories.
#[allow(dead_code)]
pub fn setup_test_dirs(sub_path: &str) -> TestDirs {
    let rand_string: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let base_dir = PathBuf::from(TEST_TMP_DIR).join(format!("{}-{}", sub_path, rand_string));
    if base_dir.exists() {
        std::fs::remove_dir_all(&base_dir).unwrap();
    }
    let source_dir = base_dir.join("source");
    let target_dir = base_dir.join("target");
    let work_dir = base_dir.join("work");
    std::fs::create_dir_all(&source_dir).unwrap();
    std::fs::create_dir_all(&target_dir).unwrap();
    std::fs::create_dir_all(&work_dir).unwrap();

    TestDirs {
        base_dir,
        source_dir,
        target_dir,
        work_dir,
    }
}

/// Writes an opaque RGB image; the format follows the file extension.
#[allow(dead_code)]
pub fn create_rgb_image(path: &Path, width: u32, height: u32, color: Rgb<u8>) {
    RgbImage::from_pixel(width, height, color).save(path).unwrap();
}

/// Writes a PNG whose left half is opaque `color` and right half fully transparent.
#[allow(dead_code)]
pub fn create_half_transparent_png(path: &Path, width: u32, height: u32, color: Rgb<u8>) {
    let mut img = RgbaImage::new(width, height);
    for (x, _, pixel) in img.enumerate_pixels_mut() {
        *pixel = if x < width / 2 {
            Rgba([color[0], color[1], color[2], 255])
        } else {
            Rgba([0, 0, 0, 0])
        };
    }
    img.save_with_format(path, ImageFormat::Png).unwrap();
}

/// Writes an 8-bit indexed PNG: palette entry 0 is opaque red (left half),
/// entry 1 is blue with zero alpha in the tRNS chunk (right half).
#[allow(dead_code)]
pub fn create_indexed_png(path: &Path, width: u32, height: u32) {
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = png::Encoder::new(std::io::BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_palette(vec![255, 0, 0, 0, 0, 255]);
    encoder.set_trns(vec![255, 0]);

    let data: Vec<u8> = (0..height)
        .flat_map(|_| (0..width).map(move |x| if x < width / 2 { 0 } else { 1 }))
        .collect();
    let mut writer = encoder.write_header().unwrap();
    writer.write_image_data(&data).unwrap();
}

/// Writes bytes that no decoder accepts under an image extension.
#[allow(dead_code)]
pub fn create_corrupt_image(path: &Path) {
    std::fs::write(path, b"definitely not an image").unwrap();
}

/// Creates `count` valid JPEG sources named `img_01.jpg`, `img_02.jpg`, ...
#[allow(dead_code)]
pub fn create_sources(dir: &Path, count: usize) -> Vec<PathBuf> {
    (1..=count)
        .map(|i| {
            let path = dir.join(format!("img_{:02}.jpg", i));
            create_rgb_image(&path, 40, 60, Rgb([(i * 20) as u8, 100, 200]));
            path
        })
        .collect()
}

/// Entry names of a zip archive, in archive order.
#[allow(dead_code)]
pub fn zip_entry_names(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Compression method and content of each entry, in archive order.
#[allow(dead_code)]
pub fn zip_entries(path: &Path) -> Vec<(String, CompressionMethod, Vec<u8>)> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        entries.push((entry.name().to_string(), entry.compression(), content));
    }
    entries
}

/// Reads one entry of a zip archive as UTF-8 text.
#[allow(dead_code)]
pub fn zip_text(path: &Path, name: &str) -> String {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut content = String::new();
    entry.read_to_string(&mut content).unwrap();
    content
}

/// Drains every event a finished job has sent.
#[allow(dead_code)]
pub fn drain_events(rx: &mut UnboundedReceiver<ConversionEvent>) -> Vec<ConversionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Progress values in emission order.
#[allow(dead_code)]
pub fn progress_values(events: &[ConversionEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            ConversionEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .collect()
}

/// Asserts the directory is absent or empty.
#[allow(dead_code)]
pub fn assert_dir_empty(path: &Path) {
    if path.exists() {
        let leftovers: Vec<_> = std::fs::read_dir(path).unwrap().collect();
        assert!(leftovers.is_empty(), "Leftover files in {:?}: {:?}", path, leftovers);
    }
}
