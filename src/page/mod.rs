//! Per-image processing: decode and flatten a source image, then write it as
//! a numbered JPEG page.
//!
//! Both steps are blocking; the job runs them inside `spawn_blocking`, one
//! image at a time.

mod encode;
mod normalize;

pub use encode::{DEFAULT_JPEG_QUALITY, encode_page};
pub use normalize::{NormalizedPage, WHITE, flatten, normalize_image};
