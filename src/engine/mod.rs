//! Recognition engines
//!
//! Two unrelated engines share one contract: given a raster image and a
//! target, return every sufficiently strong match as a rectangle in the image
//! coordinate space the caller handed in. Both are CPU-bound and synchronous;
//! the composite locator runs them on the blocking pool.

pub mod image;
pub mod text;

pub use image::ImageEngine;
pub use text::TextEngine;

use crate::geometry::Rect;

/// A recognized word and its bounding box, in working-image pixels
#[derive(Clone, Debug)]
pub(crate) struct WordBox {
    pub text: String,
    pub rect: Rect,
}
