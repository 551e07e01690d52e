//! Screen capture collaborators
//!
//! `ScreenSource` is the capture capability the locator polls; it must
//! tolerate concurrent capture calls, each of which is independent and
//! side-effect-free. `PrimaryScreen` captures the primary display through the
//! screenshots crate; `StillImage` serves a fixed frame, for searching inside
//! a supplied image and for tests.

use async_trait::async_trait;
use image::RgbaImage;
use screenshots::Screen;
use tracing::debug;

use crate::error::LocateError;
use crate::geometry::{Point, Rect};

#[async_trait]
pub trait ScreenSource: Send + Sync {
    /// Capture the full frame. The display scale factor is already baked into
    /// the returned pixel coordinates.
    async fn capture_full(&self) -> Result<RgbaImage, LocateError>;
}

/// Live capture of the primary display
#[derive(Clone, Copy, Debug, Default)]
pub struct PrimaryScreen;

impl PrimaryScreen {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScreenSource for PrimaryScreen {
    async fn capture_full(&self) -> Result<RgbaImage, LocateError> {
        // Capture blocks; keep it off the async workers
        tokio::task::spawn_blocking(capture_primary)
            .await
            .map_err(|e| LocateError::Capture(e.to_string()))?
    }
}

fn capture_primary() -> Result<RgbaImage, LocateError> {
    let screens = Screen::all().map_err(|e| LocateError::Capture(e.to_string()))?;
    let screen = screens
        .first()
        .cloned()
        .ok_or_else(|| LocateError::Capture("no screens found".to_string()))?;
    let shot = screen
        .capture()
        .map_err(|e| LocateError::Capture(e.to_string()))?;
    debug!("captured {}x{} frame", shot.width(), shot.height());
    // Rebuild into our own image type; the screenshots crate re-exports its
    // own image version and the raw RGBA buffer is the stable boundary.
    let (width, height) = (shot.width(), shot.height());
    RgbaImage::from_raw(width, height, shot.into_raw())
        .ok_or_else(|| LocateError::Capture("capture buffer size mismatch".to_string()))
}

/// A fixed frame standing in for the screen
#[derive(Clone, Debug)]
pub struct StillImage {
    frame: RgbaImage,
}

impl StillImage {
    pub fn new(frame: RgbaImage) -> Self {
        Self { frame }
    }
}

#[async_trait]
impl ScreenSource for StillImage {
    async fn capture_full(&self) -> Result<RgbaImage, LocateError> {
        Ok(self.frame.clone())
    }
}

/// Crop a frame to `region`, clamped to the frame bounds. Pure; the frame is
/// untouched. Returns the crop plus the clamped origin actually used, which
/// is what matches found inside the crop must be re-offset by. A region
/// entirely outside the frame yields a zero-sized crop.
pub fn crop_to_region(frame: &RgbaImage, region: Rect) -> (RgbaImage, Point) {
    let x = region.x.clamp(0, frame.width() as i32) as u32;
    let y = region.y.clamp(0, frame.height() as i32) as u32;
    let width = region.width.min(frame.width() - x);
    let height = region.height.min(frame.height() - y);
    let cropped = image::imageops::crop_imm(frame, x, y, width, height).to_image();
    (cropped, Point::new(x as i32, y as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_still_image_serves_its_frame() {
        let frame = RgbaImage::from_pixel(8, 6, image::Rgba([1, 2, 3, 255]));
        let source = StillImage::new(frame.clone());
        let captured = source.capture_full().await.unwrap();
        assert_eq!(captured.as_raw(), frame.as_raw());
    }

    #[test]
    fn test_crop_within_bounds() {
        let mut frame = RgbaImage::new(20, 20);
        frame.put_pixel(12, 13, image::Rgba([9, 9, 9, 255]));
        let (cropped, origin) = crop_to_region(&frame, Rect::new(10, 10, 5, 5));
        assert_eq!(cropped.dimensions(), (5, 5));
        assert_eq!(origin, Point::new(10, 10));
        assert_eq!(cropped.get_pixel(2, 3), &image::Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn test_crop_clamps_to_frame() {
        let frame = RgbaImage::new(20, 20);
        let (cropped, origin) = crop_to_region(&frame, Rect::new(15, 18, 50, 50));
        assert_eq!(cropped.dimensions(), (5, 2));
        assert_eq!(origin, Point::new(15, 18));

        // A negative origin is clamped, and the clamped origin is reported
        let (cropped, origin) = crop_to_region(&frame, Rect::new(-3, -3, 10, 10));
        assert_eq!(cropped.dimensions(), (10, 10));
        assert_eq!(origin, Point::new(0, 0));
    }

    #[test]
    fn test_crop_outside_frame_is_zero_sized() {
        let frame = RgbaImage::new(20, 20);
        let (cropped, origin) = crop_to_region(&frame, Rect::new(100, 100, 10, 10));
        assert_eq!(cropped.dimensions(), (0, 0));
        assert_eq!(origin, Point::new(20, 20));
    }
}
