//! Composite locator - the racing poll loop
//!
//! One cancellable polling task per configured spec, all racing one deadline.
//! The race is "first success wins", never "first completion wins": a loop
//! that exits because it observed cancellation sends nothing, so it can never
//! be mistaken for a match. Winning (or the deadline elapsing) cancels the
//! shared token and every sibling stops at its next cancellation check.

use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, RgbaImage};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::capture::{self, ScreenSource};
use crate::engine::{ImageEngine, TextEngine};
use crate::error::LocateError;
use crate::geometry::Rect;
use crate::input::PointerActuator;
use crate::spec::{LocatorSpec, Target};

/// Wait deadline when the caller does not pick one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
/// Sleep between unsuccessful passes of one spec's loop
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Waits for the first of several independent searches to succeed, then
/// optionally clicks the result
///
/// Stateless between waits; every `wait_for`/`click` call owns its engines,
/// its cancellation scope, and the frames it captures.
pub struct CompositeLocator {
    specs: Vec<Arc<LocatorSpec>>,
    source: Arc<dyn ScreenSource>,
    pointer: Arc<dyn PointerActuator>,
}

// The capture and pointer collaborators are dyn objects without Debug
impl std::fmt::Debug for CompositeLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeLocator")
            .field("specs", &self.specs)
            .finish_non_exhaustive()
    }
}

impl CompositeLocator {
    pub fn new(
        specs: Vec<LocatorSpec>,
        source: Arc<dyn ScreenSource>,
        pointer: Arc<dyn PointerActuator>,
    ) -> Result<Self, LocateError> {
        if specs.is_empty() {
            return Err(LocateError::InvalidArgument(
                "a composite locator needs at least one spec".to_string(),
            ));
        }
        Ok(Self {
            specs: specs.into_iter().map(Arc::new).collect(),
            source,
            pointer,
        })
    }

    /// Locator for a single phrase with default OCR options
    pub fn for_phrase(
        phrase: impl Into<String>,
        source: Arc<dyn ScreenSource>,
        pointer: Arc<dyn PointerActuator>,
    ) -> Result<Self, LocateError> {
        Self::new(vec![LocatorSpec::phrase(phrase)?], source, pointer)
    }

    /// Locator for a single reference image with default options
    pub fn for_image(
        reference: DynamicImage,
        source: Arc<dyn ScreenSource>,
        pointer: Arc<dyn PointerActuator>,
    ) -> Result<Self, LocateError> {
        Self::new(vec![LocatorSpec::image(reference)?], source, pointer)
    }

    /// Wait until any spec matches; `LocateError::Timeout` when none does
    /// before the deadline
    pub async fn wait_for(&self, timeout: Duration) -> Result<Rect, LocateError> {
        match self.race(timeout).await? {
            Some(rect) => Ok(rect),
            None => Err(LocateError::Timeout(timeout)),
        }
    }

    /// `wait_for` with the default 15 second deadline
    pub async fn wait(&self) -> Result<Rect, LocateError> {
        self.wait_for(DEFAULT_TIMEOUT).await
    }

    /// Same search as `wait_for`, but absence is `Ok(None)` instead of an
    /// error. Validation and engine errors still surface as `Err`.
    pub async fn try_wait_for(&self, timeout: Duration) -> Result<Option<Rect>, LocateError> {
        self.race(timeout).await
    }

    /// Wait, then move the pointer to the match's center and click it
    pub async fn click(&self, timeout: Duration) -> Result<(), LocateError> {
        let rect = self.wait_for(timeout).await?;
        let center = rect.center();
        self.pointer.move_to(center.x, center.y).await?;
        self.pointer.primary_click().await?;
        Ok(())
    }

    /// Race one polling task per spec against the shared deadline
    ///
    /// `Ok(Some)` on the first genuine match, `Ok(None)` when the deadline
    /// elapses with every surviving loop still empty-handed. A hard error
    /// kills only its own loop; it is surfaced once no loop can win anymore,
    /// or at the deadline if nothing won.
    async fn race(&self, timeout: Duration) -> Result<Option<Rect>, LocateError> {
        let token = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel::<Result<Rect, LocateError>>(self.specs.len());

        for spec in &self.specs {
            tokio::spawn(poll_spec(
                Arc::clone(spec),
                Arc::clone(&self.source),
                token.clone(),
                tx.clone(),
            ));
        }
        drop(tx);

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut first_error: Option<LocateError> = None;
        let outcome = loop {
            tokio::select! {
                _ = &mut deadline => {
                    break match first_error.take() {
                        Some(e) => Err(e),
                        None => Ok(None),
                    };
                }
                msg = rx.recv() => match msg {
                    Some(Ok(rect)) => {
                        debug!("search won with {:?}", rect);
                        break Ok(Some(rect));
                    }
                    Some(Err(e)) => {
                        // Terminal for that loop only; siblings keep racing
                        warn!("search loop aborted: {}", e);
                        first_error.get_or_insert(e);
                    }
                    // Every loop has finished without a win
                    None => {
                        break match first_error.take() {
                            Some(e) => Err(e),
                            None => Ok(None),
                        };
                    }
                }
            }
        };
        token.cancel();
        outcome
    }
}

/// One spec's polling loop: capture, crop, recognize, retry until cancelled
///
/// Cancellation is checked before capturing and after the poll sleep; no
/// capture or recognition pass starts once it has been observed. "Nothing
/// found this pass" is always retried; a hard error ends the loop and is
/// reported through the channel.
async fn poll_spec(
    spec: Arc<LocatorSpec>,
    source: Arc<dyn ScreenSource>,
    token: CancellationToken,
    tx: mpsc::Sender<Result<Rect, LocateError>>,
) {
    loop {
        if token.is_cancelled() {
            return;
        }

        let frame = match source.capture_full().await {
            Ok(frame) => frame,
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
        };

        match recognition_pass(Arc::clone(&spec), frame).await {
            Ok(Some(rect)) => {
                let _ = tx.send(Ok(rect)).await;
                return;
            }
            Ok(None) => {}
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
        }

        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    }
}

/// One capture's recognition pass on the blocking pool
///
/// Returns the spec's first match, re-offset into full-frame coordinates by
/// the clamped crop origin when the spec carries a region. A region that
/// leaves no pixels to search is "not found this pass", never a hard error.
/// The pass owns `frame` and drops it on return.
async fn recognition_pass(
    spec: Arc<LocatorSpec>,
    frame: RgbaImage,
) -> Result<Option<Rect>, LocateError> {
    tokio::task::spawn_blocking(move || {
        let (frame, origin) = match spec.region() {
            Some(region) => {
                let (cropped, origin) = capture::crop_to_region(&frame, region);
                (cropped, origin)
            }
            None => (frame, crate::geometry::Point::new(0, 0)),
        };
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(None);
        }
        let img = DynamicImage::ImageRgba8(frame);
        let rects = match spec.target() {
            Target::Phrase { phrase, options } => {
                TextEngine::new(options.clone()).find(&img, phrase)?
            }
            Target::Image { reference, options } => {
                ImageEngine::new(*options).find(&img, reference)?
            }
        };
        // First match in the engine's own result order; deterministic
        Ok(rects.first().map(|r| r.offset(origin.x, origin.y)))
    })
    .await
    .map_err(|e| LocateError::Engine(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};

    use crate::capture::StillImage;
    use crate::options::ImgOptions;

    fn noise_image(width: u32, height: u32, seed: u32) -> RgbaImage {
        let mut state = seed;
        let mut next = move || {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        };
        RgbaImage::from_fn(width, height, |_, _| {
            Rgba([next(), next(), next(), 255])
        })
    }

    /// A 200x150 scene with a recognizable 20x20 patch pasted at (60, 90)
    fn scene_with_patch() -> (RgbaImage, RgbaImage) {
        let patch = noise_image(20, 20, 77);
        let mut scene = noise_image(200, 150, 3);
        image::imageops::replace(&mut scene, &patch, 60, 90);
        (scene, patch)
    }

    fn image_spec(reference: RgbaImage) -> LocatorSpec {
        LocatorSpec::image(DynamicImage::ImageRgba8(reference)).unwrap()
    }

    #[derive(Default)]
    struct RecordingPointer {
        moves: Mutex<Vec<(i32, i32)>>,
        clicks: Mutex<u32>,
    }

    #[async_trait]
    impl PointerActuator for RecordingPointer {
        async fn move_to(&self, x: i32, y: i32) -> Result<(), LocateError> {
            self.moves.lock().unwrap().push((x, y));
            Ok(())
        }

        async fn primary_click(&self) -> Result<(), LocateError> {
            *self.clicks.lock().unwrap() += 1;
            Ok(())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl ScreenSource for FailingSource {
        async fn capture_full(&self) -> Result<RgbaImage, LocateError> {
            Err(LocateError::Capture("display went away".to_string()))
        }
    }

    fn locator(specs: Vec<LocatorSpec>, scene: RgbaImage) -> (CompositeLocator, Arc<RecordingPointer>) {
        let pointer = Arc::new(RecordingPointer::default());
        let locator = CompositeLocator::new(
            specs,
            Arc::new(StillImage::new(scene)),
            pointer.clone(),
        )
        .unwrap();
        (locator, pointer)
    }

    #[test]
    fn test_locator_is_debuggable() {
        let (scene, patch) = scene_with_patch();
        let (locator, _) = locator(vec![image_spec(patch)], scene);
        let rendered = format!("{:?}", locator);
        assert!(rendered.starts_with("CompositeLocator"));
    }

    #[test]
    fn test_rejects_empty_spec_list() {
        let err = CompositeLocator::new(
            Vec::new(),
            Arc::new(StillImage::new(RgbaImage::new(4, 4))),
            Arc::new(RecordingPointer::default()),
        )
        .unwrap_err();
        assert!(matches!(err, LocateError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_present_image_found_promptly() {
        let (scene, patch) = scene_with_patch();
        let (locator, _) = locator(vec![image_spec(patch)], scene);

        let started = Instant::now();
        let rect = locator.try_wait_for(Duration::from_secs(5)).await.unwrap();
        assert_eq!(rect, Some(Rect::new(60, 90, 20, 20)));
        // One pass, not the full timeout
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_absent_image_times_out_not_earlier() {
        let (scene, _) = scene_with_patch();
        let absent = noise_image(20, 20, 1234);
        let (locator, _) = locator(vec![image_spec(absent)], scene);

        let timeout = Duration::from_millis(300);
        let started = Instant::now();
        let err = locator.wait_for(timeout).await.unwrap_err();
        assert!(matches!(err, LocateError::Timeout(_)));
        assert!(started.elapsed() >= timeout);
    }

    #[tokio::test]
    async fn test_try_wait_for_absence_is_ok_none() {
        let (scene, _) = scene_with_patch();
        let absent = noise_image(20, 20, 4321);
        let (locator, _) = locator(vec![image_spec(absent)], scene);

        let found = locator.try_wait_for(Duration::from_millis(250)).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_first_success_wins_over_absent_sibling() {
        let (scene, patch) = scene_with_patch();
        let absent = noise_image(20, 20, 555);
        let (locator, _) = locator(vec![image_spec(absent), image_spec(patch)], scene);

        let started = Instant::now();
        let rect = locator.try_wait_for(Duration::from_secs(5)).await.unwrap();
        assert_eq!(rect, Some(Rect::new(60, 90, 20, 20)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_region_match_reoffset_to_full_frame() {
        let (scene, patch) = scene_with_patch();
        let spec = LocatorSpec::builder()
            .reference_image(DynamicImage::ImageRgba8(patch))
            .region(Rect::new(50, 80, 60, 50))
            .build()
            .unwrap();
        let (locator, _) = locator(vec![spec], scene);

        let rect = locator.try_wait_for(Duration::from_secs(5)).await.unwrap();
        // (10, 10) inside the region, re-based to the frame
        assert_eq!(rect, Some(Rect::new(60, 90, 20, 20)));
    }

    #[tokio::test]
    async fn test_region_past_frame_edge_offsets_by_clamped_origin() {
        // Region origin clamps to (0, 0); the match must still come back at
        // the patch's true frame position, not shifted by the clamp amount
        let patch = noise_image(20, 20, 77);
        let mut scene = noise_image(200, 150, 3);
        image::imageops::replace(&mut scene, &patch, 10, 10);

        let spec = LocatorSpec::builder()
            .reference_image(DynamicImage::ImageRgba8(patch))
            .region(Rect::new(-5, -5, 60, 60))
            .build()
            .unwrap();
        let (locator, _) = locator(vec![spec], scene);

        let rect = locator.try_wait_for(Duration::from_secs(5)).await.unwrap();
        assert_eq!(rect, Some(Rect::new(10, 10, 20, 20)));
    }

    #[tokio::test]
    async fn test_region_entirely_outside_frame_is_not_found() {
        // No pixels to search: each pass is empty-handed, never a hard error
        let (scene, patch) = scene_with_patch();
        let spec = LocatorSpec::builder()
            .reference_image(DynamicImage::ImageRgba8(patch))
            .region(Rect::new(500, 500, 50, 50))
            .build()
            .unwrap();
        let (locator, _) = locator(vec![spec], scene);

        let found = locator.try_wait_for(Duration::from_millis(250)).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_capture_error_surfaces_without_waiting_out_the_clock() {
        let pointer = Arc::new(RecordingPointer::default());
        let locator = CompositeLocator::new(
            vec![image_spec(noise_image(8, 8, 2))],
            Arc::new(FailingSource),
            pointer,
        )
        .unwrap();

        let started = Instant::now();
        let err = locator.wait_for(Duration::from_secs(10)).await.unwrap_err();
        assert!(matches!(err, LocateError::Capture(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_oversized_sibling_does_not_mask_win() {
        // One spec can never match (reference larger than the frame), the
        // other matches on the first pass
        let (scene, patch) = scene_with_patch();
        let oversized = noise_image(400, 400, 9);
        let (locator, _) = locator(vec![image_spec(oversized), image_spec(patch)], scene);

        let rect = locator.try_wait_for(Duration::from_secs(5)).await.unwrap();
        assert_eq!(rect, Some(Rect::new(60, 90, 20, 20)));
    }

    #[tokio::test]
    async fn test_click_moves_to_center_and_clicks() {
        let (scene, patch) = scene_with_patch();
        let (locator, pointer) = locator(vec![image_spec(patch)], scene);

        locator.click(Duration::from_secs(5)).await.unwrap();
        assert_eq!(pointer.moves.lock().unwrap().as_slice(), &[(70, 100)]);
        assert_eq!(*pointer.clicks.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_tight_threshold_via_spec_options() {
        // A reference that only half-overlaps any window cannot reach 0.9
        let (scene, patch) = scene_with_patch();
        let mut shifted = noise_image(20, 20, 1000);
        image::imageops::replace(
            &mut shifted,
            &image::imageops::crop_imm(&patch, 0, 0, 10, 20).to_image(),
            0,
            0,
        );
        let spec = LocatorSpec::builder()
            .reference_image(DynamicImage::ImageRgba8(shifted))
            .img_options(ImgOptions::new(0.9, false).unwrap())
            .build()
            .unwrap();
        let (locator, _) = locator(vec![spec], scene);

        let found = locator.try_wait_for(Duration::from_millis(250)).await.unwrap();
        assert!(found.is_none());
    }
}
