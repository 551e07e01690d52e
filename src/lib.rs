//! screen-scout - locate visual and textual targets on screen
//!
//! Finds a phrase (OCR) or a reference image (template matching) on the live
//! screen or inside a supplied image, waits for it with a racing poll loop,
//! and clicks it through an injected pointer.
//!
//! The two recognition engines are CPU-bound and run on the blocking pool; the
//! composite locator races one cancellable poll loop per configured search and
//! returns the first genuine match.

pub mod capture;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod input;
pub mod locator;
pub mod options;
pub mod spec;

pub use capture::{PrimaryScreen, ScreenSource, StillImage};
pub use engine::{ImageEngine, TextEngine};
pub use error::LocateError;
pub use geometry::{Point, Rect};
pub use input::{PointerActuator, SystemPointer};
pub use locator::{CompositeLocator, DEFAULT_TIMEOUT, POLL_INTERVAL};
pub use options::{ImgOptions, Language, OcrOptions};
pub use spec::{LocatorSpec, LocatorSpecBuilder, Target};
