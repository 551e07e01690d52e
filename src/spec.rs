//! Locator specs
//!
//! A `LocatorSpec` is an immutable, validated description of one search:
//! exactly one target (phrase or reference image), an optional bounding
//! region, and the options for that target's engine. The builder rejects
//! every inconsistent combination at `build()` time.

use image::DynamicImage;

use crate::error::LocateError;
use crate::geometry::Rect;
use crate::options::{ImgOptions, OcrOptions};

/// What to look for: a closed sum over the two target kinds
#[derive(Clone, Debug)]
pub enum Target {
    Phrase {
        phrase: String,
        options: OcrOptions,
    },
    Image {
        reference: DynamicImage,
        options: ImgOptions,
    },
}

/// One validated search description
#[derive(Clone, Debug)]
pub struct LocatorSpec {
    target: Target,
    region: Option<Rect>,
}

impl LocatorSpec {
    /// Spec locating a phrase anywhere on screen, with default OCR options
    pub fn phrase(phrase: impl Into<String>) -> Result<Self, LocateError> {
        LocatorSpecBuilder::default().phrase(phrase).build()
    }

    /// Spec locating a reference image anywhere on screen, with default options
    pub fn image(reference: DynamicImage) -> Result<Self, LocateError> {
        LocatorSpecBuilder::default().reference_image(reference).build()
    }

    pub fn builder() -> LocatorSpecBuilder {
        LocatorSpecBuilder::default()
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Region to crop the captured frame to, in full-frame coordinates
    pub fn region(&self) -> Option<Rect> {
        self.region
    }
}

#[derive(Debug, Default)]
pub struct LocatorSpecBuilder {
    phrase: Option<String>,
    reference: Option<DynamicImage>,
    region: Option<Rect>,
    ocr_options: Option<OcrOptions>,
    img_options: Option<ImgOptions>,
}

impl LocatorSpecBuilder {
    pub fn phrase(mut self, phrase: impl Into<String>) -> Self {
        self.phrase = Some(phrase.into());
        self
    }

    pub fn reference_image(mut self, reference: DynamicImage) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn region(mut self, region: Rect) -> Self {
        self.region = Some(region);
        self
    }

    pub fn ocr_options(mut self, options: OcrOptions) -> Self {
        self.ocr_options = Some(options);
        self
    }

    pub fn img_options(mut self, options: ImgOptions) -> Self {
        self.img_options = Some(options);
        self
    }

    pub fn build(self) -> Result<LocatorSpec, LocateError> {
        let target = match (self.phrase, self.reference) {
            (Some(_), Some(_)) => {
                return Err(LocateError::InvalidArgument(
                    "a locator spec takes a phrase or a reference image, not both".to_string(),
                ));
            }
            (None, None) => {
                return Err(LocateError::InvalidArgument(
                    "a locator spec needs a phrase or a reference image".to_string(),
                ));
            }
            (Some(phrase), None) => {
                if self.img_options.is_some() {
                    return Err(LocateError::InvalidArgument(
                        "image options supplied for a phrase spec".to_string(),
                    ));
                }
                if phrase.trim().is_empty() {
                    return Err(LocateError::InvalidArgument(
                        "search phrase is empty".to_string(),
                    ));
                }
                Target::Phrase {
                    phrase,
                    options: self.ocr_options.unwrap_or_default(),
                }
            }
            (None, Some(reference)) => {
                if self.ocr_options.is_some() {
                    return Err(LocateError::InvalidArgument(
                        "OCR options supplied for an image spec".to_string(),
                    ));
                }
                if reference.width() == 0 || reference.height() == 0 {
                    return Err(LocateError::InvalidArgument(
                        "reference image has no pixels".to_string(),
                    ));
                }
                Target::Image {
                    reference,
                    options: self.img_options.unwrap_or_default(),
                }
            }
        };
        Ok(LocatorSpec {
            target,
            region: self.region,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_image() -> DynamicImage {
        DynamicImage::ImageRgba8(image::RgbaImage::new(4, 4))
    }

    #[test]
    fn test_phrase_spec_builds() {
        let spec = LocatorSpec::phrase("Sign in").unwrap();
        assert!(matches!(spec.target(), Target::Phrase { phrase, .. } if phrase == "Sign in"));
        assert!(spec.region().is_none());
    }

    #[test]
    fn test_image_spec_builds_with_region() {
        let spec = LocatorSpec::builder()
            .reference_image(tiny_image())
            .region(Rect::new(10, 10, 100, 50))
            .build()
            .unwrap();
        assert!(matches!(spec.target(), Target::Image { .. }));
        assert_eq!(spec.region(), Some(Rect::new(10, 10, 100, 50)));
    }

    #[test]
    fn test_rejects_both_targets() {
        let err = LocatorSpec::builder()
            .phrase("ok")
            .reference_image(tiny_image())
            .build()
            .unwrap_err();
        assert!(matches!(err, LocateError::InvalidArgument(_)));
    }

    #[test]
    fn test_rejects_no_target() {
        let err = LocatorSpec::builder().build().unwrap_err();
        assert!(matches!(err, LocateError::InvalidArgument(_)));
    }

    #[test]
    fn test_rejects_mismatched_options() {
        let err = LocatorSpec::builder()
            .reference_image(tiny_image())
            .ocr_options(OcrOptions::default())
            .build()
            .unwrap_err();
        assert!(matches!(err, LocateError::InvalidArgument(_)));

        let err = LocatorSpec::builder()
            .phrase("ok")
            .img_options(ImgOptions::default())
            .build()
            .unwrap_err();
        assert!(matches!(err, LocateError::InvalidArgument(_)));
    }

    #[test]
    fn test_rejects_whitespace_phrase() {
        let err = LocatorSpec::phrase("   ").unwrap_err();
        assert!(matches!(err, LocateError::InvalidArgument(_)));
    }

    #[test]
    fn test_rejects_empty_reference() {
        let empty = DynamicImage::ImageRgba8(image::RgbaImage::new(0, 0));
        let err = LocatorSpec::image(empty).unwrap_err();
        assert!(matches!(err, LocateError::InvalidArgument(_)));
    }
}
