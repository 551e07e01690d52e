//! Engine option types
//!
//! Immutable once constructed. `ImgOptions` validates its threshold up front
//! so a bad value fails at construction time, not mid-search.

use serde::{Deserialize, Serialize};

use crate::error::LocateError;

/// Recognition language, mapped to the tesseract traineddata code
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    French,
    German,
    Spanish,
    Italian,
    Portuguese,
    Dutch,
}

impl Language {
    pub fn tesseract_code(&self) -> &'static str {
        match self {
            Language::English => "eng",
            Language::French => "fra",
            Language::German => "deu",
            Language::Spanish => "spa",
            Language::Italian => "ita",
            Language::Portuguese => "por",
            Language::Dutch => "nld",
        }
    }
}

/// Options for the OCR phrase locator
///
/// The effective whitelist at search time is `whitelist_chars` extended with
/// every non-whitespace character of the phrase being searched, so phrases
/// containing characters outside the configured set still match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OcrOptions {
    /// Characters the recognizer is allowed to emit
    pub whitelist_chars: String,
    /// Extra words to bias the recognizer toward, beyond the phrase itself
    pub word_bias: Vec<String>,
    /// Restrict to the LSTM engine (oem 1) instead of the default (oem 3)
    pub lstm_only: bool,
    pub language: Language,
    /// Binarize with adaptive thresholding before recognition
    pub threshold_filter: bool,
    /// Upscale the image to the target DPI before recognition
    pub improve_dpi: bool,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            whitelist_chars: "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789"
                .to_string(),
            word_bias: Vec::new(),
            lstm_only: false,
            language: Language::English,
            threshold_filter: false,
            improve_dpi: true,
        }
    }
}

/// Options for the template-matching image locator
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ImgOptions {
    threshold: f32,
    color_match: bool,
}

impl Default for ImgOptions {
    fn default() -> Self {
        Self {
            threshold: 0.9,
            color_match: false,
        }
    }
}

impl ImgOptions {
    /// Build options with a similarity floor in `[0, 1]`
    pub fn new(threshold: f32, color_match: bool) -> Result<Self, LocateError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(LocateError::InvalidArgument(format!(
                "match threshold must be within [0, 1], got {threshold}"
            )));
        }
        Ok(Self {
            threshold,
            color_match,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn color_match(&self) -> bool {
        self.color_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_img_options_accepts_bounds() {
        assert!(ImgOptions::new(0.0, false).is_ok());
        assert!(ImgOptions::new(1.0, true).is_ok());
        assert!(ImgOptions::new(0.5, false).is_ok());
    }

    #[test]
    fn test_img_options_rejects_out_of_range() {
        assert!(matches!(
            ImgOptions::new(-0.1, false),
            Err(LocateError::InvalidArgument(_))
        ));
        assert!(matches!(
            ImgOptions::new(1.1, false),
            Err(LocateError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::English.tesseract_code(), "eng");
        assert_eq!(Language::French.tesseract_code(), "fra");
        assert_eq!(Language::default(), Language::English);
    }

    #[test]
    fn test_ocr_defaults_allow_alphanumerics() {
        let opts = OcrOptions::default();
        assert!(opts.whitelist_chars.contains('a'));
        assert!(opts.whitelist_chars.contains('Z'));
        assert!(opts.whitelist_chars.contains('7'));
        assert!(opts.improve_dpi);
        assert!(!opts.lstm_only);
    }
}
