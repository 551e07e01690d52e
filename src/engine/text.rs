//! OCR phrase locator
//!
//! Locates a whitespace-delimited phrase by running word-level recognition in
//! sparse-text mode and sliding a window over the recognized words. Word
//! segmentation makes single-shot multi-word matching unreliable, so the
//! phrase box is assembled as the union of its word boxes.
//!
//! Preprocessing (binarization, DPI upscale) happens on a working copy; every
//! returned rectangle is remapped back into the caller's coordinate space.

use std::collections::HashMap;
use std::io::Write;

use image::imageops::FilterType;
use image::DynamicImage;
use rusty_tesseract::{Args, Image};
use tempfile::NamedTempFile;
use tracing::debug;

use super::WordBox;
use crate::error::LocateError;
use crate::geometry::Rect;
use crate::options::OcrOptions;

/// DPI the working image is upscaled to when `improve_dpi` is set
const TARGET_DPI: u32 = 300;
/// Captures carry no DPI metadata; treat them as standard desktop density
const BASE_DPI: u32 = 96;
/// Block radius for adaptive thresholding
const THRESHOLD_BLOCK_RADIUS: u32 = 12;
/// Sparse text: find as much text as possible in no particular order
const PSM_SPARSE_TEXT: i32 = 11;

pub struct TextEngine {
    options: OcrOptions,
}

impl TextEngine {
    pub fn new(options: OcrOptions) -> Self {
        Self { options }
    }

    /// Find every occurrence of `phrase` in `img`
    ///
    /// Rectangles come back in recognition (reading) order, in the coordinate
    /// space of `img`. No recognized text at all is an empty result, not an
    /// error.
    pub fn find(&self, img: &DynamicImage, phrase: &str) -> Result<Vec<Rect>, LocateError> {
        let phrase = phrase.trim();
        if phrase.is_empty() {
            return Err(LocateError::InvalidArgument(
                "search phrase is empty".to_string(),
            ));
        }

        let whitelist = self.effective_whitelist(phrase);
        // Word-bias artifact lives exactly as long as this call; the temp
        // file is removed on every exit path when `bias` drops.
        let bias = self.write_bias_file(phrase)?;

        let mut working = img.clone();
        let (orig_w, orig_h) = (img.width(), img.height());

        if self.options.threshold_filter {
            let binarized =
                imageproc::contrast::adaptive_threshold(&working.to_luma8(), THRESHOLD_BLOCK_RADIUS);
            working = DynamicImage::ImageLuma8(binarized);
        }

        let (mut scale_x, mut scale_y) = (1.0f64, 1.0f64);
        if self.options.improve_dpi && BASE_DPI < TARGET_DPI {
            let factor = f64::from(TARGET_DPI) / f64::from(BASE_DPI);
            let new_w = (f64::from(orig_w) * factor).round() as u32;
            let new_h = (f64::from(orig_h) * factor).round() as u32;
            working = working.resize_exact(new_w, new_h, FilterType::CatmullRom);
            scale_x = f64::from(new_w) / f64::from(orig_w);
            scale_y = f64::from(new_h) / f64::from(orig_h);
        }

        let words = self.recognize_words(&working, &whitelist, bias.path().display().to_string())?;
        debug!("recognized {} words while searching for '{}'", words.len(), phrase);

        let needle: Vec<String> = phrase
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();
        let matches = match_phrase_windows(&words, &needle);

        Ok(matches
            .into_iter()
            .map(|r| remap(r, scale_x, scale_y))
            .collect())
    }

    /// Configured whitelist extended with every non-whitespace phrase character
    fn effective_whitelist(&self, phrase: &str) -> String {
        let mut whitelist = self.options.whitelist_chars.clone();
        for c in phrase.chars() {
            if !c.is_whitespace() && !whitelist.contains(c) {
                whitelist.push(c);
            }
        }
        whitelist
    }

    /// One word per line: configured bias entries, then the phrase's words
    fn write_bias_file(&self, phrase: &str) -> Result<NamedTempFile, LocateError> {
        let mut file = NamedTempFile::new()?;
        for word in self.options.word_bias.iter().map(String::as_str) {
            writeln!(file, "{word}")?;
        }
        for word in phrase.split_whitespace() {
            writeln!(file, "{word}")?;
        }
        file.flush()?;
        Ok(file)
    }

    fn recognize_words(
        &self,
        img: &DynamicImage,
        whitelist: &str,
        bias_path: String,
    ) -> Result<Vec<WordBox>, LocateError> {
        let tess_img =
            Image::from_dynamic_image(img).map_err(|e| LocateError::Engine(e.to_string()))?;

        let mut config_variables = HashMap::new();
        config_variables.insert("tessedit_char_whitelist".to_string(), whitelist.to_string());
        config_variables.insert("user_words_file".to_string(), bias_path);

        let args = Args {
            lang: self.options.language.tesseract_code().to_string(),
            config_variables,
            dpi: Some(TARGET_DPI as i32),
            psm: Some(PSM_SPARSE_TEXT),
            oem: Some(if self.options.lstm_only { 1 } else { 3 }),
        };

        let output = rusty_tesseract::image_to_data(&tess_img, &args)
            .map_err(|e| LocateError::Engine(e.to_string()))?;

        Ok(output
            .data
            .into_iter()
            .filter(|d| !d.text.trim().is_empty() && d.conf > 0.0)
            .map(|d| WordBox {
                text: d.text,
                rect: Rect::new(d.left, d.top, d.width.max(0) as u32, d.height.max(0) as u32),
            })
            .collect())
    }
}

/// Slide a window of `needle.len()` over `words`; every position where all
/// words match case-insensitively yields the union of the window's boxes.
/// Occurrences are not overlap-suppressed.
fn match_phrase_windows(words: &[WordBox], needle: &[String]) -> Vec<Rect> {
    if needle.is_empty() || words.len() < needle.len() {
        return Vec::new();
    }
    words
        .windows(needle.len())
        .filter(|window| {
            window
                .iter()
                .zip(needle)
                .all(|(word, want)| word.text.to_lowercase() == *want)
        })
        .map(|window| {
            window
                .iter()
                .fold(Rect::EMPTY, |acc, word| acc.union(&word.rect))
        })
        .collect()
}

/// Map a rectangle from working-image pixels back to original-image pixels
fn remap(r: Rect, scale_x: f64, scale_y: f64) -> Rect {
    Rect {
        x: (f64::from(r.x) / scale_x).round() as i32,
        y: (f64::from(r.y) / scale_y).round() as i32,
        width: (f64::from(r.width) / scale_x).round() as u32,
        height: (f64::from(r.height) / scale_y).round() as u32,
    }
}
