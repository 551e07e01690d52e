//! Template-matching image locator
//!
//! Computes a zero-mean normalized cross-correlation surface between the
//! reference image and the searched image, then extracts every peak above the
//! configured threshold. Taking only the single best match would miss
//! legitimate repeated UI elements, so each extracted peak is flood-fill
//! suppressed and the next global maximum is considered until the surface
//! falls below the threshold.

use image::DynamicImage;
use tracing::debug;

use crate::error::LocateError;
use crate::geometry::Rect;
use crate::options::ImgOptions;

/// Safety valve on iterative peak extraction
const MAX_MATCHES: usize = 64;
/// Width of the value band flood-filled away around an extracted peak
const PEAK_TOLERANCE: f32 = 0.1;
/// Windows with less variance than this match nothing
const VARIANCE_EPSILON: f32 = 1e-6;

pub struct ImageEngine {
    options: ImgOptions,
}

/// One channel of an image as f32 samples, row-major
struct Plane {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

/// Correlation scores per top-left placement of the reference
struct Surface {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl ImageEngine {
    pub fn new(options: ImgOptions) -> Self {
        Self { options }
    }

    /// Find every placement of `reference` inside `img` scoring at or above
    /// the configured threshold, strongest first
    pub fn find(
        &self,
        img: &DynamicImage,
        reference: &DynamicImage,
    ) -> Result<Vec<Rect>, LocateError> {
        if img.width() == 0 || img.height() == 0 || reference.width() == 0 || reference.height() == 0
        {
            return Err(LocateError::InvalidArgument(
                "cannot match against an image with no pixels".to_string(),
            ));
        }
        if reference.width() > img.width() || reference.height() > img.height() {
            return Ok(Vec::new());
        }

        let mut surface = if self.options.color_match() {
            correlate_color(img, reference)
        } else {
            correlate(&luma_plane(img), &luma_plane(reference))
        };

        let mut matches = Vec::new();
        while matches.len() < MAX_MATCHES {
            let (px, py, peak) = surface.global_max();
            if peak < self.options.threshold() {
                break;
            }
            matches.push(Rect::new(
                px as i32,
                py as i32,
                reference.width(),
                reference.height(),
            ));
            surface.suppress_peak(px, py, peak);
        }
        debug!(
            "template match found {} placement(s) above {}",
            matches.len(),
            self.options.threshold()
        );
        Ok(matches)
    }
}

fn luma_plane(img: &DynamicImage) -> Plane {
    let gray = img.to_luma8();
    Plane {
        width: gray.width(),
        height: gray.height(),
        data: gray.as_raw().iter().map(|&v| f32::from(v)).collect(),
    }
}

/// The three RGB channel planes; channel counts between image and reference
/// always agree because both go through the same conversion. Alpha is
/// dropped: captures and references are opaque, and a constant plane has no
/// variance to correlate.
fn rgb_planes(img: &DynamicImage) -> Vec<Plane> {
    let rgb = img.to_rgb8();
    let (width, height) = (rgb.width(), rgb.height());
    (0..3)
        .map(|c| Plane {
            width,
            height,
            data: rgb.as_raw().iter().skip(c).step_by(3).map(|&v| f32::from(v)).collect(),
        })
        .collect()
}

fn template_variance(template: &Plane) -> f64 {
    let n = template.data.len() as f64;
    let mean = template.data.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
    template
        .data
        .iter()
        .map(|&v| (f64::from(v) - mean) * (f64::from(v) - mean))
        .sum()
}

/// Per-channel correlation averaged over the RGB planes that carry any
/// signal; a channel that is flat in the reference scores 0 everywhere and
/// would only dilute the average, so it is skipped
fn correlate_color(img: &DynamicImage, reference: &DynamicImage) -> Surface {
    let img_planes = rgb_planes(img);
    let ref_planes = rgb_planes(reference);
    let out_w = img.width() - reference.width() + 1;
    let out_h = img.height() - reference.height() + 1;
    let mut acc = Surface {
        width: out_w,
        height: out_h,
        data: vec![0.0f32; (out_w * out_h) as usize],
    };
    let mut used = 0u32;
    for (ip, rp) in img_planes.iter().zip(ref_planes.iter()) {
        if template_variance(rp) <= f64::from(VARIANCE_EPSILON) {
            continue;
        }
        let s = correlate(ip, rp);
        for (a, b) in acc.data.iter_mut().zip(&s.data) {
            *a += *b;
        }
        used += 1;
    }
    if used > 1 {
        for v in &mut acc.data {
            *v /= used as f32;
        }
    }
    acc
}

/// Zero-mean normalized cross-correlation of `template` against every window
/// of `img`. Scores are in [-1, 1]; flat windows score 0. Sums accumulate in
/// f64: the `sum_ii - sum_i^2/n` cancellation loses too much precision in f32
/// for large templates.
fn correlate(img: &Plane, template: &Plane) -> Surface {
    let (iw, ih) = (img.width as usize, img.height as usize);
    let (tw, th) = (template.width as usize, template.height as usize);
    let out_w = iw - tw + 1;
    let out_h = ih - th + 1;
    let n = (tw * th) as f64;

    let t_sum: f64 = template.data.iter().map(|&v| f64::from(v)).sum();
    let t_mean = t_sum / n;
    let t_var: f64 = template
        .data
        .iter()
        .map(|&v| (f64::from(v) - t_mean) * (f64::from(v) - t_mean))
        .sum();

    let mut data = vec![0.0f32; out_w * out_h];
    for oy in 0..out_h {
        for ox in 0..out_w {
            let mut sum_i = 0.0f64;
            let mut sum_ii = 0.0f64;
            let mut sum_it = 0.0f64;
            for ty in 0..th {
                let img_row = (oy + ty) * iw + ox;
                let tpl_row = ty * tw;
                for tx in 0..tw {
                    let iv = f64::from(img.data[img_row + tx]);
                    let tv = f64::from(template.data[tpl_row + tx]);
                    sum_i += iv;
                    sum_ii += iv * iv;
                    sum_it += iv * tv;
                }
            }
            let cov = sum_it - sum_i * t_mean;
            let i_var = sum_ii - sum_i * sum_i / n;
            let denom = (i_var * t_var).sqrt();
            data[oy * out_w + ox] = if denom > f64::from(VARIANCE_EPSILON) {
                (cov / denom) as f32
            } else {
                0.0
            };
        }
    }
    Surface {
        width: out_w as u32,
        height: out_h as u32,
        data,
    }
}

impl Surface {
    fn at(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.width + x) as usize]
    }

    fn set(&mut self, x: u32, y: u32, v: f32) {
        self.data[(y * self.width + x) as usize] = v;
    }

    fn global_max(&self) -> (u32, u32, f32) {
        let mut best = (0, 0, f32::NEG_INFINITY);
        for y in 0..self.height {
            for x in 0..self.width {
                let v = self.at(x, y);
                if v > best.2 {
                    best = (x, y, v);
                }
            }
        }
        best
    }

    /// Flood-fill the connected band of values within `PEAK_TOLERANCE` of the
    /// peak down to a sentinel, so the next global maximum is a different
    /// placement rather than this peak's shoulder
    fn suppress_peak(&mut self, px: u32, py: u32, peak: f32) {
        let floor = peak - PEAK_TOLERANCE;
        let mut stack = vec![(px, py)];
        while let Some((x, y)) = stack.pop() {
            if self.at(x, y) < floor {
                continue;
            }
            self.set(x, y, f32::NEG_INFINITY);
            if x > 0 {
                stack.push((x - 1, y));
            }
            if y > 0 {
                stack.push((x, y - 1));
            }
            if x + 1 < self.width {
                stack.push((x + 1, y));
            }
            if y + 1 < self.height {
                stack.push((x, y + 1));
            }
        }
    }
}
