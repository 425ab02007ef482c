//! Leaf Validator
//!
//! Cheap colour heuristic run before classification: an image counts as
//! leaf-like when enough of its pixels fall in a green HSV band. It only has
//! to keep obviously wrong uploads (people, buildings, other objects) away
//! from the model, so precision is not a goal.
//!
//! Hue uses the 8-bit OpenCV convention, degrees halved into `0..180`, with
//! saturation and value on `0..=255`. The band bounds are inclusive.
//!
//! ## Fail-open policy
//!
//! The validator never reports an error. If it cannot reach a verdict
//! (empty raster, malformed buffer) it logs a warning and answers `true`, so
//! the user gets a classification rather than being blocked by a bug in a
//! heuristic.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::utils::error::{Result, RiceLeafError};

/// Tunable parameters of the green band and coverage threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Lowest accepted hue (half-degrees)
    pub hue_min: u8,
    /// Highest accepted hue (half-degrees)
    pub hue_max: u8,
    /// Lowest accepted saturation
    pub saturation_min: u8,
    /// Lowest accepted value (brightness)
    pub value_min: u8,
    /// Green coverage must be strictly above this fraction
    pub green_ratio_threshold: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            hue_min: 35,
            hue_max: 85,
            saturation_min: 40,
            value_min: 40,
            green_ratio_threshold: 0.15,
        }
    }
}

impl ValidatorConfig {
    /// Configuration with a different coverage threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.green_ratio_threshold = threshold;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.hue_max >= 180 {
            return Err(RiceLeafError::Config(format!(
                "hue_max must be below 180 (got {})",
                self.hue_max
            )));
        }
        if self.hue_min > self.hue_max {
            return Err(RiceLeafError::Config(format!(
                "hue_min ({}) must not exceed hue_max ({})",
                self.hue_min, self.hue_max
            )));
        }
        if !(0.0..=1.0).contains(&self.green_ratio_threshold) {
            return Err(RiceLeafError::Config(format!(
                "green_ratio_threshold must be in [0, 1] (got {})",
                self.green_ratio_threshold
            )));
        }
        Ok(())
    }

    fn is_green(&self, hsv: Hsv) -> bool {
        (self.hue_min..=self.hue_max).contains(&hsv.h)
            && hsv.s >= self.saturation_min
            && hsv.v >= self.value_min
    }
}

/// 8-bit HSV triple, hue in half-degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

/// Convert an RGB pixel to HSV with OpenCV's 8-bit rounding
pub fn rgb_to_hsv(pixel: Rgb<u8>) -> Hsv {
    let [r, g, b] = pixel.0;
    let (r, g, b) = (r as i32, g as i32, b as i32);

    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v == 0 {
        0
    } else {
        round_half_up(255.0 * diff as f64 / v as f64)
    };

    let h = if diff == 0 {
        0
    } else {
        // ties between channels resolve red, then green, then blue
        let numerator = if v == r {
            g - b
        } else if v == g {
            b - r + 2 * diff
        } else {
            r - g + 4 * diff
        };
        let h = round_half_up(30.0 * numerator as f64 / diff as f64);
        if h < 0 {
            h + 180
        } else {
            h
        }
    };

    Hsv {
        h: h as u8,
        s: s as u8,
        v: v as u8,
    }
}

fn round_half_up(x: f64) -> i32 {
    (x + 0.5).floor() as i32
}

/// Green pixel statistics for one raster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeafCoverage {
    pub green_pixels: u64,
    pub total_pixels: u64,
    /// Fraction of pixels inside the green band
    pub green_ratio: f64,
}

impl LeafCoverage {
    pub fn is_leaf_like(&self, threshold: f64) -> bool {
        self.green_ratio > threshold
    }
}

/// Result of a leaf check. `coverage` is `None` when the check was
/// inconclusive and failed open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeafVerdict {
    pub leaf_like: bool,
    pub coverage: Option<LeafCoverage>,
}

/// Leaf-likeness gate
#[derive(Debug, Clone, Default)]
pub struct LeafValidator {
    config: ValidatorConfig,
}

impl LeafValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Count green pixels. Fails on rasters without pixels.
    pub fn measure(&self, image: &RgbImage) -> Result<LeafCoverage> {
        let total_pixels = image.width() as u64 * image.height() as u64;
        if total_pixels == 0 {
            return Err(RiceLeafError::ValidationInconclusive(format!(
                "raster has no pixels ({}x{})",
                image.width(),
                image.height()
            )));
        }

        let green_pixels = image
            .pixels()
            .filter(|p| self.config.is_green(rgb_to_hsv(**p)))
            .count() as u64;

        Ok(LeafCoverage {
            green_pixels,
            total_pixels,
            green_ratio: green_pixels as f64 / total_pixels as f64,
        })
    }

    /// Decide whether an image is leaf-like.
    ///
    /// Grayscale, RGBA and 16-bit images are coerced to 8-bit RGB first.
    pub fn validate(&self, image: &DynamicImage) -> bool {
        self.assess(image).leaf_like
    }

    /// Verdict plus the measurement behind it
    pub fn assess(&self, image: &DynamicImage) -> LeafVerdict {
        match image {
            DynamicImage::ImageRgb8(rgb) => self.assess_rgb(rgb),
            other => self.assess_rgb(&other.to_rgb8()),
        }
    }

    /// Decide whether an RGB raster is leaf-like
    pub fn validate_rgb(&self, image: &RgbImage) -> bool {
        self.assess_rgb(image).leaf_like
    }

    pub fn assess_rgb(&self, image: &RgbImage) -> LeafVerdict {
        self.resolve(self.measure(image))
    }

    /// Decide on an interleaved RGB buffer; a wrong buffer length counts as
    /// inconclusive (and therefore passes)
    pub fn validate_raw(&self, width: u32, height: u32, pixels: &[u8]) -> bool {
        let expected = width as usize * height as usize * 3;
        let measured = if pixels.len() != expected {
            Err(RiceLeafError::ValidationInconclusive(format!(
                "expected {} bytes for a {}x{} RGB raster, got {}",
                expected,
                width,
                height,
                pixels.len()
            )))
        } else {
            RgbImage::from_raw(width, height, pixels.to_vec())
                .ok_or_else(|| {
                    RiceLeafError::ValidationInconclusive("buffer rejected by image decoder".to_string())
                })
                .and_then(|image| self.measure(&image))
        };
        self.resolve(measured).leaf_like
    }

    fn resolve(&self, measured: Result<LeafCoverage>) -> LeafVerdict {
        match measured {
            Ok(coverage) => {
                let leaf_like = coverage.is_leaf_like(self.config.green_ratio_threshold);
                debug!(
                    green_ratio = coverage.green_ratio,
                    threshold = self.config.green_ratio_threshold,
                    leaf_like,
                    "Leaf check"
                );
                LeafVerdict {
                    leaf_like,
                    coverage: Some(coverage),
                }
            }
            Err(e) => {
                warn!("Leaf detection error, proceeding with classification: {}", e);
                LeafVerdict {
                    leaf_like: true,
                    coverage: None,
                }
            }
        }
    }

    /// Binary mask of the green band (255 = green), same size as the input
    pub fn green_mask(&self, image: &RgbImage) -> GrayImage {
        GrayImage::from_fn(image.width(), image.height(), |x, y| {
            let hsv = rgb_to_hsv(*image.get_pixel(x, y));
            Luma([if self.config.is_green(hsv) { 255 } else { 0 }])
        })
    }
}

/// Leaf check with the default band and threshold
pub fn validate_leaf_image(image: &DynamicImage) -> bool {
    LeafValidator::default().validate(image)
}
