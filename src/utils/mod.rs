//! Utilities module for logging, errors and small helpers
//!
//! This module provides:
//! - Structured logging with tracing
//! - Error handling types
//! - Image loading and percentage rounding shared by the classifier

use std::path::Path;

use image::DynamicImage;

pub mod error;
pub mod logging;

// Re-export main types for convenience
pub use error::{Result, ResultExt, RiceLeafError};
pub use logging::{init_logging, LogConfig, LogLevel};

/// Open and decode an image file
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    if !path.exists() {
        return Err(RiceLeafError::PathNotFound(path.to_path_buf()));
    }
    image::open(path).map_err(|e| RiceLeafError::ImageLoadError(path.to_path_buf(), e.to_string()))
}

/// Convert a probability in [0, 1] to a percentage rounded to 2 decimals
pub fn to_percentage(probability: f32) -> f64 {
    round_to(probability as f64 * 100.0, 2)
}

/// Round to a fixed number of decimal places (half away from zero)
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Format a duration in milliseconds in a human-readable way
pub fn format_millis(ms: f64) -> String {
    if ms < 1.0 {
        format!("{:.0} µs", ms * 1000.0)
    } else if ms < 1000.0 {
        format!("{:.1} ms", ms)
    } else {
        format!("{:.2} s", ms / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_percentage() {
        assert_eq!(to_percentage(0.85), 85.0);
        assert_eq!(to_percentage(0.123456), 12.35);
        assert_eq!(to_percentage(0.0), 0.0);
        assert_eq!(to_percentage(1.0), 100.0);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(3.14159, 2), 3.14);
        assert_eq!(round_to(2.675, 1), 2.7);
    }

    #[test]
    fn test_load_image() {
        let dir = tempfile::tempdir().unwrap();

        let png = dir.path().join("leaf.png");
        image::RgbImage::from_pixel(4, 3, image::Rgb([0, 200, 0])).save(&png).unwrap();
        let loaded = load_image(&png).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (4, 3));

        let bogus = dir.path().join("bogus.png");
        std::fs::write(&bogus, b"not an image").unwrap();
        assert!(matches!(load_image(&bogus), Err(RiceLeafError::ImageLoadError(..))));

        let missing = dir.path().join("missing.png");
        assert!(matches!(load_image(&missing), Err(RiceLeafError::PathNotFound(_))));
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(12.34), "12.3 ms");
        assert_eq!(format_millis(1500.0), "1.50 s");
    }
}
