//! The two RGB -> luminance weightings used by the pipeline.
//!
//! Geometry detection and QR module sampling use the BT.601 weights; logo
//! dark/light classification uses the BT.709 weights. The two stages are
//! calibrated against their respective thresholds, so the formulas must stay
//! separate even though they look interchangeable.

/// BT.601 luminance, used when binarizing the QR image and sampling modules.
pub fn bt601(r: u8, g: u8, b: u8) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

/// BT.709 luminance, used when classifying logo pixels as dark or light.
pub fn bt709(r: u8, g: u8, b: u8) -> f64 {
    0.2126 * r as f64 + 0.7152 * g as f64 + 0.0722 * b as f64
}
