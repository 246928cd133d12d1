//! # Layer Color
//!
//! Four-channel float sample value stored in (and read back from) a layer.
//!
//! ## Table of Contents
//! 1. Color — Value type and constants
//! 2. Equality — Epsilon and format-aware comparison
//! 3. Blending — Lerp helpers used by bilinear sampling

use serde::{Deserialize, Serialize};

use crate::format::PixelFormat;

/// Tolerance used by every color comparison in the crate
pub const COLOR_EPSILON: f32 = 1.0e-4;

// ============================================================================
// 1. Color — Value type and constants
// ============================================================================

/// A linear four-channel sample.
///
/// Channels are unbounded `f32`. 8-bit layers only store `[0, 1]`
/// meaningfully; 16-bit float layers store the half-precision range.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const RED: Self = Self::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Self = Self::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Self = Self::new(0.0, 0.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Single-channel value (g, b, a = 0), the shape R8/R16F layers decode to
    pub const fn scalar(r: f32) -> Self {
        Self::new(r, 0.0, 0.0, 0.0)
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_array(c: [f32; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }

    // ========================================================================
    // 2. Equality — Epsilon and format-aware comparison
    // ========================================================================

    /// All four channels equal within `tolerance`
    pub fn approx_eq(&self, other: &Color, tolerance: f32) -> bool {
        (self.r - other.r).abs() <= tolerance
            && (self.g - other.g).abs() <= tolerance
            && (self.b - other.b).abs() <= tolerance
            && (self.a - other.a).abs() <= tolerance
    }

    /// Compare only the channels `format` stores.
    ///
    /// Single-channel formats look at `r` alone, four-channel formats at the
    /// full tuple, both within [`COLOR_EPSILON`].
    pub fn matches(&self, other: &Color, format: PixelFormat) -> bool {
        if format.channels() == 1 {
            (self.r - other.r).abs() <= COLOR_EPSILON
        } else {
            self.approx_eq(other, COLOR_EPSILON)
        }
    }

    // ========================================================================
    // 3. Blending — Lerp helpers used by bilinear sampling
    // ========================================================================

    pub fn lerp(self, other: Color, t: f32) -> Color {
        Color::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
            self.a + (other.a - self.a) * t,
        )
    }

    /// Bilinear blend of four corner samples.
    /// `c00` is (x0, y0), `c10` is (x0 + 1, y0), and so on.
    pub fn bilerp(c00: Color, c10: Color, c01: Color, c11: Color, tx: f32, ty: f32) -> Color {
        c00.lerp(c10, tx).lerp(c01.lerp(c11, tx), ty)
    }
}

impl From<[f32; 4]> for Color {
    fn from(c: [f32; 4]) -> Self {
        Self::from_array(c)
    }
}

impl From<Color> for [f32; 4] {
    fn from(c: Color) -> Self {
        c.to_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_channel_match_ignores_gba() {
        let a = Color::new(0.5, 0.1, 0.2, 0.3);
        let b = Color::new(0.5, 0.9, 0.8, 0.7);
        assert!(a.matches(&b, PixelFormat::R8));
        assert!(a.matches(&b, PixelFormat::R16F));
        assert!(!a.matches(&b, PixelFormat::Rgba8));
        assert!(!a.matches(&b, PixelFormat::Rgba16F));
    }

    #[test]
    fn test_match_tolerance() {
        let a = Color::scalar(0.25);
        assert!(a.matches(&Color::scalar(0.25 + COLOR_EPSILON * 0.5), PixelFormat::R8));
        assert!(!a.matches(&Color::scalar(0.25 + COLOR_EPSILON * 4.0), PixelFormat::R8));
    }

    #[test]
    fn test_bilerp_corners_and_center() {
        let c00 = Color::scalar(0.0);
        let c10 = Color::scalar(1.0);
        let c01 = Color::scalar(0.0);
        let c11 = Color::scalar(1.0);
        assert_eq!(Color::bilerp(c00, c10, c01, c11, 0.0, 0.0).r, 0.0);
        assert_eq!(Color::bilerp(c00, c10, c01, c11, 1.0, 1.0).r, 1.0);
        assert!((Color::bilerp(c00, c10, c01, c11, 0.5, 0.5).r - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_deserialize_partial_channels() {
        let c: Color = toml::from_str("r = 1.0").unwrap();
        assert_eq!(c, Color::scalar(1.0));
    }
}
