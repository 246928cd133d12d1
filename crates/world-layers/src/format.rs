//! # Pixel Formats & Codec
//!
//! Packs a [`Color`] into a tightly packed byte slice and back, for the four
//! supported layer formats. Each format resolves to a static [`PixelCodec`]
//! entry holding its size and encode/decode functions, so layers pick their
//! codec once instead of branching on the format per pixel.
//!
//! ## Table of Contents
//! 1. PixelFormat — Format tag
//! 2. PixelCodec — Dispatch table
//! 3. Channel helpers (8-bit, half float)
//! 4. Per-format encode/decode functions
//! 5. encode / decode — Free-function entry points

use half::f16;
use serde::{Deserialize, Serialize};

use crate::color::Color;

// ============================================================================
// 1. PixelFormat — Format tag
// ============================================================================

/// Storage format of a layer. Fixed for the lifetime of the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 1 channel, 8-bit unsigned normalized
    #[default]
    R8,
    /// 1 channel, 16-bit float
    R16F,
    /// 4 channels, 8-bit unsigned normalized
    Rgba8,
    /// 4 channels, 16-bit float
    Rgba16F,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 4] = [
        PixelFormat::R8,
        PixelFormat::R16F,
        PixelFormat::Rgba8,
        PixelFormat::Rgba16F,
    ];

    /// Codec table entry for this format
    #[inline]
    pub fn codec(self) -> &'static PixelCodec {
        &CODECS[self as usize]
    }

    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        self.codec().bytes_per_pixel
    }

    #[inline]
    pub fn channels(self) -> usize {
        self.codec().channels
    }

    /// Whether channels are stored as half floats
    pub fn is_float(self) -> bool {
        matches!(self, PixelFormat::R16F | PixelFormat::Rgba16F)
    }
}

// ============================================================================
// 2. PixelCodec — Dispatch table
// ============================================================================

/// Encode/decode entry for one [`PixelFormat`].
///
/// `decode` receives exactly `bytes_per_pixel` bytes; `encode` writes exactly
/// that many.
pub struct PixelCodec {
    pub format: PixelFormat,
    pub bytes_per_pixel: usize,
    pub channels: usize,
    pub decode: fn(&[u8]) -> Color,
    pub encode: fn(Color, &mut [u8]),
}

impl std::fmt::Debug for PixelCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelCodec")
            .field("format", &self.format)
            .field("bytes_per_pixel", &self.bytes_per_pixel)
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

impl PixelCodec {
    /// Decode the pixel starting at `byte_offset`
    #[inline]
    pub fn decode_at(&self, buffer: &[u8], byte_offset: usize) -> Color {
        (self.decode)(&buffer[byte_offset..byte_offset + self.bytes_per_pixel])
    }

    /// Encode `color` into the pixel starting at `byte_offset`
    #[inline]
    pub fn encode_at(&self, color: Color, buffer: &mut [u8], byte_offset: usize) {
        (self.encode)(color, &mut buffer[byte_offset..byte_offset + self.bytes_per_pixel]);
    }

    /// The value a pixel holds after `color` is written to it.
    pub fn quantize(&self, color: Color) -> Color {
        let mut scratch = [0u8; 8];
        let bytes = &mut scratch[..self.bytes_per_pixel];
        (self.encode)(color, bytes);
        (self.decode)(bytes)
    }
}

/// Indexed by `PixelFormat as usize`; order must match the enum.
static CODECS: [PixelCodec; 4] = [
    PixelCodec {
        format: PixelFormat::R8,
        bytes_per_pixel: 1,
        channels: 1,
        decode: decode_r8,
        encode: encode_r8,
    },
    PixelCodec {
        format: PixelFormat::R16F,
        bytes_per_pixel: 2,
        channels: 1,
        decode: decode_r16f,
        encode: encode_r16f,
    },
    PixelCodec {
        format: PixelFormat::Rgba8,
        bytes_per_pixel: 4,
        channels: 4,
        decode: decode_rgba8,
        encode: encode_rgba8,
    },
    PixelCodec {
        format: PixelFormat::Rgba16F,
        bytes_per_pixel: 8,
        channels: 4,
        decode: decode_rgba16f,
        encode: encode_rgba16f,
    },
];

// ============================================================================
// 3. Channel helpers (8-bit, half float)
// ============================================================================

#[inline]
fn unorm8_to_f32(byte: u8) -> f32 {
    byte as f32 / 255.0
}

/// `round(v * 255)` truncated to its low byte. No clamp: out-of-range values
/// wrap, and NaN encodes as 0.
#[inline]
fn f32_to_unorm8(v: f32) -> u8 {
    (v * 255.0).round() as i32 as u8
}

#[inline]
fn read_f16(bytes: &[u8]) -> f32 {
    f16::from_le_bytes([bytes[0], bytes[1]]).to_f32()
}

#[inline]
fn write_f16(v: f32, bytes: &mut [u8]) {
    bytes[..2].copy_from_slice(&f16::from_f32(v).to_le_bytes());
}

// ============================================================================
// 4. Per-format encode/decode functions
// ============================================================================

fn decode_r8(bytes: &[u8]) -> Color {
    Color::scalar(unorm8_to_f32(bytes[0]))
}

fn encode_r8(color: Color, bytes: &mut [u8]) {
    bytes[0] = f32_to_unorm8(color.r);
}

fn decode_r16f(bytes: &[u8]) -> Color {
    Color::scalar(read_f16(bytes))
}

fn encode_r16f(color: Color, bytes: &mut [u8]) {
    write_f16(color.r, bytes);
}

fn decode_rgba8(bytes: &[u8]) -> Color {
    Color::new(
        unorm8_to_f32(bytes[0]),
        unorm8_to_f32(bytes[1]),
        unorm8_to_f32(bytes[2]),
        unorm8_to_f32(bytes[3]),
    )
}

fn encode_rgba8(color: Color, bytes: &mut [u8]) {
    for (dst, channel) in bytes.iter_mut().zip(color.to_array()) {
        *dst = f32_to_unorm8(channel);
    }
}

fn decode_rgba16f(bytes: &[u8]) -> Color {
    Color::new(
        read_f16(&bytes[0..2]),
        read_f16(&bytes[2..4]),
        read_f16(&bytes[4..6]),
        read_f16(&bytes[6..8]),
    )
}

fn encode_rgba16f(color: Color, bytes: &mut [u8]) {
    for (dst, channel) in bytes.chunks_exact_mut(2).zip(color.to_array()) {
        write_f16(channel, dst);
    }
}

// ============================================================================
// 5. encode / decode — Free-function entry points
// ============================================================================

/// Read one pixel of `format` from `buffer` at `byte_offset`
pub fn decode(buffer: &[u8], byte_offset: usize, format: PixelFormat) -> Color {
    format.codec().decode_at(buffer, byte_offset)
}

/// Write `color` as one pixel of `format` into `buffer` at `byte_offset`
pub fn encode(color: Color, buffer: &mut [u8], byte_offset: usize, format: PixelFormat) {
    format.codec().encode_at(color, buffer, byte_offset);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_enum() {
        for format in PixelFormat::ALL {
            assert_eq!(format.codec().format, format);
        }
        assert_eq!(PixelFormat::R8.bytes_per_pixel(), 1);
        assert_eq!(PixelFormat::R16F.bytes_per_pixel(), 2);
        assert_eq!(PixelFormat::Rgba8.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Rgba16F.bytes_per_pixel(), 8);
    }

    #[test]
    fn test_roundtrip_within_format_tolerance() {
        let samples = [
            Color::new(0.0, 0.0, 0.0, 0.0),
            Color::new(1.0, 1.0, 1.0, 1.0),
            Color::new(0.1, 0.2, 0.3, 0.4),
            Color::new(0.8, 0.6, 0.4, 0.2),
            Color::new(0.501, 0.999, 0.004, 0.75),
        ];
        for format in PixelFormat::ALL {
            let tolerance = if format.is_float() { 0.1 } else { 1.0 / 255.0 };
            for color in samples {
                let mut buffer = vec![0u8; format.bytes_per_pixel()];
                encode(color, &mut buffer, 0, format);
                let decoded = decode(&buffer, 0, format);
                assert!((decoded.r - color.r).abs() <= tolerance, "{format:?} r");
                if format.channels() == 4 {
                    assert!(decoded.approx_eq(&color, tolerance), "{format:?} {color:?}");
                } else {
                    assert_eq!((decoded.g, decoded.b, decoded.a), (0.0, 0.0, 0.0));
                }
            }
        }
    }

    #[test]
    fn test_half_float_large_values() {
        let mut buffer = [0u8; 2];
        encode(Color::scalar(123.456), &mut buffer, 0, PixelFormat::R16F);
        let decoded = decode(&buffer, 0, PixelFormat::R16F);
        assert!((decoded.r - 123.456).abs() < 0.1);
    }

    #[test]
    fn test_encode_at_offset_leaves_neighbors() {
        let mut buffer = vec![0xAAu8; 12];
        encode(Color::WHITE, &mut buffer, 4, PixelFormat::Rgba8);
        assert_eq!(&buffer[0..4], &[0xAA; 4]);
        assert_eq!(&buffer[4..8], &[255; 4]);
        assert_eq!(&buffer[8..12], &[0xAA; 4]);
    }

    #[test]
    fn test_unorm8_out_of_range_wraps() {
        // 1.2 * 255 = 306 -> low byte 50
        assert_eq!(f32_to_unorm8(1.2), 50);
        // -1/255 -> -1 -> 0xFF
        assert_eq!(f32_to_unorm8(-1.0 / 255.0), 255);
    }

    #[test]
    fn test_quantize_matches_stored_value() {
        let codec = PixelFormat::Rgba8.codec();
        let q = codec.quantize(Color::new(0.1, 0.2, 0.3, 0.4));
        assert_eq!(q.r, (0.1f32 * 255.0).round() / 255.0);
        assert_eq!(q.a, (0.4f32 * 255.0).round() / 255.0);
    }
}
