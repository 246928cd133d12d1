//! # Raster Layer Storage
//!
//! Flat byte buffer of `width * height * bytes_per_pixel` bytes, row-major,
//! with bounds-checked pixel access and the layer's world mapping.
//!
//! ## Table of Contents
//! 1. RasterLayer — Buffer + format + default value
//! 2. Pixel access
//! 3. Coordinate conversion
//! 4. Host hooks (dirty flag, raw buffer)

use glam::{IVec2, UVec2, Vec2};

use crate::color::Color;
use crate::error::{Result, WorldLayersError};
use crate::format::{PixelCodec, PixelFormat};
use crate::grid::GridMapping;

// ============================================================================
// 1. RasterLayer — Buffer + format + default value
// ============================================================================

/// One layer's sample storage
#[derive(Debug, Clone)]
pub struct RasterLayer {
    resolution: UVec2,
    codec: &'static PixelCodec,
    default_value: Color,
    mapping: GridMapping,
    buffer: Vec<u8>,
    dirty: bool,
}

impl RasterLayer {
    /// Allocate the buffer and write `default_value` into every pixel.
    ///
    /// The fill goes through the codec so a read of an untouched pixel
    /// returns the quantized default, same as any written pixel.
    pub fn new(format: PixelFormat, resolution: UVec2, default_value: Color, mapping: GridMapping) -> Self {
        let codec = format.codec();
        let len = resolution.x as usize * resolution.y as usize * codec.bytes_per_pixel;
        let mut layer = Self {
            resolution,
            codec,
            default_value,
            mapping,
            buffer: vec![0u8; len],
            dirty: false,
        };

        let mut encoded = [0u8; 8];
        let encoded = &mut encoded[..codec.bytes_per_pixel];
        (codec.encode)(default_value, encoded);
        for pixel in layer.buffer.chunks_exact_mut(codec.bytes_per_pixel) {
            pixel.copy_from_slice(encoded);
        }

        layer
    }

    pub fn format(&self) -> PixelFormat {
        self.codec.format
    }

    pub fn codec(&self) -> &'static PixelCodec {
        self.codec
    }

    pub fn resolution(&self) -> UVec2 {
        self.resolution
    }

    pub fn width(&self) -> u32 {
        self.resolution.x
    }

    pub fn height(&self) -> u32 {
        self.resolution.y
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.codec.bytes_per_pixel
    }

    /// The configured default value (not quantized)
    pub fn default_value(&self) -> Color {
        self.default_value
    }

    pub fn mapping(&self) -> &GridMapping {
        &self.mapping
    }

    // ========================================================================
    // 2. Pixel access
    // ========================================================================

    #[inline]
    pub fn in_bounds(&self, pixel: IVec2) -> bool {
        pixel.x >= 0
            && pixel.y >= 0
            && (pixel.x as u32) < self.resolution.x
            && (pixel.y as u32) < self.resolution.y
    }

    /// Byte offset of an in-bounds pixel. Checked on both axes so a large `x`
    /// never wraps into the next row.
    #[inline]
    fn byte_offset(&self, pixel: IVec2) -> Option<usize> {
        if !self.in_bounds(pixel) {
            return None;
        }
        let index = pixel.y as usize * self.resolution.x as usize + pixel.x as usize;
        Some(index * self.codec.bytes_per_pixel)
    }

    /// Decoded value at `pixel`, or the default value outside
    /// `[0, width) × [0, height)`
    pub fn get_pixel(&self, pixel: IVec2) -> Color {
        match self.byte_offset(pixel) {
            Some(offset) => self.codec.decode_at(&self.buffer, offset),
            None => self.default_value,
        }
    }

    /// Encode `color` at `pixel` and mark the layer dirty.
    /// Out-of-bounds writes are ignored; returns whether a write happened.
    pub fn set_pixel(&mut self, pixel: IVec2, color: Color) -> bool {
        let Some(offset) = self.byte_offset(pixel) else {
            return false;
        };
        self.codec.encode_at(color, &mut self.buffer, offset);
        self.dirty = true;
        true
    }

    /// Every pixel in row-major order with its decoded value
    pub fn pixels(&self) -> impl Iterator<Item = (IVec2, Color)> + '_ {
        let width = self.resolution.x.max(1) as usize;
        self.buffer
            .chunks_exact(self.codec.bytes_per_pixel)
            .enumerate()
            .map(move |(i, bytes)| {
                let pixel = IVec2::new((i % width) as i32, (i / width) as i32);
                (pixel, (self.codec.decode)(bytes))
            })
    }

    // ========================================================================
    // 3. Coordinate conversion
    // ========================================================================

    /// Pixel containing `world`, unclamped
    pub fn world_to_pixel(&self, world: Vec2) -> IVec2 {
        self.mapping.world_to_pixel(world)
    }

    /// Pixel containing `world`, `None` for a non-finite position
    pub fn try_world_to_pixel(&self, world: Vec2) -> Option<IVec2> {
        self.mapping.try_world_to_pixel(world)
    }

    /// World-space center of `pixel`
    pub fn pixel_to_world(&self, pixel: IVec2) -> Vec2 {
        self.mapping.pixel_to_world(pixel)
    }

    // ========================================================================
    // 4. Host hooks (dirty flag, raw buffer)
    // ========================================================================

    /// Whether any pixel changed since the last [`mark_clean`](Self::mark_clean)
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Packed pixel bytes in the layer's [`PixelFormat`]
    pub fn raw_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Replace the whole buffer with bytes in this layer's format
    pub fn load_raw(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() != self.buffer.len() {
            return Err(WorldLayersError::RawBufferSize {
                expected: self.buffer.len(),
                actual: bytes.len(),
            });
        }
        self.buffer.copy_from_slice(bytes);
        self.dirty = true;
        Ok(())
    }
}
