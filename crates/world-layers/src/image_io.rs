//! # Image Import & Export
//!
//! Moves layers in and out of image files with the `image` crate.
//! Channel values map linearly to bytes; no sRGB transfer is applied.
//!
//! | Layer format | Exported as |
//! |--------------|-------------|
//! | R8           | Luma8       |
//! | R16F         | Luma16      |
//! | RGBA8        | Rgba8       |
//! | RGBA16F      | Rgba16      |
//!
//! ## Table of Contents
//! 1. PixelSource for decoded images
//! 2. Import
//! 3. Export

use std::path::Path;

use glam::{IVec2, UVec2};
use image::{ImageBuffer, ImageFormat, Luma, Rgba, Rgba32FImage};

use crate::color::Color;
use crate::error::{Result, WorldLayersError};
use crate::format::PixelFormat;
use crate::raster::RasterLayer;
use crate::registry::{LayerRegistry, PixelSource};

// ============================================================================
// 1. PixelSource for decoded images
// ============================================================================

impl PixelSource for Rgba32FImage {
    fn dimensions(&self) -> UVec2 {
        UVec2::new(self.width(), self.height())
    }

    fn sample(&self, x: u32, y: u32) -> Color {
        Color::from_array(self.get_pixel(x, y).0)
    }
}

/// Decode any supported image file into linear float RGBA
pub fn read_image(path: &Path) -> Result<Rgba32FImage> {
    Ok(image::open(path)?.into_rgba32f())
}

// ============================================================================
// 2. Import
// ============================================================================

/// Populate layer `name` from an image file, resampled to the layer
/// resolution. Returns the number of pixels written.
pub fn import_layer_image(registry: &mut LayerRegistry, name: &str, path: &Path) -> Result<usize> {
    if !registry.contains_layer(name) {
        return Err(WorldLayersError::UnknownLayer(name.to_string()));
    }
    let image = read_image(path)?;
    let written = registry.populate_layer(name, &image)?;
    tracing::info!(
        "Imported {} ({}x{}) into layer '{}'",
        path.display(),
        image.width(),
        image.height(),
        name
    );
    Ok(written)
}

// ============================================================================
// 3. Export
// ============================================================================

fn unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn unorm16(v: f32) -> u16 {
    (v.clamp(0.0, 1.0) * 65535.0).round() as u16
}

fn pixel_at(layer: &RasterLayer, x: u32, y: u32) -> Color {
    layer.get_pixel(IVec2::new(x as i32, y as i32))
}

/// Write layer `name` as a PNG. Channels are clamped to `[0, 1]`.
pub fn export_layer_png(registry: &LayerRegistry, name: &str, path: &Path) -> Result<()> {
    let layer = registry
        .layer(name)
        .ok_or_else(|| WorldLayersError::UnknownLayer(name.to_string()))?;
    let (w, h) = (layer.width(), layer.height());

    match layer.format() {
        PixelFormat::R8 => {
            let img: ImageBuffer<Luma<u8>, Vec<u8>> =
                ImageBuffer::from_fn(w, h, |x, y| Luma([unorm8(pixel_at(layer, x, y).r)]));
            img.save_with_format(path, ImageFormat::Png)?;
        }
        PixelFormat::R16F => {
            let img: ImageBuffer<Luma<u16>, Vec<u16>> =
                ImageBuffer::from_fn(w, h, |x, y| Luma([unorm16(pixel_at(layer, x, y).r)]));
            img.save_with_format(path, ImageFormat::Png)?;
        }
        PixelFormat::Rgba8 => {
            let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
                ImageBuffer::from_fn(w, h, |x, y| Rgba(pixel_at(layer, x, y).to_array().map(unorm8)));
            img.save_with_format(path, ImageFormat::Png)?;
        }
        PixelFormat::Rgba16F => {
            let img: ImageBuffer<Rgba<u16>, Vec<u16>> =
                ImageBuffer::from_fn(w, h, |x, y| Rgba(pixel_at(layer, x, y).to_array().map(unorm16)));
            img.save_with_format(path, ImageFormat::Png)?;
        }
    }

    tracing::info!("Exported layer '{}' ({}x{}) to {}", name, w, h, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LayerConfig, LayerMutability};
    use crate::grid::WorldGrid;
    use glam::Vec2;

    fn registry() -> LayerRegistry {
        LayerRegistry::new(WorldGrid::new(Vec2::ZERO, Vec2::splat(4.0)))
    }

    #[test]
    fn test_png_roundtrip_per_format() {
        let dir = tempfile::tempdir().unwrap();
        for format in PixelFormat::ALL {
            let mut registry = registry();
            registry.register_layer(LayerConfig::new("src", format, 4, 4)).unwrap();
            registry.register_layer(LayerConfig::new("dst", format, 4, 4)).unwrap();
            for i in 0..16u32 {
                let v = i as f32 * 16.0 / 255.0;
                let world = Vec2::new((i % 4) as f32 + 0.5, (i / 4) as f32 + 0.5);
                registry.set_value_at_location("src", world, Color::new(v, 1.0 - v, 0.5, 1.0));
            }

            let path = dir.path().join(format!("{format:?}.png"));
            export_layer_png(&registry, "src", &path).unwrap();
            assert_eq!(import_layer_image(&mut registry, "dst", &path).unwrap(), 16);

            let (src, dst) = (registry.layer("src").unwrap(), registry.layer("dst").unwrap());
            for ((_, a), (_, b)) in src.pixels().zip(dst.pixels()) {
                assert!((a.r - b.r).abs() < 1e-3, "{format:?}: {a:?} vs {b:?}");
                if format.channels() == 4 {
                    assert!(a.approx_eq(&b, 1e-3), "{format:?}: {a:?} vs {b:?}");
                }
            }
        }
    }

    #[test]
    fn test_unknown_layer_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = registry();
        let path = dir.path().join("none.png");
        assert!(matches!(
            export_layer_png(&registry, "none", &path),
            Err(WorldLayersError::UnknownLayer(_))
        ));
        assert!(matches!(
            import_layer_image(&mut registry, "none", &path),
            Err(WorldLayersError::UnknownLayer(_))
        ));
    }

    #[test]
    fn test_load_applies_initial_data_to_immutable_layer() {
        let dir = tempfile::tempdir().unwrap();
        let seed: ImageBuffer<Luma<u8>, Vec<u8>> =
            ImageBuffer::from_fn(2, 2, |x, _| Luma([if x == 0 { 255 } else { 0 }]));
        seed.save_with_format(dir.path().join("seed.png"), ImageFormat::Png).unwrap();

        let toml_path = dir.path().join("layers.toml");
        std::fs::write(
            &toml_path,
            r#"
[world]
origin = [0.0, 0.0]
size = [4.0, 4.0]

[[layers]]
name = "mask"
format = "r8"
resolution = { mode = "absolute", width = 4, height = 4 }
mutability = "immutable"
initial_data = "seed.png"

[layers.spatial]
build_acceleration_structure = true
values_to_track = [{ r = 1.0 }]
"#,
        )
        .unwrap();

        let registry = LayerRegistry::load(&toml_path).unwrap();
        let config = registry.layer_config("mask").unwrap();
        assert_eq!(config.mutability, LayerMutability::Immutable);
        // src x = min(round(x / 4 * 2), 1): only column 0 samples the white column
        assert_eq!(registry.get_float_value_at_location("mask", Vec2::new(0.5, 0.5)), 1.0);
        assert_eq!(registry.get_float_value_at_location("mask", Vec2::new(3.5, 3.5)), 0.0);
        assert_eq!(registry.spatial_index("mask").unwrap().total_points(), 4);
    }
}
