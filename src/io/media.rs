// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Image file loading.
//!
//! Decodes images into RGBA pixel buffers suitable for uploading as egui
//! textures.

use anyhow::{Context, Result};
use std::path::Path;

/// A decoded RGBA8 image.
pub struct LoadedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl LoadedImage {
    pub fn to_color_image(&self) -> egui::ColorImage {
        egui::ColorImage::from_rgba_unmultiplied(
            [self.width as usize, self.height as usize],
            &self.pixels,
        )
    }
}

/// Load and decode an image file.
pub fn load_image(path: &Path) -> Result<LoadedImage> {
    let img = image::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(from_dynamic(img))
}

/// Decode an in-memory encoded image.
pub fn decode_image(bytes: &[u8]) -> Result<LoadedImage> {
    let img = image::load_from_memory(bytes).context("Failed to decode image")?;
    Ok(from_dynamic(img))
}

fn from_dynamic(img: image::DynamicImage) -> LoadedImage {
    let rgba = img.to_rgba8();
    LoadedImage {
        width: rgba.width(),
        height: rgba.height(),
        pixels: rgba.into_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_png_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!((loaded.width, loaded.height), (3, 2));
        assert_eq!(&loaded.pixels[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load_image(Path::new("/nonexistent/reference.png")).is_err());
    }
}
