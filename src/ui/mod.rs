// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! UI components for the Sketchboard application.

pub mod canvas;
pub mod capture_modal;
pub mod confirm_clear;
pub mod marker_view;
pub mod properties;
pub mod toolbar;

/// Convert a hex color string to an egui color, falling back to `fallback`
/// when the string does not parse.
pub fn hex_to_color32(hex: &str, fallback: egui::Color32) -> egui::Color32 {
    crate::models::shape::parse_hex_color(hex)
        .map(|[r, g, b]| egui::Color32::from_rgb(r, g, b))
        .unwrap_or(fallback)
}

/// Dark or light text, whichever reads better on `fill`.
pub fn contrasting_text(fill: egui::Color32) -> egui::Color32 {
    let luma = 0.299 * fill.r() as f32 + 0.587 * fill.g() as f32 + 0.114 * fill.b() as f32;
    if luma > 150.0 {
        egui::Color32::from_gray(20)
    } else {
        egui::Color32::WHITE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::Color32;

    #[test]
    fn test_hex_to_color32() {
        assert_eq!(hex_to_color32("#F44336", Color32::RED), Color32::from_rgb(0xF4, 0x43, 0x36));
        assert_eq!(hex_to_color32("nope", Color32::RED), Color32::RED);
    }

    #[test]
    fn test_contrasting_text() {
        assert_eq!(contrasting_text(Color32::from_rgb(0xFF, 0xEB, 0x3B)), Color32::from_gray(20));
        assert_eq!(contrasting_text(Color32::BLACK), Color32::WHITE);
    }
}
