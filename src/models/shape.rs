// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Diagram shape data structures.
//!
//! This module defines the shapes placed on the diagram canvas, the
//! palette of preset shapes, and the fixed color swatches.

use serde::{Deserialize, Serialize};

/// Color used when a shape has no color of its own.
pub const DEFAULT_SHAPE_COLOR: &str = "#FFEB3B";

/// Size of a freshly placed shape, in pixels.
pub const DEFAULT_SHAPE_SIZE: f32 = 100.0;

/// Smallest width or height a resize may produce.
pub const MIN_SHAPE_SIZE: f32 = 20.0;

/// Swatches offered by the shape color picker.
pub const COLOR_OPTIONS: [&str; 10] = [
    "#FFEB3B", // Yellow
    "#F44336", // Red
    "#4CAF50", // Green
    "#2196F3", // Blue
    "#9C27B0", // Purple
    "#FF9800", // Orange
    "#795548", // Brown
    "#607D8B", // Blue Grey
    "#FFFFFF", // White
    "#000000", // Black
];

/// Geometric variant of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Circle,
    Square,
}

impl ShapeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Circle => "circle",
            ShapeKind::Square => "square",
        }
    }
}

impl std::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label offset relative to the shape's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextPosition {
    pub x: f32,
    pub y: f32,
}

/// A shape placed on the canvas. Coordinates are container-relative pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub width: f32,
    pub height: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_position: Option<TextPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
}

impl Shape {
    /// Color to render with, falling back to the default for missing or
    /// blank values.
    pub fn display_color(&self) -> &str {
        match self.color.as_deref() {
            Some(c) if !c.trim().is_empty() => c,
            _ => DEFAULT_SHAPE_COLOR,
        }
    }
}

/// Persisted diagram document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasState {
    pub shapes: Vec<Shape>,
}

/// A preset the user can arm as the placement tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapePaletteItem {
    pub kind: ShapeKind,
    pub label: &'static str,
    pub color: &'static str,
    pub width: f32,
    pub height: f32,
}

const fn preset(kind: ShapeKind, label: &'static str, color: &'static str) -> ShapePaletteItem {
    ShapePaletteItem {
        kind,
        label,
        color,
        width: DEFAULT_SHAPE_SIZE,
        height: DEFAULT_SHAPE_SIZE,
    }
}

pub static SHAPE_PALETTE: [ShapePaletteItem; 8] = [
    preset(ShapeKind::Circle, "Surgeon", "#FFEB3B"),
    preset(ShapeKind::Square, "Nurse", "#4CAF50"),
    preset(ShapeKind::Circle, "Anesthetist", "#F44336"),
    preset(ShapeKind::Square, "Technician", "#2196F3"),
    preset(ShapeKind::Circle, "Patient", "#9C27B0"),
    preset(ShapeKind::Square, "Equipment 1", "#FF9800"),
    preset(ShapeKind::Circle, "Equipment 2", "#00BCD4"),
    preset(ShapeKind::Square, "Bed", "#795548"),
];

/// Parse a `#RGB` or `#RRGGBB` hex string.
pub fn parse_hex_color(hex: &str) -> Option<[u8; 3]> {
    let digits = hex.trim().trim_start_matches('#');
    if !digits.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match digits.len() {
        6 => Some([
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
        ]),
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in digits.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                rgb[i] = v * 17;
            }
            Some(rgb)
        }
        _ => None,
    }
}
