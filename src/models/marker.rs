// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Marker data structures for the image marker tool.
//!
//! Markers are circles whose position and radius are normalized
//! (0.0 to 1.0) against the reference image.

use serde::{Deserialize, Serialize};

pub const MIN_RADIUS: f32 = 0.02;
pub const MAX_RADIUS: f32 = 0.15;
pub const DEFAULT_RADIUS: f32 = 0.05;

/// Step used by the size buttons in the marker list.
pub const RADIUS_STEP: f32 = 0.01;

/// Dragging keeps a marker centre inside this band.
pub const POSITION_MIN: f32 = 0.05;
pub const POSITION_MAX: f32 = 0.95;

pub const MAX_MARKERS: usize = 100;

/// A circular marker on the reference image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoneMarker {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub color: String,
    pub color_index: usize,
}

impl StoneMarker {
    pub fn new(id: String, index: usize) -> Self {
        let color_index = index % MARKER_PALETTE.len();
        Self {
            id,
            x: 0.5,
            y: 0.5,
            radius: DEFAULT_RADIUS,
            color: MARKER_PALETTE[color_index].to_string(),
            color_index,
        }
    }
}

/// Clamp a radius into the allowed marker range.
pub fn clamp_radius(radius: f32) -> f32 {
    radius.clamp(MIN_RADIUS, MAX_RADIUS)
}

/// Clamp a marker centre coordinate into the draggable band.
pub fn clamp_position(value: f32) -> f32 {
    value.clamp(POSITION_MIN, POSITION_MAX)
}

/// Marker colors, assigned in order as markers are added.
pub const MARKER_PALETTE: [&str; 100] = [
    // Reds
    "#FF6B6B", "#E74C3C", "#C0392B", "#FF3838", "#EE5A24", "#FF7675", "#F1948A", "#EC7063", "#CD6155", "#E55039",
    // Oranges
    "#FF9500", "#F39C12", "#E67E22", "#D35400", "#FF9F43", "#FAB1A0", "#F8C471", "#F7DC6F", "#F4D03F", "#F1C40F",
    // Yellows
    "#FFD32A", "#FFEAA7", "#FDCB6E", "#F9E79F", "#F7DC6F", "#F4D03F", "#F1C40F", "#D4AC0D", "#B7950B", "#F39801",
    // Greens
    "#8CC152", "#2ECC71", "#27AE60", "#58D68D", "#82E0AA", "#A9DFBF", "#00B894", "#00CEC9", "#1ABC9C", "#16A085",
    // Teals
    "#4ECDC4", "#37D5D3", "#81ECEC", "#00D2D3", "#0ABDE3", "#74B9FF", "#00CEC9", "#48CAE4", "#00B4D8", "#0077B6",
    // Blues
    "#45B7D1", "#3498DB", "#2980B9", "#5DADE2", "#85C1E9", "#AED6F1", "#54A0FF", "#0984E3", "#74B9FF", "#006BA6",
    // Purples
    "#9B59B6", "#8E44AD", "#6C5CE7", "#5F27CD", "#A29BFE", "#BB8FCE", "#D7BDE2", "#AF7AC5", "#C44569", "#8E44AD",
    // Pinks
    "#DDA0DD", "#FD79A8", "#FF9FF3", "#F8B500", "#D5A6BD", "#E91E63", "#AD1457", "#880E4F", "#C2185B", "#E91E63",
    // Browns and grays
    "#96CEB4", "#95A5A6", "#7F8C8D", "#BDC3C7", "#ECF0F1", "#AEB6BF", "#85929E", "#5D6D7E", "#34495E", "#2C3E50",
    // Mixed
    "#636E72", "#B2BEC3", "#DDD", "#55A3FF", "#3742FA", "#2F3542", "#98D8C8", "#A3E4D7", "#FAD7A0", "#2D3436",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_marker_defaults() {
        let marker = StoneMarker::new("stone1".into(), 101);
        assert_eq!(marker.color_index, 1);
        assert_eq!(marker.color, "#E74C3C");
        assert_eq!((marker.x, marker.y, marker.radius), (0.5, 0.5, DEFAULT_RADIUS));
    }

    #[test]
    fn test_clamp_radius() {
        assert_eq!(clamp_radius(0.5), MAX_RADIUS);
        assert_eq!(clamp_radius(0.001), MIN_RADIUS);
        assert_eq!(clamp_radius(0.07), 0.07);
    }
}
