// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Geometric utility functions.
//!
//! This module provides coordinate conversions between screen space,
//! container-relative pixels, and coordinates normalized against an
//! image, plus the distance-ratio rule used by resize handles.

use egui::{Pos2, Rect, Vec2};

/// Convert a screen position to container-relative pixels, accounting for
/// how far the container content is scrolled.
pub fn screen_to_container(screen: Pos2, container_origin: Pos2, scroll: Vec2) -> Pos2 {
    screen - container_origin.to_vec2() + scroll
}

/// Convert container-relative pixels back to a screen position.
pub fn container_to_screen(local: Pos2, container_origin: Pos2, scroll: Vec2) -> Pos2 {
    local + container_origin.to_vec2() - scroll
}

/// Convert a screen position to coordinates normalized (0.0 to 1.0)
/// against `image_rect`.
pub fn normalize_coordinates(screen: Pos2, image_rect: Rect) -> Pos2 {
    let local = screen - image_rect.min;
    Pos2::new(local.x / image_rect.width(), local.y / image_rect.height())
}

/// Convert normalized coordinates to a screen position inside `image_rect`.
pub fn denormalize_coordinates(normalized: Pos2, image_rect: Rect) -> Pos2 {
    image_rect.min + Vec2::new(normalized.x * image_rect.width(), normalized.y * image_rect.height())
}

/// Scale `start_value` by how much further the pointer is from the
/// centre than when the resize began. A zero starting distance leaves the
/// value unchanged.
pub fn scale_by_distance_ratio(start_value: f32, start_distance: f32, current_distance: f32) -> f32 {
    if start_distance <= f32::EPSILON {
        return start_value;
    }
    start_value * (current_distance / start_distance)
}

/// On-screen diameter of a marker whose radius is normalized against the
/// smaller image dimension.
pub fn marker_diameter(radius: f32, image_size: Vec2) -> f32 {
    radius * image_size.x.min(image_size.y) * 2.0
}

/// Largest rect with the image's aspect ratio that fits centred in
/// `available`.
pub fn fit_rect(available: Rect, image_width: u32, image_height: u32) -> Rect {
    let img_aspect = image_width as f32 / image_height.max(1) as f32;
    let available_aspect = available.width() / available.height().max(1.0);

    let size = if img_aspect > available_aspect {
        // Image is wider - fit to width
        Vec2::new(available.width(), available.width() / img_aspect)
    } else {
        // Image is taller - fit to height
        Vec2::new(available.height() * img_aspect, available.height())
    };
    Rect::from_center_size(available.center(), size)
}
