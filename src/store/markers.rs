// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Marker store for the image marker tool.
//!
//! Holds the marker list and the active (highlighted) marker. Mutations
//! that change a marker persist the whole list; radius and position
//! clamps are applied on every write path.

use crate::io::storage::{Storage, MARKERS_KEY};
use crate::models::marker::{clamp_position, clamp_radius, StoneMarker, MAX_MARKERS, RADIUS_STEP};

const ID_PREFIX: &str = "stone";

pub struct MarkerStore<S: Storage> {
    storage: S,
    markers: Vec<StoneMarker>,
    active: Option<String>,
    counter: usize,
}

impl<S: Storage> MarkerStore<S> {
    /// Create a store, loading any previously persisted markers.
    pub fn load(storage: S) -> Self {
        let markers = match storage.get(MARKERS_KEY) {
            Ok(Some(json)) => serde_json::from_str::<Vec<StoneMarker>>(&json).unwrap_or_else(|e| {
                log::error!("Error loading saved markers: {}", e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                log::error!("Failed to read saved markers: {}", e);
                Vec::new()
            }
        };

        let mut store = Self {
            storage,
            markers: Vec::new(),
            active: None,
            counter: 0,
        };
        store.set_markers(markers);
        store
    }

    pub fn markers(&self) -> &[StoneMarker] {
        &self.markers
    }

    pub fn get(&self, id: &str) -> Option<&StoneMarker> {
        self.markers.iter().find(|m| m.id == id)
    }

    #[cfg(test)]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Add a marker at the image centre. Returns `None` once the list is full.
    pub fn add(&mut self) -> Option<StoneMarker> {
        if self.markers.len() >= MAX_MARKERS {
            log::warn!("Marker limit of {} reached", MAX_MARKERS);
            return None;
        }
        self.counter += 1;
        let marker = StoneMarker::new(format!("{ID_PREFIX}{}", self.counter), self.markers.len());
        self.markers.push(marker.clone());
        log::debug!("Added marker {}", marker.id);
        self.save();
        Some(marker)
    }

    pub fn delete(&mut self, id: &str) {
        self.markers.retain(|m| m.id != id);
        if self.active.as_deref() == Some(id) {
            self.active = None;
        }
        self.save();
    }

    pub fn clear(&mut self) {
        self.markers.clear();
        self.active = None;
        self.save();
    }

    /// Replace the list, clamping radii into range.
    pub fn replace_all(&mut self, markers: Vec<StoneMarker>) {
        self.set_markers(markers);
        log::info!("Loaded {} markers", self.markers.len());
        self.save();
    }

    fn set_markers(&mut self, mut markers: Vec<StoneMarker>) {
        for marker in &mut markers {
            marker.radius = clamp_radius(marker.radius);
        }
        // Resume numbering past the highest existing id
        self.counter = markers
            .iter()
            .filter_map(|m| m.id.strip_prefix(ID_PREFIX)?.parse::<usize>().ok())
            .max()
            .unwrap_or(0)
            .max(self.counter);
        self.markers = markers;
    }

    pub fn select(&mut self, id: Option<&str>) {
        self.active = id.map(str::to_string);
    }

    /// The active marker id, if it still names a marker.
    pub fn active_id(&self) -> Option<&str> {
        self.active
            .as_deref()
            .filter(|id| self.markers.iter().any(|m| m.id == *id))
    }

    pub fn increase_size(&mut self, id: &str) {
        if let Some(radius) = self.get(id).map(|m| m.radius) {
            self.set_radius(id, radius + RADIUS_STEP);
        }
    }

    pub fn decrease_size(&mut self, id: &str) {
        if let Some(radius) = self.get(id).map(|m| m.radius) {
            self.set_radius(id, radius - RADIUS_STEP);
        }
    }

    /// Set a marker's radius, clamped into range. Returns false when the id
    /// is unknown or the radius is not finite.
    pub fn set_radius(&mut self, id: &str, radius: f32) -> bool {
        if !radius.is_finite() {
            return false;
        }
        let radius = clamp_radius(radius);
        let Some(marker) = self.markers.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        if marker.radius != radius {
            marker.radius = radius;
            self.save();
        }
        true
    }

    /// Move a marker centre, keeping it inside the draggable band. Returns
    /// false when the id is unknown or the position is not finite.
    pub fn move_to(&mut self, id: &str, x: f32, y: f32) -> bool {
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        let Some(marker) = self.markers.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        let x = clamp_position(x);
        let y = clamp_position(y);
        if marker.x != x || marker.y != y {
            marker.x = x;
            marker.y = y;
            self.save();
        }
        true
    }

    fn save(&mut self) {
        match serde_json::to_string(&self.markers) {
            Ok(json) => {
                if let Err(e) = self.storage.set(MARKERS_KEY, &json) {
                    log::error!("Failed to persist markers: {}", e);
                }
            }
            Err(e) => log::error!("Failed to serialize markers: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::storage::MemoryStorage;
    use crate::interaction::{ItemInteraction, PointerGrab};
    use crate::models::marker::{MAX_RADIUS, MIN_RADIUS, POSITION_MAX, POSITION_MIN};
    use egui::{Pos2, Vec2};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn store() -> MarkerStore<MemoryStorage> {
        MarkerStore::load(MemoryStorage::new())
    }

    #[test]
    fn test_add_assigns_ids_and_colors() {
        let mut store = store();
        let first = store.add().unwrap();
        let second = store.add().unwrap();
        assert_eq!(first.id, "stone1");
        assert_eq!(second.id, "stone2");
        assert_eq!(second.color_index, 1);
        assert_eq!(store.storage().writes(), 2);
    }

    #[test]
    fn test_add_stops_at_limit() {
        let mut store = store();
        for _ in 0..MAX_MARKERS {
            assert!(store.add().is_some());
        }
        assert!(store.add().is_none());
        assert_eq!(store.markers().len(), MAX_MARKERS);
    }

    #[test]
    fn test_size_buttons_clamp() {
        let mut store = store();
        let marker = store.add().unwrap();
        for _ in 0..20 {
            store.increase_size(&marker.id);
        }
        assert_eq!(store.get(&marker.id).unwrap().radius, MAX_RADIUS);

        let writes = store.storage().writes();
        store.increase_size(&marker.id);
        assert_eq!(store.storage().writes(), writes);

        for _ in 0..20 {
            store.decrease_size(&marker.id);
        }
        assert_eq!(store.get(&marker.id).unwrap().radius, MIN_RADIUS);
    }

    #[test]
    fn test_move_to_stays_in_band() {
        let mut store = store();
        let marker = store.add().unwrap();
        assert!(store.move_to(&marker.id, 2.0, -2.0));
        let moved = store.get(&marker.id).unwrap();
        assert_eq!((moved.x, moved.y), (POSITION_MAX, POSITION_MIN));

        let writes = store.storage().writes();
        assert!(store.move_to(&marker.id, POSITION_MAX, POSITION_MIN));
        assert_eq!(store.storage().writes(), writes);
        assert!(!store.move_to("missing", 0.1, 0.1));
    }

    #[test]
    fn test_non_finite_input_keeps_saved_markers() {
        let mut store = store();
        let marker = store.add().unwrap();
        store.add();
        let writes = store.storage().writes();

        assert!(!store.move_to(&marker.id, f32::NAN, f32::NAN));
        assert!(!store.set_radius(&marker.id, f32::NAN));
        assert_eq!(store.storage().writes(), writes);

        let json = store.storage().get(MARKERS_KEY).unwrap().unwrap();
        let reloaded = MarkerStore::load(MemoryStorage::with_value(MARKERS_KEY, &json));
        assert_eq!(reloaded.markers().len(), 2);
        assert_eq!((reloaded.markers()[0].x, reloaded.markers()[0].y), (0.5, 0.5));
    }

    #[test]
    fn test_handle_drag_to_ten_times_distance_hits_max_radius() {
        let mut store = store();
        let marker = store.add().unwrap();
        assert_eq!(marker.radius, 0.05);

        let grab = Rc::new(RefCell::new(PointerGrab::default()));
        let mut item = ItemInteraction::default();
        let center = Pos2::new(100.0, 100.0);
        assert!(item.press_handle(&grab, Pos2::new(110.0, 100.0), center, Vec2::splat(marker.radius)));

        let size = item.resize_to(Pos2::new(200.0, 100.0), center).unwrap();
        assert!(store.set_radius(&marker.id, size.x));
        assert_eq!(store.get(&marker.id).unwrap().radius, MAX_RADIUS);
        assert_eq!(MAX_RADIUS, 0.15);
    }

    #[test]
    fn test_reload_does_not_reuse_ids() {
        let mut store = store();
        for _ in 0..3 {
            store.add();
        }
        store.delete("stone1");
        let json = store.storage().get(MARKERS_KEY).unwrap().unwrap();

        let mut reloaded = MarkerStore::load(MemoryStorage::with_value(MARKERS_KEY, &json));
        let marker = reloaded.add().unwrap();
        assert_eq!(marker.id, "stone4");
    }

    #[test]
    fn test_delete_active_clears_it() {
        let mut store = store();
        let marker = store.add().unwrap();
        store.select(Some(&marker.id));
        assert_eq!(store.active_id(), Some("stone1"));
        store.delete(&marker.id);
        assert_eq!(store.active_id(), None);
    }

    #[test]
    fn test_malformed_saved_markers_load_empty() {
        let store = MarkerStore::load(MemoryStorage::with_value(MARKERS_KEY, "[{"));
        assert!(store.markers().is_empty());
    }
}
