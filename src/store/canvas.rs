// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Diagram shape store.
//!
//! Owns the ordered shape collection and the current selection. Every
//! effective mutation writes a full snapshot to storage and publishes it
//! to subscribers before returning. Lookups by id never fail loudly: an
//! unknown id is a no-op.

use super::StoreEvent;
use crate::io::storage::{Storage, CANVAS_STATE_KEY};
use crate::models::shape::{
    CanvasState, Shape, ShapeKind, ShapePaletteItem, TextPosition, DEFAULT_SHAPE_COLOR,
    DEFAULT_SHAPE_SIZE, MIN_SHAPE_SIZE,
};
use rand::Rng;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

const ID_LEN: usize = 9;

pub struct ShapeStore<S: Storage> {
    storage: S,
    state: Arc<CanvasState>,
    selected: Option<String>,
    subscribers: Vec<Sender<StoreEvent>>,
    /// Set when a drag is released so the click that ends it does not
    /// place a new shape on the background.
    pub suppress_next_click: bool,
}

impl<S: Storage> ShapeStore<S> {
    /// Create a store, loading any previously persisted diagram.
    pub fn load(storage: S) -> Self {
        let state = match storage.get(CANVAS_STATE_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<CanvasState>(&json) {
                Ok(state) => {
                    log::info!("Loaded {} shapes", state.shapes.len());
                    state
                }
                Err(e) => {
                    log::error!("Discarding malformed canvas state: {}", e);
                    CanvasState::default()
                }
            },
            Ok(None) => CanvasState::default(),
            Err(e) => {
                log::error!("Failed to read canvas state: {}", e);
                CanvasState::default()
            }
        };

        Self {
            storage,
            state: Arc::new(state),
            selected: None,
            subscribers: Vec::new(),
            suppress_next_click: false,
        }
    }

    /// Current snapshot.
    pub fn state(&self) -> Arc<CanvasState> {
        Arc::clone(&self.state)
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.state.shapes
    }

    pub fn get(&self, id: &str) -> Option<&Shape> {
        self.state.shapes.iter().find(|s| s.id == id)
    }

    #[cfg(test)]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Receive every future state snapshot and selection change.
    pub fn subscribe(&mut self) -> Receiver<StoreEvent> {
        let (sender, receiver) = channel();
        self.subscribers.push(sender);
        receiver
    }

    /// Place a new shape with default size and color.
    pub fn add(&mut self, kind: ShapeKind, x: f32, y: f32) -> Shape {
        let count = self.state.shapes.iter().filter(|s| s.kind == kind).count();
        let shape = Shape {
            id: self.generate_id(),
            kind,
            x,
            y,
            text: format!("{} {}", kind, count + 1),
            width: DEFAULT_SHAPE_SIZE,
            height: DEFAULT_SHAPE_SIZE,
            color: Some(DEFAULT_SHAPE_COLOR.to_string()),
            text_position: None,
            z_index: None,
        };
        self.push(shape)
    }

    /// Place a new shape copying label, color and size from a palette item.
    pub fn add_from_template(&mut self, item: &ShapePaletteItem, x: f32, y: f32) -> Shape {
        let shape = Shape {
            id: self.generate_id(),
            kind: item.kind,
            x,
            y,
            text: item.label.to_string(),
            width: item.width,
            height: item.height,
            color: Some(item.color.to_string()),
            text_position: None,
            z_index: None,
        };
        self.push(shape)
    }

    fn push(&mut self, shape: Shape) -> Shape {
        Arc::make_mut(&mut self.state).shapes.push(shape.clone());
        log::debug!("Added {} {} at ({:.1}, {:.1})", shape.kind, shape.id, shape.x, shape.y);
        self.save_state();
        shape
    }

    /// Move a shape. Returns false when the id is unknown or the position
    /// is not finite.
    pub fn update_position(&mut self, id: &str, x: f32, y: f32) -> bool {
        if !x.is_finite() || !y.is_finite() {
            log::warn!("Ignoring non-finite position for {}", id);
            return false;
        }
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let shape = &self.state.shapes[idx];
        if shape.x != x || shape.y != y {
            let shape = &mut Arc::make_mut(&mut self.state).shapes[idx];
            shape.x = x;
            shape.y = y;
            self.save_state();
        }
        true
    }

    /// Resize a shape, never below the minimum size. Returns false when the
    /// id is unknown or the size is not finite.
    pub fn update_size(&mut self, id: &str, width: f32, height: f32) -> bool {
        if !width.is_finite() || !height.is_finite() {
            log::warn!("Ignoring non-finite size for {}", id);
            return false;
        }
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let width = width.max(MIN_SHAPE_SIZE);
        let height = height.max(MIN_SHAPE_SIZE);
        let shape = &self.state.shapes[idx];
        if shape.width != width || shape.height != height {
            let shape = &mut Arc::make_mut(&mut self.state).shapes[idx];
            shape.width = width;
            shape.height = height;
            self.save_state();
        }
        true
    }

    pub fn update_text(&mut self, id: &str, text: &str) {
        if let Some(idx) = self.index_of(id) {
            if self.state.shapes[idx].text != text {
                Arc::make_mut(&mut self.state).shapes[idx].text = text.to_string();
                self.save_state();
            }
        }
    }

    pub fn update_color(&mut self, id: &str, color: &str) {
        if let Some(idx) = self.index_of(id) {
            if self.state.shapes[idx].color.as_deref() != Some(color) {
                Arc::make_mut(&mut self.state).shapes[idx].color = Some(color.to_string());
                self.save_state();
            }
        }
    }

    pub fn update_text_position(&mut self, id: &str, position: TextPosition) {
        if let Some(idx) = self.index_of(id) {
            if self.state.shapes[idx].text_position != Some(position) {
                Arc::make_mut(&mut self.state).shapes[idx].text_position = Some(position);
                self.save_state();
            }
        }
    }

    /// Remove a shape. Persists even when the id is unknown.
    pub fn delete(&mut self, id: &str) {
        Arc::make_mut(&mut self.state).shapes.retain(|s| s.id != id);
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
            self.publish(StoreEvent::Selection(None));
        }
        log::debug!("Deleted shape {}", id);
        self.save_state();
    }

    /// Remove every shape and clear the selection.
    pub fn clear(&mut self) {
        Arc::make_mut(&mut self.state).shapes.clear();
        self.select(None);
        log::info!("Cleared canvas");
        self.save_state();
    }

    /// Set the selection. Selection is session-only and never persisted.
    pub fn select(&mut self, id: Option<&str>) {
        self.selected = id.map(str::to_string);
        self.publish(StoreEvent::Selection(self.selected.clone()));
    }

    /// The selected id, if it still names a shape.
    pub fn selected_id(&self) -> Option<&str> {
        self.selected
            .as_deref()
            .filter(|id| self.state.shapes.iter().any(|s| s.id == *id))
    }

    pub fn selected(&self) -> Option<&Shape> {
        self.selected_id().and_then(|id| self.get(id))
    }

    /// Overwrite the whole collection. The selection is left as is.
    pub fn replace_all(&mut self, shapes: Vec<Shape>) {
        Arc::make_mut(&mut self.state).shapes = shapes;
        log::info!("Replaced canvas with {} shapes", self.state.shapes.len());
        self.save_state();
    }

    /// Move a shape to the top of the stacking order. Returns whether
    /// anything changed.
    pub fn bring_to_front(&mut self, id: &str) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let last = self.state.shapes.len() - 1;
        let own_z = self.state.shapes[idx].z_index.unwrap_or(0);
        let max_other = self
            .state
            .shapes
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, s)| s.z_index.unwrap_or(0))
            .max();
        let raise_to = max_other.filter(|m| *m > own_z);

        if idx == last && raise_to.is_none() {
            return false;
        }

        let shapes = &mut Arc::make_mut(&mut self.state).shapes;
        let mut shape = shapes.remove(idx);
        if let Some(z) = raise_to {
            shape.z_index = Some(z);
        }
        shapes.push(shape);
        self.save_state();
        true
    }

    /// Indices of shapes in paint order, bottom first.
    pub fn render_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.state.shapes.len()).collect();
        order.sort_by_key(|&i| self.state.shapes[i].z_index.unwrap_or(0));
        order
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.state.shapes.iter().position(|s| s.id == id)
    }

    fn generate_id(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let id: String = (0..ID_LEN)
                .filter_map(|_| std::char::from_digit(rng.gen_range(0..36), 36))
                .collect();
            if self.index_of(&id).is_none() {
                return id;
            }
        }
    }

    fn save_state(&mut self) {
        match serde_json::to_string(&*self.state) {
            Ok(json) => {
                if let Err(e) = self.storage.set(CANVAS_STATE_KEY, &json) {
                    log::error!("Failed to persist canvas state: {}", e);
                }
            }
            Err(e) => log::error!("Failed to serialize canvas state: {}", e),
        }
        self.publish(StoreEvent::State(Arc::clone(&self.state)));
    }

    fn publish(&mut self, event: StoreEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}
