// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Persistent state stores for the diagram editor and the marker tool.

pub mod canvas;
pub mod markers;

use crate::models::shape::CanvasState;
use std::sync::Arc;

/// Notification sent to store subscribers after a change.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A new immutable snapshot of the diagram.
    State(Arc<CanvasState>),
    /// The selected shape id changed.
    Selection(Option<String>),
}
