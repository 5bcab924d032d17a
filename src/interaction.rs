// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Pointer interaction state for rendered items.
//!
//! Every shape or marker on screen owns an [`ItemInteraction`] which moves
//! between idle, dragging, resizing and text editing. Gestures that take
//! over the pointer hold a [`DragSession`]; dropping the session hands the
//! pointer back no matter how the gesture ended.

use crate::util::geometry::scale_by_distance_ratio;
use egui::{CursorIcon, PointerButton, Pos2, Vec2};
use std::cell::RefCell;
use std::rc::Rc;

/// Pointer state shared by every item on a surface.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PointerGrab {
    /// Cursor forced while a gesture is active.
    pub cursor: Option<CursorIcon>,
    /// Label text selection is disabled while a gesture is active.
    pub text_selection_locked: bool,
}

pub type SharedGrab = Rc<RefCell<PointerGrab>>;

/// An active pointer gesture. Releases the grab when dropped.
#[derive(Debug)]
pub struct DragSession {
    grab: SharedGrab,
}

impl DragSession {
    pub fn begin(grab: &SharedGrab, cursor: CursorIcon) -> Self {
        {
            let mut state = grab.borrow_mut();
            state.cursor = Some(cursor);
            state.text_selection_locked = true;
        }
        Self {
            grab: Rc::clone(grab),
        }
    }
}

impl Drop for DragSession {
    fn drop(&mut self) {
        *self.grab.borrow_mut() = PointerGrab::default();
    }
}

#[derive(Debug, Default)]
enum ItemState {
    #[default]
    Idle,
    Dragging {
        offset: Vec2,
        _session: DragSession,
    },
    DraggingLabel {
        offset: Vec2,
        position: Pos2,
        _session: DragSession,
    },
    Resizing {
        start_distance: f32,
        start_size: Vec2,
        _session: DragSession,
    },
    Editing {
        buffer: String,
        original: String,
    },
}

/// What a pointer release finished.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Released {
    Nothing,
    Drag,
    Resize,
    /// Label dropped at this offset from the item's top-left corner.
    Label(Pos2),
}

#[derive(Debug, Default)]
pub struct ItemInteraction {
    state: ItemState,
}

impl ItemInteraction {
    pub fn is_idle(&self) -> bool {
        matches!(self.state, ItemState::Idle)
    }

    #[cfg(test)]
    pub fn is_dragging(&self) -> bool {
        matches!(self.state, ItemState::Dragging { .. })
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, ItemState::Editing { .. })
    }

    /// Press on the item body. Starts a drag for the primary button when
    /// idle. `pointer` and `item_pos` must share a coordinate space.
    pub fn press_body(
        &mut self,
        grab: &SharedGrab,
        button: PointerButton,
        pointer: Pos2,
        item_pos: Pos2,
    ) -> bool {
        if button != PointerButton::Primary || !self.is_idle() {
            return false;
        }
        self.state = ItemState::Dragging {
            offset: pointer - item_pos,
            _session: DragSession::begin(grab, CursorIcon::Grabbing),
        };
        true
    }

    /// New item position for the current pointer while dragging.
    pub fn drag_to(&self, pointer: Pos2) -> Option<Pos2> {
        match &self.state {
            ItemState::Dragging { offset, .. } => Some(pointer - *offset),
            _ => None,
        }
    }

    /// Press on the item's label. `pointer` and `label_pos` are relative to
    /// the item's top-left corner.
    pub fn press_label(&mut self, grab: &SharedGrab, pointer: Pos2, label_pos: Pos2) -> bool {
        if !self.is_idle() {
            return false;
        }
        self.state = ItemState::DraggingLabel {
            offset: pointer - label_pos,
            position: label_pos,
            _session: DragSession::begin(grab, CursorIcon::Grabbing),
        };
        true
    }

    /// Move the label preview while dragging it.
    pub fn drag_label_to(&mut self, pointer: Pos2) -> Option<Pos2> {
        match &mut self.state {
            ItemState::DraggingLabel {
                offset, position, ..
            } => {
                *position = pointer - *offset;
                Some(*position)
            }
            _ => None,
        }
    }

    /// Label position to draw, while the label is being dragged.
    pub fn label_preview(&self) -> Option<Pos2> {
        match &self.state {
            ItemState::DraggingLabel { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// Press on the resize handle. Records the pointer's distance from the
    /// item centre and the size at that moment.
    pub fn press_handle(&mut self, grab: &SharedGrab, pointer: Pos2, center: Pos2, size: Vec2) -> bool {
        if !self.is_idle() {
            return false;
        }
        self.state = ItemState::Resizing {
            start_distance: pointer.distance(center),
            start_size: size,
            _session: DragSession::begin(grab, CursorIcon::ResizeSouthEast),
        };
        true
    }

    /// Size for the current pointer while resizing, scaled by the ratio of
    /// the current to the starting pointer-to-centre distance.
    pub fn resize_to(&self, pointer: Pos2, center: Pos2) -> Option<Vec2> {
        match &self.state {
            ItemState::Resizing {
                start_distance,
                start_size,
                ..
            } => {
                let distance = pointer.distance(center);
                Some(Vec2::new(
                    scale_by_distance_ratio(start_size.x, *start_distance, distance),
                    scale_by_distance_ratio(start_size.y, *start_distance, distance),
                ))
            }
            _ => None,
        }
    }

    /// Pointer released. Ends any pointer gesture and reports which one.
    pub fn release(&mut self) -> Released {
        let released = match &self.state {
            ItemState::Dragging { .. } => Released::Drag,
            ItemState::Resizing { .. } => Released::Resize,
            ItemState::DraggingLabel { position, .. } => Released::Label(*position),
            ItemState::Idle | ItemState::Editing { .. } => return Released::Nothing,
        };
        self.state = ItemState::Idle;
        released
    }

    /// Enter text editing with `current` as the starting buffer.
    pub fn begin_edit(&mut self, current: &str) {
        self.state = ItemState::Editing {
            buffer: current.to_string(),
            original: current.to_string(),
        };
    }

    pub fn edit_buffer_mut(&mut self) -> Option<&mut String> {
        match &mut self.state {
            ItemState::Editing { buffer, .. } => Some(buffer),
            _ => None,
        }
    }

    /// Leave editing. Returns the trimmed text when it differs from the
    /// text editing started with.
    pub fn commit_edit(&mut self) -> Option<String> {
        if !self.is_editing() {
            return None;
        }
        let ItemState::Editing { buffer, original } = std::mem::take(&mut self.state) else {
            return None;
        };
        let trimmed = buffer.trim();
        (trimmed != original).then(|| trimmed.to_string())
    }

    /// Leave editing and discard the buffer.
    pub fn cancel_edit(&mut self) {
        if self.is_editing() {
            self.state = ItemState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grab() -> SharedGrab {
        Rc::new(RefCell::new(PointerGrab::default()))
    }

    #[test]
    fn test_drag_keeps_pointer_offset() {
        let grab = grab();
        let mut item = ItemInteraction::default();
        assert!(item.press_body(&grab, PointerButton::Primary, Pos2::new(130.0, 150.0), Pos2::new(100.0, 100.0)));
        assert!(item.is_dragging());
        assert_eq!(grab.borrow().cursor, Some(CursorIcon::Grabbing));

        assert_eq!(item.drag_to(Pos2::new(230.0, 170.0)), Some(Pos2::new(200.0, 120.0)));
        assert_eq!(item.release(), Released::Drag);
        assert!(item.is_idle());
        assert_eq!(*grab.borrow(), PointerGrab::default());
    }

    #[test]
    fn test_secondary_button_does_not_drag() {
        let grab = grab();
        let mut item = ItemInteraction::default();
        assert!(!item.press_body(&grab, PointerButton::Secondary, Pos2::ZERO, Pos2::ZERO));
        assert!(item.is_idle());
        assert_eq!(grab.borrow().cursor, None);
    }

    #[test]
    fn test_no_drag_while_editing() {
        let grab = grab();
        let mut item = ItemInteraction::default();
        item.begin_edit("label");
        assert!(!item.press_body(&grab, PointerButton::Primary, Pos2::ZERO, Pos2::ZERO));
        assert!(item.is_editing());
        assert_eq!(item.release(), Released::Nothing);
        assert!(item.is_editing());
    }

    #[test]
    fn test_resize_scales_by_distance_ratio() {
        let grab = grab();
        let mut item = ItemInteraction::default();
        let center = Pos2::new(50.0, 50.0);
        item.press_handle(&grab, Pos2::new(60.0, 50.0), center, Vec2::splat(0.05));
        assert_eq!(grab.borrow().cursor, Some(CursorIcon::ResizeSouthEast));

        let size = item.resize_to(Pos2::new(150.0, 50.0), center).unwrap();
        assert!((size.x - 0.5).abs() < 1e-6);
        assert_eq!(item.release(), Released::Resize);
    }

    #[test]
    fn test_grab_released_when_item_dropped() {
        let grab = grab();
        {
            let mut item = ItemInteraction::default();
            item.press_body(&grab, PointerButton::Primary, Pos2::ZERO, Pos2::ZERO);
            assert!(grab.borrow().text_selection_locked);
        }
        assert!(!grab.borrow().text_selection_locked);
        assert_eq!(grab.borrow().cursor, None);
    }

    #[test]
    fn test_label_drag_reports_drop_position() {
        let grab = grab();
        let mut item = ItemInteraction::default();
        item.press_label(&grab, Pos2::new(15.0, 45.0), Pos2::new(10.0, 40.0));
        assert_eq!(item.drag_label_to(Pos2::new(25.0, 65.0)), Some(Pos2::new(20.0, 60.0)));
        assert_eq!(item.label_preview(), Some(Pos2::new(20.0, 60.0)));
        assert_eq!(item.release(), Released::Label(Pos2::new(20.0, 60.0)));
    }

    #[test]
    fn test_commit_trims_and_skips_unchanged() {
        let mut item = ItemInteraction::default();
        item.begin_edit("Nurse");
        *item.edit_buffer_mut().unwrap() = "  Nurse ".to_string();
        assert_eq!(item.commit_edit(), None);
        assert!(item.is_idle());

        item.begin_edit("Nurse");
        *item.edit_buffer_mut().unwrap() = " Scrub nurse ".to_string();
        assert_eq!(item.commit_edit().as_deref(), Some("Scrub nurse"));
    }

    #[test]
    fn test_cancel_discards_buffer() {
        let mut item = ItemInteraction::default();
        item.begin_edit("Bed");
        item.edit_buffer_mut().unwrap().push_str(" 2");
        item.cancel_edit();
        assert!(item.is_idle());
        assert_eq!(item.commit_edit(), None);
    }
}
