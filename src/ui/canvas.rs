// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Diagram canvas.
//!
//! This module provides the scrollable drawing surface where shapes are
//! rendered in stacking order and can be dragged, resized, relabelled and
//! recolored. Clicking empty space reports a placement for the armed tool.

use super::{contrasting_text, hex_to_color32};
use crate::interaction::{ItemInteraction, PointerGrab, Released, SharedGrab};
use crate::io::storage::Storage;
use crate::models::shape::{Shape, ShapeKind, TextPosition, COLOR_OPTIONS, DEFAULT_SHAPE_COLOR};
use crate::store::canvas::ShapeStore;
use crate::util::geometry::{container_to_screen, screen_to_container};
use egui::{Color32, Key, PointerButton, Pos2, Rect, Sense, Stroke, Vec2};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Minimum scrollable area of the canvas.
const CANVAS_SIZE: Vec2 = Vec2::new(2400.0, 1600.0);
const GRID_STEP: f32 = 50.0;
const HANDLE_SIZE: f32 = 12.0;
const SWATCH_SIZE: f32 = 18.0;
/// Labels longer than this are shortened, with the full text on hover.
const MAX_LABEL_CHARS: usize = 30;

const SELECTION_COLOR: Color32 = Color32::from_rgb(0x21, 0x96, 0xF3);

/// Result of canvas interaction.
pub enum CanvasAction {
    None,
    /// Empty canvas clicked at this container-relative point.
    Place(Pos2),
}

/// Maps between screen space and container-relative pixels for one frame.
#[derive(Clone, Copy)]
struct Surface {
    origin: Pos2,
    scroll: Vec2,
}

impl Surface {
    fn to_screen(self, local: Pos2) -> Pos2 {
        container_to_screen(local, self.origin, self.scroll)
    }

    fn to_local(self, screen: Pos2) -> Pos2 {
        screen_to_container(screen, self.origin, self.scroll)
    }
}

/// Per-shape interaction state that outlives a single frame.
pub struct DiagramCanvas {
    grab: SharedGrab,
    items: HashMap<String, ItemInteraction>,
    color_picker: Option<String>,
}

impl Default for DiagramCanvas {
    fn default() -> Self {
        Self {
            grab: Rc::new(RefCell::new(PointerGrab::default())),
            items: HashMap::new(),
            color_picker: None,
        }
    }
}

impl DiagramCanvas {
    /// Whether a label is being edited on the canvas.
    pub fn is_editing(&self) -> bool {
        self.items.values().any(ItemInteraction::is_editing)
    }

    /// Display the canvas and handle pointer interaction.
    pub fn show<S: Storage>(&mut self, ui: &mut egui::Ui, store: &mut ShapeStore<S>, placing: bool) -> CanvasAction {
        let mut action = CanvasAction::None;

        let extent = store.shapes().iter().fold(CANVAS_SIZE, |acc, s| {
            acc.max(Vec2::new(s.x + s.width, s.y + s.height) + Vec2::splat(GRID_STEP))
        });

        egui::ScrollArea::both()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                let (rect, background) = ui.allocate_exact_size(extent, Sense::click());
                let viewport = ui.clip_rect();
                let surface = Surface {
                    origin: viewport.min,
                    scroll: viewport.min - rect.min,
                };

                draw_background(ui.painter(), rect, viewport);

                // Paint order, bottom first. Later items win hit tests.
                let shapes: Vec<Shape> = store
                    .render_order()
                    .into_iter()
                    .map(|i| store.shapes()[i].clone())
                    .collect();
                for shape in &shapes {
                    self.show_shape(ui, store, shape, surface);
                }
                self.items.retain(|id, _| store.get(id).is_some());
                if let Some(id) = &self.color_picker {
                    if store.get(id).is_none() {
                        self.color_picker = None;
                    }
                }

                if background.clicked() && !store.suppress_next_click {
                    self.color_picker = None;
                    if placing {
                        if let Some(pos) = background.interact_pointer_pos() {
                            action = CanvasAction::Place(surface.to_local(pos));
                        }
                    }
                }
                if background.secondary_clicked() {
                    store.select(None);
                    self.color_picker = None;
                }
                store.suppress_next_click = false;

                if shapes.is_empty() {
                    draw_hint(ui.painter(), viewport, placing);
                }
            });

        if let Some(cursor) = self.grab.borrow().cursor {
            ui.ctx().set_cursor_icon(cursor);
        }

        action
    }

    fn show_shape<S: Storage>(&mut self, ui: &mut egui::Ui, store: &mut ShapeStore<S>, shape: &Shape, surface: Surface) {
        let id = ui.id().with(("shape", &shape.id));
        let item = self.items.entry(shape.id.clone()).or_default();
        let selected = store.selected_id() == Some(shape.id.as_str());

        let local_min = Pos2::new(shape.x, shape.y);
        let size = Vec2::new(shape.width, shape.height);
        let rect = Rect::from_min_size(surface.to_screen(local_min), size);

        let fill = hex_to_color32(shape.display_color(), hex_to_color32(DEFAULT_SHAPE_COLOR, Color32::YELLOW));
        let stroke = if selected {
            Stroke::new(3.0, SELECTION_COLOR)
        } else {
            Stroke::new(1.5, Color32::from_gray(60))
        };
        let painter = ui.painter();
        match shape.kind {
            ShapeKind::Circle => {
                painter.add(egui::Shape::convex_polygon(ellipse_points(rect), fill, stroke));
            }
            ShapeKind::Square => {
                painter.rect(rect, 4.0, fill, stroke);
            }
        }

        let body = ui.interact(rect, id, Sense::click_and_drag());

        // Label
        let display_text = shorten(&shape.text);
        let galley = ui.painter().layout(
            display_text.clone(),
            egui::FontId::proportional(14.0),
            contrasting_text(fill),
            shape.width.max(60.0),
        );
        let label_offset = item
            .label_preview()
            .or_else(|| shape.text_position.map(|p| Pos2::new(p.x, p.y)))
            .unwrap_or_else(|| (size / 2.0 - galley.size() / 2.0).to_pos2());
        let label_rect = Rect::from_min_size(rect.min + label_offset.to_vec2(), galley.size());

        if let Some(buffer) = item.edit_buffer_mut() {
            let edit_rect = Rect::from_center_size(label_rect.center(), Vec2::new(shape.width.max(60.0), 22.0));
            let response = ui.put(edit_rect, egui::TextEdit::singleline(buffer));
            if response.lost_focus() {
                // Consumed so the same Escape does not also clear the selection.
                if ui.input_mut(|i| i.consume_key(egui::Modifiers::NONE, Key::Escape)) {
                    item.cancel_edit();
                } else if let Some(text) = item.commit_edit() {
                    store.update_text(&shape.id, &text);
                }
            } else if !response.has_focus() {
                response.request_focus();
            }
            if !selected {
                item.cancel_edit();
            }
        } else {
            ui.painter().galley(label_rect.min, galley, Color32::PLACEHOLDER);
        }

        let label_sense = if item.is_editing() {
            Sense::hover()
        } else {
            Sense::click_and_drag()
        };
        let mut label = ui.interact(label_rect, id.with("label"), label_sense);
        if display_text != shape.text {
            label = label.on_hover_text(shape.text.as_str());
        }

        // Handle and color swatch are only offered on the selected shape.
        let handle = selected.then(|| {
            let handle_rect = Rect::from_center_size(rect.right_bottom(), Vec2::splat(HANDLE_SIZE));
            ui.painter().circle(
                handle_rect.center(),
                HANDLE_SIZE / 2.0,
                SELECTION_COLOR,
                Stroke::new(2.0, Color32::WHITE),
            );
            ui.interact(handle_rect, id.with("handle"), Sense::drag())
        });
        let swatch = selected.then(|| {
            let swatch_rect = Rect::from_center_size(rect.right_top(), Vec2::splat(SWATCH_SIZE));
            ui.painter().circle(
                swatch_rect.center(),
                SWATCH_SIZE / 2.0,
                fill,
                Stroke::new(2.0, Color32::WHITE),
            );
            ui.interact(swatch_rect, id.with("swatch"), Sense::click())
                .on_hover_text("Change color")
        });

        let pointer = ui.input(|i| i.pointer.interact_pos()).map(|p| surface.to_local(p));
        let press = ui.input(|i| i.pointer.press_origin()).map(|p| surface.to_local(p));

        if body.clicked() || label.clicked() {
            store.select(Some(shape.id.as_str()));
            store.bring_to_front(&shape.id);
        }
        if body.double_clicked() || label.double_clicked() {
            store.select(Some(shape.id.as_str()));
            item.begin_edit(&shape.text);
        }

        if body.drag_started_by(PointerButton::Primary) {
            if let Some(press) = press {
                if item.press_body(&self.grab, PointerButton::Primary, press, local_min) {
                    store.select(Some(shape.id.as_str()));
                    store.bring_to_front(&shape.id);
                }
            }
        }
        if label.drag_started_by(PointerButton::Primary) {
            if let Some(press) = press {
                if item.press_label(&self.grab, press - local_min.to_vec2(), label_offset) {
                    store.bring_to_front(&shape.id);
                }
            }
        }
        if let Some(handle) = &handle {
            // Shapes grow from their top-left corner.
            if handle.drag_started_by(PointerButton::Primary) {
                if let Some(press) = press {
                    item.press_handle(&self.grab, press, local_min, size);
                }
            }
        }
        if let Some(swatch) = &swatch {
            if swatch.clicked() {
                self.color_picker = match &self.color_picker {
                    Some(open) if *open == shape.id => None,
                    _ => Some(shape.id.clone()),
                };
            }
        }

        if let Some(pointer) = pointer {
            if let Some(pos) = item.drag_to(pointer) {
                store.update_position(&shape.id, pos.x, pos.y);
            }
            if let Some(new_size) = item.resize_to(pointer, local_min) {
                store.update_size(&shape.id, new_size.x, new_size.y);
            }
            item.drag_label_to(pointer - local_min.to_vec2());
        }

        let released = ui.input(|i| i.pointer.any_released() || !i.pointer.any_down());
        if released {
            match item.release() {
                Released::Drag => store.suppress_next_click = true,
                Released::Label(pos) => {
                    store.update_text_position(&shape.id, TextPosition { x: pos.x, y: pos.y })
                }
                Released::Resize | Released::Nothing => {}
            }
        }

        if self.color_picker.as_deref() == Some(shape.id.as_str()) {
            if let Some(color) = color_picker(ui, id, rect.right_top() + Vec2::new(SWATCH_SIZE, 0.0)) {
                store.update_color(&shape.id, color);
                self.color_picker = None;
            }
        }
    }
}

/// Show the color swatch popup. Returns the picked color.
fn color_picker(ui: &egui::Ui, id: egui::Id, pos: Pos2) -> Option<&'static str> {
    let mut picked = None;
    egui::Area::new(id.with("color_picker"))
        .order(egui::Order::Foreground)
        .fixed_pos(pos)
        .show(ui.ctx(), |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                egui::Grid::new(id.with("swatches")).spacing([4.0, 4.0]).show(ui, |ui| {
                    for (i, color) in COLOR_OPTIONS.iter().enumerate() {
                        let (rect, response) = ui.allocate_exact_size(Vec2::splat(22.0), Sense::click());
                        let stroke_color = if response.hovered() {
                            SELECTION_COLOR
                        } else {
                            Color32::from_gray(120)
                        };
                        ui.painter()
                            .rect(rect, 3.0, hex_to_color32(color, Color32::GRAY), Stroke::new(1.0, stroke_color));
                        if response.on_hover_text(*color).clicked() {
                            picked = Some(*color);
                        }
                        if i % 5 == 4 {
                            ui.end_row();
                        }
                    }
                });
            });
        });
    picked
}

fn draw_background(painter: &egui::Painter, rect: Rect, viewport: Rect) {
    painter.rect_filled(rect, 0.0, Color32::from_gray(248));

    let visible = rect.intersect(viewport);
    let grid = Stroke::new(1.0, Color32::from_gray(230));
    let first_x = rect.min.x + ((visible.min.x - rect.min.x) / GRID_STEP).floor() * GRID_STEP;
    let mut x = first_x;
    while x <= visible.max.x {
        painter.line_segment([Pos2::new(x, visible.min.y), Pos2::new(x, visible.max.y)], grid);
        x += GRID_STEP;
    }
    let first_y = rect.min.y + ((visible.min.y - rect.min.y) / GRID_STEP).floor() * GRID_STEP;
    let mut y = first_y;
    while y <= visible.max.y {
        painter.line_segment([Pos2::new(visible.min.x, y), Pos2::new(visible.max.x, y)], grid);
        y += GRID_STEP;
    }
}

fn draw_hint(painter: &egui::Painter, viewport: Rect, placing: bool) {
    let text = if placing {
        "Click anywhere to place the selected shape"
    } else {
        "Pick a shape in the toolbar, then click on the canvas"
    };
    painter.text(
        viewport.center(),
        egui::Align2::CENTER_CENTER,
        text,
        egui::FontId::proportional(16.0),
        Color32::from_gray(150),
    );
}

fn ellipse_points(rect: Rect) -> Vec<Pos2> {
    const SEGMENTS: usize = 48;
    let radius = rect.size() / 2.0;
    (0..SEGMENTS)
        .map(|i| {
            let t = i as f32 / SEGMENTS as f32 * std::f32::consts::TAU;
            rect.center() + Vec2::new(t.cos() * radius.x, t.sin() * radius.y)
        })
        .collect()
}

/// Shorten long labels to `MAX_LABEL_CHARS`, marking the cut with an ellipsis.
fn shorten(text: &str) -> String {
    if text.chars().count() <= MAX_LABEL_CHARS {
        return text.to_string();
    }
    let mut short: String = text.chars().take(MAX_LABEL_CHARS - 1).collect();
    short.push('…');
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::storage::MemoryStorage;

    /// Result of one headless frame.
    struct Frame {
        placed: bool,
        escape_left: bool,
    }

    fn run_frame(
        ctx: &egui::Context,
        canvas: &mut DiagramCanvas,
        store: &mut ShapeStore<MemoryStorage>,
        events: Vec<egui::Event>,
    ) -> Frame {
        let input = egui::RawInput {
            screen_rect: Some(Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0))),
            events,
            ..Default::default()
        };
        let mut frame = Frame {
            placed: false,
            escape_left: false,
        };
        let _ = ctx.run(input, |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| {
                if let CanvasAction::Place(_) = canvas.show(ui, store, true) {
                    frame.placed = true;
                }
            });
            frame.escape_left = ctx.input(|i| i.key_pressed(Key::Escape));
        });
        frame
    }

    fn button(pos: Pos2, pressed: bool) -> egui::Event {
        egui::Event::PointerButton {
            pos,
            button: PointerButton::Primary,
            pressed,
            modifiers: egui::Modifiers::NONE,
        }
    }

    #[test]
    fn test_shorten_long_labels() {
        assert_eq!(shorten("circle 1"), "circle 1");
        let long = "a".repeat(40);
        let short = shorten(&long);
        assert_eq!(short.chars().count(), MAX_LABEL_CHARS);
        assert!(short.ends_with('…'));
    }

    #[test]
    fn test_surface_round_trip() {
        let surface = Surface {
            origin: Pos2::new(100.0, 50.0),
            scroll: Vec2::new(30.0, 0.0),
        };
        let local = surface.to_local(Pos2::new(150.0, 80.0));
        assert_eq!(local, Pos2::new(80.0, 30.0));
        assert_eq!(surface.to_screen(local), Pos2::new(150.0, 80.0));
    }

    #[test]
    fn test_drag_release_does_not_place_a_shape() {
        let ctx = egui::Context::default();
        let mut canvas = DiagramCanvas::default();
        let mut store = ShapeStore::load(MemoryStorage::new());
        let shape = store.add(ShapeKind::Square, 100.0, 100.0);

        // Near the top-left corner, away from the centred label.
        let start = Pos2::new(118.0, 118.0);
        let end = start + Vec2::new(100.0, 100.0);
        let frames = vec![
            vec![egui::Event::PointerMoved(start)],
            vec![button(start, true)],
            vec![egui::Event::PointerMoved(start + Vec2::new(50.0, 50.0))],
            vec![egui::Event::PointerMoved(end)],
            vec![button(end, false)],
            vec![],
        ];
        for events in frames {
            let frame = run_frame(&ctx, &mut canvas, &mut store, events);
            assert!(!frame.placed);
            assert!(!store.suppress_next_click);
        }

        let moved = store.get(&shape.id).unwrap();
        assert!((moved.x - 200.0).abs() < 1.0, "x = {}", moved.x);
        assert!((moved.y - 200.0).abs() < 1.0, "y = {}", moved.y);
        assert_eq!(store.selected_id(), Some(shape.id.as_str()));
    }

    #[test]
    fn test_escape_cancels_edit_without_leaking_key() {
        let ctx = egui::Context::default();
        let mut canvas = DiagramCanvas::default();
        let mut store = ShapeStore::load(MemoryStorage::new());
        let shape = store.add(ShapeKind::Circle, 100.0, 100.0);
        store.select(Some(shape.id.as_str()));
        canvas.items.entry(shape.id.clone()).or_default().begin_edit(&shape.text);

        // First frame focuses the text field.
        run_frame(&ctx, &mut canvas, &mut store, vec![]);
        assert!(canvas.is_editing());

        let escape = egui::Event::Key {
            key: Key::Escape,
            physical_key: None,
            pressed: true,
            repeat: false,
            modifiers: egui::Modifiers::NONE,
        };
        let frame = run_frame(&ctx, &mut canvas, &mut store, vec![escape]);
        assert!(!frame.escape_left);
        assert!(!canvas.is_editing());
        assert_eq!(store.selected_id(), Some(shape.id.as_str()));
        assert_eq!(store.get(&shape.id).unwrap().text, shape.text);
    }

    #[test]
    fn test_ellipse_points_stay_inside_rect() {
        let rect = Rect::from_min_size(Pos2::new(10.0, 20.0), Vec2::new(100.0, 40.0));
        let points = ellipse_points(rect);
        assert_eq!(points.len(), 48);
        assert!(points.iter().all(|p| rect.expand(0.01).contains(*p)));
    }
}
