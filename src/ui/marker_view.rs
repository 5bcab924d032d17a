// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Marker tool view.
//!
//! Shows the reference image with circular markers on top, plus a list
//! panel with per-marker size controls. Marker positions and radii are
//! normalized to the displayed image, so they survive window resizes.

use super::hex_to_color32;
use crate::interaction::{ItemInteraction, PointerGrab, SharedGrab};
use crate::io::storage::Storage;
use crate::models::marker::{StoneMarker, MAX_MARKERS, MAX_RADIUS, MIN_RADIUS};
use crate::store::markers::MarkerStore;
use crate::util::geometry::{denormalize_coordinates, fit_rect, marker_diameter, normalize_coordinates};
use egui::{Color32, PointerButton, Pos2, Rect, Sense, Stroke, Vec2};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Size of the painted fallback when no reference image is loaded.
const FALLBACK_SIZE: (u32, u32) = (600, 400);
const HANDLE_SIZE: f32 = 12.0;
const DELETE_SIZE: f32 = 20.0;

/// Result of marker view interaction.
pub enum MarkerAction {
    None,
    Export,
    Import,
}

pub struct MarkerView {
    grab: SharedGrab,
    items: HashMap<String, ItemInteraction>,
    image: Option<(egui::TextureHandle, [u32; 2])>,
}

impl Default for MarkerView {
    fn default() -> Self {
        Self {
            grab: Rc::new(RefCell::new(PointerGrab::default())),
            items: HashMap::new(),
            image: None,
        }
    }
}

impl MarkerView {
    /// Use `texture` as the reference image.
    pub fn set_image(&mut self, texture: egui::TextureHandle, size: [u32; 2]) {
        self.image = Some((texture, size));
    }

    /// Display the marker tool and handle its interactions.
    pub fn show<S: Storage>(&mut self, ui: &mut egui::Ui, store: &mut MarkerStore<S>) -> MarkerAction {
        let mut action = MarkerAction::None;

        ui.horizontal(|ui| {
            ui.heading("Image Markers");
            ui.separator();
            let can_add = store.markers().len() < MAX_MARKERS;
            if ui.add_enabled(can_add, egui::Button::new("➕ Add Stone")).clicked() {
                if let Some(marker) = store.add() {
                    store.select(Some(marker.id.as_str()));
                }
            }
            if ui.button("💾 Export JSON").clicked() {
                action = MarkerAction::Export;
            }
            if ui.button("📂 Import JSON").clicked() {
                action = MarkerAction::Import;
            }
            if ui.button("🗑 Clear All").clicked() {
                store.clear();
                log::info!("Cleared all markers");
            }
            ui.separator();
            ui.label(format!("Stones: {}", store.markers().len()));
        });
        ui.separator();

        egui::SidePanel::right("marker_list")
            .default_width(280.0)
            .show_inside(ui, |ui| marker_list(ui, store));

        egui::CentralPanel::default().show_inside(ui, |ui| {
            self.show_image(ui, store);
        });

        if let Some(cursor) = self.grab.borrow().cursor {
            ui.ctx().set_cursor_icon(cursor);
        }

        action
    }

    fn show_image<S: Storage>(&mut self, ui: &mut egui::Ui, store: &mut MarkerStore<S>) {
        let available = ui.available_rect_before_wrap();
        let (width, height) = self.image.as_ref().map_or(FALLBACK_SIZE, |(_, [w, h])| (*w, *h));
        let image_rect = fit_rect(available, width, height);
        ui.allocate_rect(available, Sense::hover());

        let painter = ui.painter_at(available);
        match &self.image {
            Some((texture, _)) => {
                painter.image(
                    texture.id(),
                    image_rect,
                    Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                    Color32::WHITE,
                );
            }
            None => draw_fallback(&painter, image_rect),
        }
        painter.rect_stroke(image_rect, 8.0, Stroke::new(2.0, Color32::from_gray(221)));

        // Normalized coordinates are undefined on a collapsed panel.
        if image_rect.width() <= 0.0 || image_rect.height() <= 0.0 {
            return;
        }

        let markers: Vec<StoneMarker> = store.markers().to_vec();
        for marker in &markers {
            self.show_marker(ui, store, marker, image_rect);
        }
        self.items.retain(|id, _| store.get(id).is_some());
    }

    fn show_marker<S: Storage>(&mut self, ui: &mut egui::Ui, store: &mut MarkerStore<S>, marker: &StoneMarker, image_rect: Rect) {
        let id = ui.id().with(("marker", &marker.id));
        let item = self.items.entry(marker.id.clone()).or_default();
        let active = store.active_id() == Some(marker.id.as_str());

        let center = denormalize_coordinates(Pos2::new(marker.x, marker.y), image_rect);
        let diameter = marker_diameter(marker.radius, image_rect.size());
        let rect = Rect::from_center_size(center, Vec2::splat(diameter));
        let color = hex_to_color32(&marker.color, Color32::from_rgb(0xFF, 0x63, 0x84));

        let body = ui.interact(rect, id, Sense::click_and_drag());
        let hovered = body.hovered() || ui.rect_contains_pointer(rect.expand(DELETE_SIZE / 2.0));
        let show_controls = hovered || active || !item.is_idle();

        let painter = ui.painter();
        if active {
            painter.circle_filled(center, diameter / 2.0 + 5.0, color.gamma_multiply(0.3));
        }
        let fill_alpha = if active { 0.6 } else if hovered { 0.5 } else { 0.25 };
        painter.circle(
            center,
            diameter / 2.0,
            color.gamma_multiply(fill_alpha),
            Stroke::new(3.0, color),
        );

        let handle = show_controls.then(|| {
            let handle_rect = Rect::from_center_size(rect.right_bottom(), Vec2::splat(HANDLE_SIZE));
            ui.painter().circle(
                handle_rect.center(),
                HANDLE_SIZE / 2.0,
                Color32::from_rgb(0x34, 0x98, 0xDB),
                Stroke::new(2.0, Color32::WHITE),
            );
            ui.interact(handle_rect, id.with("handle"), Sense::drag())
        });
        let delete = (show_controls && item.is_idle()).then(|| {
            let delete_rect = Rect::from_center_size(rect.right_top(), Vec2::splat(DELETE_SIZE));
            ui.painter()
                .circle_filled(delete_rect.center(), DELETE_SIZE / 2.0, Color32::from_rgb(0xE7, 0x4C, 0x3C));
            ui.painter().text(
                delete_rect.center(),
                egui::Align2::CENTER_CENTER,
                "×",
                egui::FontId::proportional(14.0),
                Color32::WHITE,
            );
            ui.interact(delete_rect, id.with("delete"), Sense::click())
                .on_hover_text("Delete stone")
        });

        if let Some(delete) = delete {
            if delete.clicked() {
                store.delete(&marker.id);
                log::info!("Deleted marker {}", marker.id);
                return;
            }
        }

        if body.clicked() {
            store.select(Some(marker.id.as_str()));
        }

        let press = ui.input(|i| i.pointer.press_origin());
        if body.drag_started_by(PointerButton::Primary) {
            if let Some(press) = press {
                let pointer = normalize_coordinates(press, image_rect);
                if item.press_body(&self.grab, PointerButton::Primary, pointer, Pos2::new(marker.x, marker.y)) {
                    store.select(Some(marker.id.as_str()));
                }
            }
        }
        if let Some(handle) = &handle {
            if handle.drag_started_by(PointerButton::Primary) {
                if let Some(press) = press {
                    if item.press_handle(&self.grab, press, center, Vec2::splat(marker.radius)) {
                        store.select(Some(marker.id.as_str()));
                    }
                }
            }
        }

        if let Some(pointer) = ui.input(|i| i.pointer.interact_pos()) {
            if let Some(pos) = item.drag_to(normalize_coordinates(pointer, image_rect)) {
                store.move_to(&marker.id, pos.x, pos.y);
            }
            if let Some(size) = item.resize_to(pointer, center) {
                store.set_radius(&marker.id, size.x);
            }
        }

        if ui.input(|i| i.pointer.any_released() || !i.pointer.any_down()) {
            item.release();
        }
    }
}

/// List panel with one row per marker.
fn marker_list<S: Storage>(ui: &mut egui::Ui, store: &mut MarkerStore<S>) {
    ui.horizontal(|ui| {
        ui.heading("Stone List");
        ui.label(egui::RichText::new(store.markers().len().to_string()).strong());
    });
    ui.separator();

    if store.markers().is_empty() {
        ui.vertical_centered(|ui| {
            ui.add_space(20.0);
            ui.label("No stones added yet");
            ui.label(egui::RichText::new("Click \"Add Stone\" to get started").small().weak());
        });
        return;
    }

    let markers: Vec<StoneMarker> = store.markers().to_vec();
    let active = store.active_id().map(str::to_string);
    egui::ScrollArea::vertical().id_source("stone_list").show(ui, |ui| {
        for marker in &markers {
            let is_active = active.as_deref() == Some(marker.id.as_str());
            let frame = if is_active {
                egui::Frame::group(ui.style()).fill(ui.visuals().selection.bg_fill.gamma_multiply(0.3))
            } else {
                egui::Frame::group(ui.style())
            };
            frame.show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.horizontal(|ui| {
                    let (dot, _) = ui.allocate_exact_size(Vec2::splat(16.0), Sense::hover());
                    ui.painter()
                        .circle_filled(dot.center(), 8.0, hex_to_color32(&marker.color, Color32::GRAY));
                    if ui.selectable_label(is_active, marker.id.as_str()).clicked() {
                        store.select(Some(marker.id.as_str()));
                    }
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("🗑").on_hover_text("Delete stone").clicked() {
                            store.delete(&marker.id);
                        }
                        if ui
                            .add_enabled(marker.radius > MIN_RADIUS, egui::Button::new("⬇").small())
                            .on_hover_text("Decrease size")
                            .clicked()
                        {
                            store.decrease_size(&marker.id);
                        }
                        if ui
                            .add_enabled(marker.radius < MAX_RADIUS, egui::Button::new("⬆").small())
                            .on_hover_text("Increase size")
                            .clicked()
                        {
                            store.increase_size(&marker.id);
                        }
                    });
                });
                ui.label(
                    egui::RichText::new(format!(
                        "X: {:.1}% | Y: {:.1}% | Size: {:.1}%",
                        marker.x * 100.0,
                        marker.y * 100.0,
                        marker.radius * 100.0
                    ))
                    .small()
                    .weak(),
                );
                ui.label(egui::RichText::new(format!("Color: {}", marker.color)).small().weak());
            });
        }
    });
}

/// Painted stand-in for the reference image.
fn draw_fallback(painter: &egui::Painter, rect: Rect) {
    painter.rect_filled(rect, 8.0, Color32::from_rgb(0xF8, 0xF9, 0xFA));

    let scale = rect.width() / FALLBACK_SIZE.0 as f32;
    let at = |x: f32, y: f32| rect.min + Vec2::new(x, y) * scale;
    let outline: Vec<Pos2> = (0..64)
        .map(|i| {
            let t = i as f32 / 64.0 * std::f32::consts::TAU;
            // Bean outline with an inward notch on the right side.
            let notch = 1.0 - 0.25 * (t.cos().max(0.0)).powi(4);
            at(230.0 + 110.0 * t.cos() * notch, 190.0 + 90.0 * t.sin())
        })
        .collect();
    painter.add(egui::Shape::closed_line(
        outline,
        Stroke::new(3.0, Color32::from_rgb(0x8B, 0x45, 0x13)),
    ));
    painter.add(egui::Shape::convex_polygon(
        vec![at(150.0, 130.0), at(230.0, 100.0), at(310.0, 130.0), at(310.0, 250.0), at(230.0, 280.0), at(150.0, 250.0)],
        Color32::from_rgb(0xD4, 0xA5, 0x74).gamma_multiply(0.6),
        Stroke::NONE,
    ));
    painter.circle_filled(at(230.0, 180.0), 60.0 * scale, Color32::from_rgb(0xC4, 0x95, 0x6A).gamma_multiply(0.7));

    painter.text(
        at(300.0, 50.0),
        egui::Align2::CENTER_CENTER,
        "Kidney Stone Marker",
        egui::FontId::proportional(20.0 * scale),
        Color32::from_rgb(0x2C, 0x3E, 0x50),
    );
    painter.text(
        at(300.0, 350.0),
        egui::Align2::CENTER_CENTER,
        "Click \"Add Stone\" to place markers",
        egui::FontId::proportional(14.0 * scale),
        Color32::from_gray(0x66),
    );
}
