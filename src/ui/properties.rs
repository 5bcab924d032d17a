// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Properties panel for the selected shape.
//!
//! Lists every shape on the canvas and lets the user edit the label,
//! color and size of the selected one.

use super::hex_to_color32;
use crate::io::storage::Storage;
use crate::models::shape::{COLOR_OPTIONS, MIN_SHAPE_SIZE};
use crate::store::canvas::ShapeStore;
use egui::{Color32, Sense, Stroke, Vec2};

#[derive(Default)]
pub struct PropertiesPanel {
    /// Label text while the label field has focus.
    draft: String,
}

impl PropertiesPanel {
    pub fn show<S: Storage>(&mut self, ui: &mut egui::Ui, store: &mut ShapeStore<S>) {
        ui.heading("Properties");
        ui.separator();

        match store.selected().cloned() {
            Some(shape) => {
                egui::Grid::new("shape_properties")
                    .num_columns(2)
                    .spacing([8.0, 6.0])
                    .show(ui, |ui| {
                        ui.label("Type:");
                        ui.label(shape.kind.as_str());
                        ui.end_row();

                        ui.label("Id:");
                        ui.label(egui::RichText::new(&shape.id).monospace().weak());
                        ui.end_row();

                        ui.label("Label:");
                        let label_id = egui::Id::new("properties_label");
                        if !ui.memory(|m| m.has_focus(label_id)) {
                            self.draft.clone_from(&shape.text);
                        }
                        let response = ui.add(egui::TextEdit::singleline(&mut self.draft).id(label_id));
                        if response.lost_focus() {
                            let trimmed = self.draft.trim().to_string();
                            if trimmed != shape.text {
                                store.update_text(&shape.id, &trimmed);
                            }
                        }
                        ui.end_row();

                        ui.label("Width:");
                        let mut width = shape.width;
                        if ui
                            .add(egui::DragValue::new(&mut width).clamp_range(MIN_SHAPE_SIZE..=2000.0).suffix(" px"))
                            .changed()
                        {
                            store.update_size(&shape.id, width, shape.height);
                        }
                        ui.end_row();

                        ui.label("Height:");
                        let mut height = shape.height;
                        if ui
                            .add(egui::DragValue::new(&mut height).clamp_range(MIN_SHAPE_SIZE..=2000.0).suffix(" px"))
                            .changed()
                        {
                            store.update_size(&shape.id, shape.width, height);
                        }
                        ui.end_row();

                        ui.label("Position:");
                        ui.label(format!("({:.0}, {:.0})", shape.x, shape.y));
                        ui.end_row();
                    });

                ui.add_space(8.0);
                ui.label("Color:");
                ui.horizontal_wrapped(|ui| {
                    for color in COLOR_OPTIONS {
                        let (rect, response) = ui.allocate_exact_size(Vec2::splat(20.0), Sense::click());
                        let current = shape.display_color().eq_ignore_ascii_case(color);
                        let stroke = if current {
                            Stroke::new(2.0, Color32::from_rgb(0x21, 0x96, 0xF3))
                        } else {
                            Stroke::new(1.0, Color32::from_gray(120))
                        };
                        ui.painter().rect(rect, 3.0, hex_to_color32(color, Color32::GRAY), stroke);
                        if response.on_hover_text(color).clicked() {
                            store.update_color(&shape.id, color);
                        }
                    }
                });

                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.button("Bring to Front").clicked() {
                        store.bring_to_front(&shape.id);
                    }
                    if ui.button("🗑 Delete").clicked() {
                        store.delete(&shape.id);
                        log::info!("Deleted shape {} from panel", shape.id);
                    }
                });
            }
            None => {
                self.draft.clear();
                ui.label(egui::RichText::new("No shape selected").weak());
            }
        }

        ui.add_space(12.0);
        ui.separator();
        ui.label(format!("Shapes ({})", store.shapes().len()));

        let entries: Vec<(String, String)> = store
            .shapes()
            .iter()
            .map(|s| (s.id.clone(), format!("{} · {}", s.kind, s.text)))
            .collect();
        let selected = store.selected_id().map(str::to_string);
        egui::ScrollArea::vertical().id_source("shape_list").show(ui, |ui| {
            for (id, label) in entries {
                let is_selected = selected.as_deref() == Some(id.as_str());
                if ui.selectable_label(is_selected, label).clicked() {
                    store.select(Some(id.as_str()));
                }
            }
        });
    }
}
