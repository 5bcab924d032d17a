// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Toolbar and tool selection UI.
//!
//! This module provides the toolbar for switching views, arming a
//! placement tool and running common diagram operations.

use super::hex_to_color32;
use crate::app::{Tool, View};
use crate::capture::CaptureKind;
use crate::models::shape::{ShapeKind, DEFAULT_SHAPE_COLOR, SHAPE_PALETTE};

/// Result of toolbar interaction.
pub enum ToolbarAction {
    None,
    DeleteSelected,
    ExportDiagram,
    ImportDiagram,
    ClearCanvas,
    Capture(CaptureKind),
}

/// Display the toolbar.
pub fn show(ui: &mut egui::Ui, view: &mut View, armed: &mut Option<Tool>, has_selection: bool) -> ToolbarAction {
    let mut action = ToolbarAction::None;

    ui.horizontal_wrapped(|ui| {
        ui.spacing_mut().item_spacing.x = 8.0;

        if ui.selectable_label(*view == View::Diagram, "✏ Diagram").clicked() {
            *view = View::Diagram;
        }
        if ui.selectable_label(*view == View::Markers, "◎ Markers").clicked() {
            *view = View::Markers;
        }

        ui.separator();

        if *view == View::Diagram {
            ui.label("Shapes:");

            let circle = Tool::Shape(ShapeKind::Circle);
            if ui.selectable_label(*armed == Some(circle), "⭕ Circle").clicked() {
                *armed = Some(circle);
            }
            let square = Tool::Shape(ShapeKind::Square);
            if ui.selectable_label(*armed == Some(square), "⬜ Square").clicked() {
                *armed = Some(square);
            }

            ui.menu_button("Presets ⏷", |ui| {
                for (i, item) in SHAPE_PALETTE.iter().enumerate() {
                    let glyph = match item.kind {
                        ShapeKind::Circle => "⏺",
                        ShapeKind::Square => "⏹",
                    };
                    let color = hex_to_color32(item.color, hex_to_color32(DEFAULT_SHAPE_COLOR, egui::Color32::YELLOW));
                    let text = egui::RichText::new(format!("{glyph} {}", item.label)).color(color);
                    if ui.selectable_label(*armed == Some(Tool::Preset(i)), text).clicked() {
                        *armed = Some(Tool::Preset(i));
                        ui.close_menu();
                    }
                }
            });

            ui.separator();

            if ui.add_enabled(has_selection, egui::Button::new("🗑 Delete")).clicked() {
                action = ToolbarAction::DeleteSelected;
            }
            if ui.button("💾 Export").clicked() {
                action = ToolbarAction::ExportDiagram;
            }
            if ui.button("📂 Import").clicked() {
                action = ToolbarAction::ImportDiagram;
            }
            if ui.button("Clear").clicked() {
                action = ToolbarAction::ClearCanvas;
            }

            ui.separator();
        }

        if ui.button("📷").on_hover_text("Capture image").clicked() {
            action = ToolbarAction::Capture(CaptureKind::Image);
        }
        if ui.button("🎥").on_hover_text("Record video").clicked() {
            action = ToolbarAction::Capture(CaptureKind::Video);
        }
        if ui.button("🎤").on_hover_text("Record audio").clicked() {
            action = ToolbarAction::Capture(CaptureKind::Audio);
        }

        ui.separator();

        // Tool description
        let tool_text = match (*view, *armed) {
            (View::Markers, _) => "Drag markers to move them, drag the blue handle to resize".to_string(),
            (View::Diagram, None) => "Pick a shape, then click on the canvas to place it".to_string(),
            (View::Diagram, Some(tool)) => format!("Click on the canvas to place: {}", tool.label()),
        };
        ui.label(egui::RichText::new(tool_text).italics().weak());
    });

    action
}
