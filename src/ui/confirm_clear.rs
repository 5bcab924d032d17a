// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Confirmation dialog shown before clearing the canvas.

/// User's answer to the dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Pending,
    Confirmed,
    Cancelled,
}

/// Display the dialog centred over the window.
pub fn show(ctx: &egui::Context) -> Confirmation {
    let mut answer = Confirmation::Pending;

    egui::Window::new("Clear Canvas")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label("Are you sure you want to remove every shape from the canvas?");
            ui.label(egui::RichText::new("This cannot be undone.").weak());
            ui.add_space(8.0);
            ui.horizontal(|ui| {
                if ui.button("Cancel").clicked() {
                    answer = Confirmation::Cancelled;
                }
                let clear = egui::Button::new(egui::RichText::new("Clear").color(egui::Color32::WHITE))
                    .fill(egui::Color32::from_rgb(0xDC, 0x35, 0x45));
                if ui.add(clear).clicked() {
                    answer = Confirmation::Confirmed;
                }
            });
        });

    if answer == Confirmation::Pending && ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
        answer = Confirmation::Cancelled;
    }
    answer
}
