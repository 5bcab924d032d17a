// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Main application state and egui App implementation.
//!
//! This module contains the main application structure that implements
//! the egui::App trait, owning the shape and marker stores and routing
//! actions from the UI components to them.

use crate::capture::{CaptureKind, CaptureResult};
use crate::config::AppConfig;
use crate::io::media::LoadedImage;
use crate::io::serialization;
use crate::io::storage::{FileStorage, MemoryStorage, Storage};
use crate::models::shape::{ShapeKind, DEFAULT_SHAPE_SIZE, SHAPE_PALETTE};
use crate::store::canvas::ShapeStore;
use crate::store::markers::MarkerStore;
use crate::store::StoreEvent;
use crate::ui::canvas::{CanvasAction, DiagramCanvas};
use crate::ui::capture_modal::{CaptureWindow, ModalOutcome};
use crate::ui::confirm_clear::{self, Confirmation};
use crate::ui::marker_view::{MarkerAction, MarkerView};
use crate::ui::properties::PropertiesPanel;
use crate::ui::toolbar::{self, ToolbarAction};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};

type AppStorage = Box<dyn Storage>;

/// Placement tool armed in the toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Shape(ShapeKind),
    /// Index into the shape palette.
    Preset(usize),
}

impl Tool {
    pub fn label(&self) -> &'static str {
        match self {
            Tool::Shape(kind) => kind.as_str(),
            Tool::Preset(i) => SHAPE_PALETTE.get(*i).map_or("preset", |item| item.label),
        }
    }
}

/// Which screen is shown in the central panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Diagram,
    Markers,
}

/// Main application state.
pub struct SketchboardApp {
    view: View,

    /// Tool placed by clicking empty canvas
    armed: Option<Tool>,

    shapes: ShapeStore<AppStorage>,
    markers: MarkerStore<AppStorage>,
    store_events: Receiver<StoreEvent>,

    canvas: DiagramCanvas,
    properties: PropertiesPanel,
    marker_view: MarkerView,

    confirm_clear: bool,
    capture: Option<CaptureWindow>,
    /// Whether capture drives the local camera and microphone.
    capture_devices: bool,
    show_about: bool,

    /// Receiver for background reference image loading
    image_loader: Option<Receiver<Result<LoadedImage, String>>>,

    /// Loading state message
    loading_message: Option<String>,

    /// Last user-facing outcome, shown in the status bar
    status: Option<String>,
}

impl SketchboardApp {
    /// Create a new Sketchboard application instance.
    pub fn new(_cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        let mut shapes = ShapeStore::load(open_storage(&config.data_dir));
        let store_events = shapes.subscribe();
        let markers = MarkerStore::load(open_storage(&config.data_dir));

        #[cfg(feature = "devices")]
        let capture_devices = config.capture_devices && crate::capture::device::devices_available();
        #[cfg(not(feature = "devices"))]
        let capture_devices = false;
        log::info!(
            "Capture uses {}",
            if capture_devices { "local devices" } else { "the file fallback" }
        );

        let mut app = Self {
            view: View::Diagram,
            armed: None,
            shapes,
            markers,
            store_events,
            canvas: DiagramCanvas::default(),
            properties: PropertiesPanel::default(),
            marker_view: MarkerView::default(),
            confirm_clear: false,
            capture: None,
            capture_devices,
            show_about: false,
            image_loader: None,
            loading_message: None,
            status: None,
        };
        if let Some(path) = config.reference_image {
            app.load_reference_image(path);
        }
        app
    }

    /// Load the marker tool's reference image (asynchronously).
    fn load_reference_image(&mut self, path: PathBuf) {
        let (sender, receiver) = channel();
        self.image_loader = Some(receiver);
        self.loading_message = Some("Loading reference image...".to_string());

        // Spawn background thread for loading
        std::thread::spawn(move || {
            let result = crate::io::media::load_image(&path)
                .map(|image| {
                    log::info!("Loaded image: {} ({}x{})", path.display(), image.width, image.height);
                    image
                })
                .map_err(|e| format!("Failed to load image: {:#}", e));
            let _ = sender.send(result);
        });
    }

    /// Add a shape for the armed tool, centred on `pos`.
    fn place_shape(&mut self, tool: Tool, pos: egui::Pos2) {
        let shape = match tool {
            Tool::Shape(kind) => {
                let half = DEFAULT_SHAPE_SIZE / 2.0;
                self.shapes.add(kind, pos.x - half, pos.y - half)
            }
            Tool::Preset(i) => {
                let Some(item) = SHAPE_PALETTE.get(i) else {
                    return;
                };
                self.shapes
                    .add_from_template(item, pos.x - item.width / 2.0, pos.y - item.height / 2.0)
            }
        };
        log::info!("Placed {} \"{}\"", shape.kind, shape.text);
    }

    fn delete_selected(&mut self) {
        if let Some(id) = self.shapes.selected_id().map(str::to_string) {
            self.shapes.delete(&id);
            log::info!("Deleted shape {}, total: {}", id, self.shapes.shapes().len());
        }
    }

    /// Export the diagram to a JSON file.
    fn export_diagram(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .set_file_name("diagram.json")
            .save_file()
        else {
            return;
        };
        let snapshot = self.shapes.state();
        let result = serialization::shapes_to_json(&snapshot.shapes)
            .and_then(|json| serialization::write_export(&path, &json));
        self.report(result.map(|_| format!("Exported {} shapes to {}", snapshot.shapes.len(), path.display())));
    }

    /// Replace the diagram with shapes from a JSON file.
    fn import_diagram(&mut self) {
        let Some(path) = rfd::FileDialog::new().add_filter("JSON", &["json"]).pick_file() else {
            return;
        };
        let result = serialization::read_import(&path).and_then(|json| {
            let shapes = serialization::shapes_from_json(&json)?;
            let count = shapes.len();
            self.shapes.replace_all(shapes);
            Ok(format!("Imported {} shapes from {}", count, path.display()))
        });
        self.report(result);
    }

    fn export_markers(&mut self) {
        let filename = serialization::marker_export_filename(chrono::Local::now().date_naive());
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .set_file_name(filename)
            .save_file()
        else {
            return;
        };
        let result = serialization::markers_to_json(self.markers.markers())
            .and_then(|json| serialization::write_export(&path, &json));
        self.report(result.map(|_| format!("Exported {} markers to {}", self.markers.markers().len(), path.display())));
    }

    fn import_markers(&mut self) {
        let Some(path) = rfd::FileDialog::new().add_filter("JSON", &["json"]).pick_file() else {
            return;
        };
        let result = serialization::read_import(&path).and_then(|json| {
            let markers = serialization::markers_from_json(&json)?;
            let count = markers.len();
            self.markers.replace_all(markers);
            Ok(format!("Imported {} markers from {}", count, path.display()))
        });
        self.report(result);
    }

    /// Offer to save a finished capture to disk.
    fn save_capture(&mut self, result: CaptureResult) {
        let Some(path) = rfd::FileDialog::new()
            .set_file_name(result.suggested_name.as_str())
            .save_file()
        else {
            return;
        };
        let written = std::fs::write(&path, &result.payload)
            .map_err(anyhow::Error::from)
            .map(|_| format!("Saved {} {} to {}", result.kind.as_str(), result.mime_type, path.display()));
        self.report(written);
    }

    fn open_capture(&mut self, kind: CaptureKind) {
        if self.capture.is_none() {
            log::info!("Opening {} capture", kind.as_str());
            self.capture = Some(CaptureWindow::open(kind, self.capture_devices));
        }
    }

    fn report(&mut self, result: anyhow::Result<String>) {
        match result {
            Ok(message) => {
                log::info!("{}", message);
                self.status = Some(message);
            }
            Err(e) => {
                log::error!("{:#}", e);
                self.status = Some(format!("Error: {:#}", e));
            }
        }
    }

    fn drain_store_events(&mut self) {
        for event in self.store_events.try_iter() {
            match event {
                StoreEvent::State(state) => log::debug!("Canvas now has {} shapes", state.shapes.len()),
                StoreEvent::Selection(selected) => log::debug!("Selection changed to {:?}", selected),
            }
        }
    }

    fn handle_keyboard(&mut self, ctx: &egui::Context) {
        // Only process if no text field is focused (to avoid deleting while editing labels)
        if ctx.wants_keyboard_input() || self.canvas.is_editing() {
            return;
        }
        let (delete, escape) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace),
                i.key_pressed(egui::Key::Escape),
            )
        });
        match self.view {
            View::Diagram => {
                if delete {
                    self.delete_selected();
                }
                if escape {
                    self.shapes.select(None);
                }
            }
            View::Markers => {
                if delete {
                    if let Some(id) = self.markers.active_id().map(str::to_string) {
                        self.markers.delete(&id);
                    }
                }
                if escape {
                    self.markers.select(None);
                }
            }
        }
    }

    fn check_image_loader(&mut self, ctx: &egui::Context) {
        let Some(receiver) = &self.image_loader else {
            return;
        };
        if let Ok(result) = receiver.try_recv() {
            self.image_loader = None;
            self.loading_message = None;

            match result {
                Ok(image) => {
                    let texture = ctx.load_texture("reference_image", image.to_color_image(), egui::TextureOptions::LINEAR);
                    self.marker_view.set_image(texture, [image.width, image.height]);
                }
                Err(e) => {
                    log::error!("{}", e);
                    self.status = Some(e);
                }
            }
        }
    }

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Export Diagram...").clicked() {
                        self.export_diagram();
                        ui.close_menu();
                    }
                    if ui.button("Import Diagram...").clicked() {
                        self.import_diagram();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Export Markers...").clicked() {
                        self.export_markers();
                        ui.close_menu();
                    }
                    if ui.button("Import Markers...").clicked() {
                        self.import_markers();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Open Reference Image...").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Images", &["jpg", "jpeg", "png", "bmp", "tiff", "tif"])
                            .pick_file()
                        {
                            self.load_reference_image(path);
                        }
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.menu_button("Edit", |ui| {
                    let has_selection = self.shapes.selected_id().is_some();
                    if ui.add_enabled(has_selection, egui::Button::new("Delete Selected (Del)")).clicked() {
                        self.delete_selected();
                        ui.close_menu();
                    }
                    if ui.add_enabled(has_selection, egui::Button::new("Bring to Front")).clicked() {
                        if let Some(id) = self.shapes.selected_id().map(str::to_string) {
                            self.shapes.bring_to_front(&id);
                        }
                        ui.close_menu();
                    }
                    if ui.add_enabled(has_selection, egui::Button::new("Deselect (Esc)")).clicked() {
                        self.shapes.select(None);
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Clear Canvas...").clicked() {
                        self.confirm_clear = true;
                        ui.close_menu();
                    }
                });

                ui.menu_button("View", |ui| {
                    if ui.radio_value(&mut self.view, View::Diagram, "Diagram").clicked() {
                        ui.close_menu();
                    }
                    if ui.radio_value(&mut self.view, View::Markers, "Image Markers").clicked() {
                        ui.close_menu();
                    }
                });

                ui.menu_button("Capture", |ui| {
                    for (kind, label) in [
                        (CaptureKind::Image, "Capture Image..."),
                        (CaptureKind::Video, "Record Video..."),
                        (CaptureKind::Audio, "Record Audio..."),
                    ] {
                        if ui.button(label).clicked() {
                            self.open_capture(kind);
                            ui.close_menu();
                        }
                    }
                });

                ui.menu_button("Help", |ui| {
                    if ui.button("About").clicked() {
                        self.show_about = true;
                        ui.close_menu();
                    }
                });
            });
        });
    }
}

impl eframe::App for SketchboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.check_image_loader(ctx);

        // Request repaint if still loading (to update spinner)
        if self.loading_message.is_some() {
            ctx.request_repaint();
        }

        self.menu_bar(ctx);

        // Toolbar
        let has_selection = self.shapes.selected_id().is_some();
        let toolbar_action = egui::TopBottomPanel::top("toolbar")
            .show(ctx, |ui| toolbar::show(ui, &mut self.view, &mut self.armed, has_selection))
            .inner;
        match toolbar_action {
            ToolbarAction::DeleteSelected => self.delete_selected(),
            ToolbarAction::ExportDiagram => self.export_diagram(),
            ToolbarAction::ImportDiagram => self.import_diagram(),
            ToolbarAction::ClearCanvas => self.confirm_clear = true,
            ToolbarAction::Capture(kind) => self.open_capture(kind),
            ToolbarAction::None => {}
        }

        // Status bar
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                match self.view {
                    View::Diagram => ui.label(format!("Shapes: {}", self.shapes.shapes().len())),
                    View::Markers => ui.label(format!("Stones: {}", self.markers.markers().len())),
                };
                if let Some(message) = &self.loading_message {
                    ui.separator();
                    ui.spinner();
                    ui.label(message.as_str());
                }
                if let Some(status) = &self.status {
                    ui.separator();
                    ui.label(status.as_str());
                }
            });
        });

        match self.view {
            View::Diagram => {
                // Properties panel (right side)
                egui::SidePanel::right("properties")
                    .default_width(250.0)
                    .show(ctx, |ui| self.properties.show(ui, &mut self.shapes));

                let canvas_action = egui::CentralPanel::default()
                    .show(ctx, |ui| self.canvas.show(ui, &mut self.shapes, self.armed.is_some()))
                    .inner;
                if let CanvasAction::Place(pos) = canvas_action {
                    if let Some(tool) = self.armed {
                        self.place_shape(tool, pos);
                    }
                }
            }
            View::Markers => {
                let marker_action = egui::CentralPanel::default()
                    .show(ctx, |ui| self.marker_view.show(ui, &mut self.markers))
                    .inner;
                match marker_action {
                    MarkerAction::Export => self.export_markers(),
                    MarkerAction::Import => self.import_markers(),
                    MarkerAction::None => {}
                }
            }
        }

        if self.confirm_clear {
            match confirm_clear::show(ctx) {
                Confirmation::Confirmed => {
                    self.shapes.clear();
                    self.armed = None;
                    self.confirm_clear = false;
                    self.status = Some("Canvas cleared".to_string());
                }
                Confirmation::Cancelled => self.confirm_clear = false,
                Confirmation::Pending => {}
            }
        }

        if let Some(modal) = &mut self.capture {
            match modal.show(ctx) {
                ModalOutcome::Open => {}
                ModalOutcome::Saved(result) => {
                    self.capture = None;
                    self.save_capture(result);
                }
                ModalOutcome::Cancelled => self.capture = None,
            }
        }

        if self.show_about {
            egui::Window::new("About Sketchboard")
                .open(&mut self.show_about)
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label(format!("Sketchboard {}", env!("CARGO_PKG_VERSION")));
                    ui.label("Diagram editor with image markers and media capture.");
                });
        }

        if self.capture.is_none() && !self.confirm_clear {
            self.handle_keyboard(ctx);
        }
        self.drain_store_events();
    }
}

/// Open file-backed storage, falling back to memory so the app still runs.
fn open_storage(dir: &Path) -> AppStorage {
    match FileStorage::new(dir) {
        Ok(storage) => Box::new(storage),
        Err(e) => {
            log::error!("{:#}; changes will not be saved", e);
            Box::new(MemoryStorage::new())
        }
    }
}
