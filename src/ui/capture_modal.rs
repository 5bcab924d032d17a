// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Media capture window.
//!
//! Walks the user through one capture: device check, live view,
//! capture or recording, then a preview to retake, save or cancel. When
//! devices are unavailable the user can pick an existing file instead.
//! Closing the window on any path stops every stream and revokes the
//! preview URL.

use crate::capture::backend::{MediaBackend, UnavailableBackend};
#[cfg(feature = "devices")]
use crate::capture::device::DeviceBackend;
use crate::capture::service::CaptureService;
use crate::capture::{CaptureKind, CaptureResult, PermissionStatus, RecordingState};
use std::time::{Duration, Instant};

/// Width of the live view and image preview.
const PREVIEW_WIDTH: f32 = 480.0;

/// Format whole seconds as `MM:SS`.
pub fn format_time(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Elapsed recording time, excluding paused spans.
#[derive(Debug, Default)]
pub struct RecordingTimer {
    accumulated: Duration,
    running_since: Option<Instant>,
}

impl RecordingTimer {
    pub fn start(&mut self, now: Instant) {
        self.accumulated = Duration::ZERO;
        self.running_since = Some(now);
    }

    pub fn pause(&mut self, now: Instant) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += now.saturating_duration_since(since);
        }
    }

    pub fn resume(&mut self, now: Instant) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.accumulated
            + self
                .running_since
                .map_or(Duration::ZERO, |since| now.saturating_duration_since(since))
    }
}

enum Phase {
    /// Device capture cannot be used; the message says why.
    Unavailable(String),
    Live,
    Preview,
}

/// What the window wants the host to do after this frame.
pub enum ModalOutcome {
    Open,
    Saved(CaptureResult),
    Cancelled,
}

/// Capture window over the backend chosen at startup.
pub enum CaptureWindow {
    #[cfg(feature = "devices")]
    Device(CaptureModal<DeviceBackend>),
    Fallback(CaptureModal<UnavailableBackend>),
}

impl CaptureWindow {
    #[cfg(feature = "devices")]
    pub fn open(kind: CaptureKind, use_devices: bool) -> Self {
        if use_devices {
            Self::Device(CaptureModal::open(kind, DeviceBackend::new()))
        } else {
            Self::Fallback(CaptureModal::open(kind, UnavailableBackend))
        }
    }

    #[cfg(not(feature = "devices"))]
    pub fn open(kind: CaptureKind, _use_devices: bool) -> Self {
        Self::Fallback(CaptureModal::open(kind, UnavailableBackend))
    }

    pub fn show(&mut self, ctx: &egui::Context) -> ModalOutcome {
        match self {
            #[cfg(feature = "devices")]
            Self::Device(modal) => modal.show(ctx),
            Self::Fallback(modal) => modal.show(ctx),
        }
    }
}

pub struct CaptureModal<B: MediaBackend> {
    kind: CaptureKind,
    service: CaptureService<B>,
    permissions: Option<PermissionStatus>,
    phase: Phase,
    timer: RecordingTimer,
    result: Option<CaptureResult>,
    error: Option<String>,
    live_texture: Option<egui::TextureHandle>,
    preview_texture: Option<egui::TextureHandle>,
}

impl<B: MediaBackend> CaptureModal<B> {
    /// Open the window for `kind` and start the device check.
    pub fn open(kind: CaptureKind, backend: B) -> Self {
        let mut modal = Self {
            kind,
            service: CaptureService::new(backend),
            permissions: None,
            phase: Phase::Live,
            timer: RecordingTimer::default(),
            result: None,
            error: None,
            live_texture: None,
            preview_texture: None,
        };
        modal.initialize();
        modal
    }

    fn title(&self) -> &'static str {
        match self.kind {
            CaptureKind::Image => "Capture Image",
            CaptureKind::Video => "Record Video",
            CaptureKind::Audio => "Record Audio",
        }
    }

    fn initialize(&mut self) {
        self.release_result();
        self.timer.reset();
        self.error = None;

        if !self.service.supports_media_devices() {
            self.phase = Phase::Unavailable(
                "Camera and microphone access is not available on this device. You can choose an existing file instead."
                    .to_string(),
            );
            return;
        }
        if self.kind.is_recording() && !self.service.supports_recorder() {
            self.phase = Phase::Unavailable(format!(
                "{} recording is not supported on this device. You can choose an existing file instead.",
                capitalize(self.kind.as_str())
            ));
            return;
        }

        let status = self
            .service
            .check_permissions(self.kind.needs_camera(), self.kind.needs_microphone());
        if !status.granted {
            self.phase = Phase::Unavailable(status.message.clone());
            self.permissions = Some(status);
            return;
        }
        self.permissions = Some(status);

        let started = match self.kind {
            CaptureKind::Image => self.service.start_camera_stream(false),
            CaptureKind::Video => self.service.start_camera_stream(true),
            CaptureKind::Audio => self.service.start_audio_stream(),
        };
        self.phase = match started {
            Ok(()) => Phase::Live,
            Err(e) => {
                log::warn!("Failed to start {} capture: {}", self.kind.as_str(), e);
                Phase::Unavailable(format!("Failed to access camera/microphone: {e}"))
            }
        };
    }

    /// Stop every stream and drop any result. Safe to call repeatedly.
    pub fn cleanup(&mut self) {
        self.service.stop_all_streams();
        self.timer.reset();
        self.release_result();
        self.live_texture = None;
    }

    fn release_result(&mut self) {
        if let Some(result) = self.result.take() {
            self.service.revoke(&result.url);
        }
        self.preview_texture = None;
    }

    fn set_result(&mut self, ctx: &egui::Context, result: CaptureResult) {
        self.service.stop_all_streams();
        self.timer.reset();
        self.preview_texture = None;
        if result.kind == CaptureKind::Image {
            let decoded = self
                .service
                .resolve(&result.url)
                .map(|bytes| crate::io::media::decode_image(&bytes));
            match decoded {
                Some(Ok(image)) => {
                    self.preview_texture =
                        Some(ctx.load_texture("capture_preview", image.to_color_image(), egui::TextureOptions::LINEAR));
                }
                Some(Err(e)) => log::warn!("Cannot preview {}: {:#}", result.suggested_name, e),
                None => log::warn!("Preview of {} was already released", result.suggested_name),
            }
        }
        log::info!("Captured {} ({} bytes)", result.suggested_name, result.payload.len());
        self.result = Some(result);
        self.phase = Phase::Preview;
    }

    fn report(&mut self, error: impl std::fmt::Display) {
        log::warn!("Capture failed: {}", error);
        self.error = Some(error.to_string());
    }

    /// Display the window. On `Saved` or `Cancelled` the window has
    /// already cleaned up and should be dropped.
    pub fn show(&mut self, ctx: &egui::Context) -> ModalOutcome {
        let mut outcome = ModalOutcome::Open;
        let mut open = true;

        egui::Window::new(self.title())
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.set_min_width(PREVIEW_WIDTH);
                outcome = match self.phase {
                    Phase::Unavailable(_) => self.show_unavailable(ui),
                    Phase::Live => self.show_live(ui),
                    Phase::Preview => self.show_preview(ui),
                };
                if let Some(error) = &self.error {
                    ui.colored_label(egui::Color32::from_rgb(0xDC, 0x35, 0x45), error.as_str());
                }
            });

        if !open {
            outcome = ModalOutcome::Cancelled;
        }
        match outcome {
            ModalOutcome::Open => {}
            ModalOutcome::Saved(_) | ModalOutcome::Cancelled => self.cleanup(),
        }
        outcome
    }

    fn show_unavailable(&mut self, ui: &mut egui::Ui) -> ModalOutcome {
        if let Phase::Unavailable(message) = &self.phase {
            ui.label(message.as_str());
        }
        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui.button("📁 Choose file…").clicked() {
                self.choose_file(ui.ctx());
            }
            if ui.button("Try again").clicked() {
                self.initialize();
            }
            if ui.button("Cancel").clicked() {
                return ModalOutcome::Cancelled;
            }
            ModalOutcome::Open
        })
        .inner
    }

    fn show_live(&mut self, ui: &mut egui::Ui) -> ModalOutcome {
        let ctx = ui.ctx().clone();
        self.service.poll();

        if let Some(status) = &self.permissions {
            ui.horizontal(|ui| {
                if self.kind.needs_camera() {
                    ui.label(device_label("Camera", status.camera));
                }
                if self.kind.needs_microphone() {
                    ui.label(device_label("Microphone", status.microphone));
                }
            });
        }

        if self.kind.needs_camera() {
            if let Some(frame) = self.service.preview_frame() {
                let size = [frame.width() as usize, frame.height() as usize];
                let image = egui::ColorImage::from_rgba_unmultiplied(size, frame.as_raw());
                match &mut self.live_texture {
                    Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
                    None => {
                        self.live_texture = Some(ctx.load_texture("capture_live", image, egui::TextureOptions::LINEAR))
                    }
                }
            }
            match &self.live_texture {
                Some(texture) => {
                    ui.add(egui::Image::new(texture).max_width(PREVIEW_WIDTH));
                }
                None => {
                    ui.spinner();
                }
            }
            ctx.request_repaint();
        } else {
            ui.vertical_centered(|ui| {
                ui.label(egui::RichText::new("🎤").size(48.0));
                ui.label("Microphone ready");
            });
        }

        let state = self.service.recording_state();
        if self.kind.is_recording() && state != RecordingState::Inactive {
            let elapsed = self.timer.elapsed(Instant::now()).as_secs();
            let marker = if state == RecordingState::Paused { "⏸" } else { "⏺" };
            ui.label(
                egui::RichText::new(format!("{marker} {}", format_time(elapsed)))
                    .monospace()
                    .color(egui::Color32::from_rgb(0xDC, 0x35, 0x45)),
            );
            ctx.request_repaint_after(Duration::from_millis(250));
        }

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            match (self.kind, state) {
                (CaptureKind::Image, _) => {
                    if ui.button("📷 Capture").clicked() {
                        match self.service.capture_still_image() {
                            Ok(result) => self.set_result(&ctx, result),
                            Err(e) => self.report(e),
                        }
                    }
                }
                (_, RecordingState::Inactive) => {
                    if ui.button("⏺ Start Recording").clicked() {
                        match self.service.start_recording(self.kind) {
                            Ok(()) => self.timer.start(Instant::now()),
                            Err(e) => self.report(e),
                        }
                    }
                }
                (_, RecordingState::Recording) => {
                    if self.service.supports_pause_resume() && ui.button("⏸ Pause").clicked() {
                        self.service.pause();
                        self.timer.pause(Instant::now());
                    }
                    if ui.button("⏹ Stop").clicked() {
                        self.stop_recording(&ctx);
                    }
                }
                (_, RecordingState::Paused) => {
                    if ui.button("▶ Resume").clicked() {
                        self.service.resume();
                        self.timer.resume(Instant::now());
                    }
                    if ui.button("⏹ Stop").clicked() {
                        self.stop_recording(&ctx);
                    }
                }
            }
            if ui.button("📁 Choose file…").clicked() {
                self.choose_file(&ctx);
            }
            if ui.button("Cancel").clicked() {
                return ModalOutcome::Cancelled;
            }
            ModalOutcome::Open
        })
        .inner
    }

    fn show_preview(&mut self, ui: &mut egui::Ui) -> ModalOutcome {
        if let Some(texture) = &self.preview_texture {
            ui.add(egui::Image::new(texture).max_width(PREVIEW_WIDTH));
        }
        if let Some(result) = &self.result {
            egui::Grid::new("capture_result").num_columns(2).show(ui, |ui| {
                ui.label("File:");
                ui.label(result.suggested_name.as_str());
                ui.end_row();
                ui.label("Type:");
                ui.label(result.mime_type.as_str());
                ui.end_row();
                ui.label("Size:");
                ui.label(format!("{:.1} KB", result.payload.len() as f64 / 1024.0));
                ui.end_row();
            });
        }

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui.button("↺ Retake").clicked() {
                self.initialize();
            }
            if ui.button("💾 Save").clicked() {
                if let Some(result) = self.result.clone() {
                    return ModalOutcome::Saved(result);
                }
            }
            if ui.button("Cancel").clicked() {
                return ModalOutcome::Cancelled;
            }
            ModalOutcome::Open
        })
        .inner
    }

    fn stop_recording(&mut self, ctx: &egui::Context) {
        self.timer.pause(Instant::now());
        match self.service.stop_recording(self.kind) {
            Ok(result) => self.set_result(ctx, result),
            Err(e) => self.report(e),
        }
    }

    fn choose_file(&mut self, ctx: &egui::Context) {
        let extensions: &[&str] = match self.kind {
            CaptureKind::Image => &["jpg", "jpeg", "png"],
            CaptureKind::Video => &["webm", "mp4", "mjpeg"],
            CaptureKind::Audio => &["webm", "ogg", "mp3", "wav"],
        };
        let Some(path) = rfd::FileDialog::new()
            .add_filter(capitalize(self.kind.as_str()), extensions)
            .pick_file()
        else {
            return;
        };
        match self.service.wrap_file(self.kind, &path) {
            Ok(result) => {
                self.error = None;
                self.set_result(ctx, result);
            }
            Err(e) => self.report(format!("{e:#}")),
        }
    }
}

fn device_label(name: &str, granted: bool) -> String {
    format!("{name} {}", if granted { "✔" } else { "✖" })
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(65), "01:05");
        assert_eq!(format_time(3599), "59:59");
    }

    #[test]
    fn test_timer_excludes_paused_time() {
        let t0 = Instant::now();
        let mut timer = RecordingTimer::default();
        timer.start(t0);
        timer.pause(t0 + Duration::from_secs(5));
        assert_eq!(timer.elapsed(t0 + Duration::from_secs(60)), Duration::from_secs(5));

        timer.resume(t0 + Duration::from_secs(60));
        assert_eq!(timer.elapsed(t0 + Duration::from_secs(63)), Duration::from_secs(8));

        timer.reset();
        assert_eq!(timer.elapsed(t0 + Duration::from_secs(100)), Duration::ZERO);
    }

    #[test]
    fn test_unavailable_backend_offers_file_fallback() {
        let modal = CaptureModal::open(CaptureKind::Video, UnavailableBackend);
        match &modal.phase {
            Phase::Unavailable(message) => assert!(message.contains("choose an existing file")),
            _ => panic!("expected the file fallback"),
        }
        assert!(modal.result.is_none());
    }

    #[test]
    fn test_window_without_devices_uses_fallback() {
        let window = CaptureWindow::open(CaptureKind::Image, false);
        match &window {
            CaptureWindow::Fallback(modal) => {
                assert!(matches!(modal.phase, Phase::Unavailable(_)));
                assert!(modal.permissions.is_none());
            }
            #[cfg(feature = "devices")]
            CaptureWindow::Device(_) => panic!("devices were not requested"),
        }
    }

    #[test]
    fn test_device_label() {
        assert_eq!(device_label("Camera", true), "Camera ✔");
        assert_eq!(device_label("Microphone", false), "Microphone ✖");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("video"), "Video");
        assert_eq!(capitalize(""), "");
    }
}
