// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Camera and microphone capture.
//!
//! The [`service::CaptureService`] drives a platform [`backend::MediaBackend`]
//! to check permissions, open streams, grab still frames and record
//! video/audio into a [`CaptureResult`]. With the `devices` feature the
//! local camera and microphone are driven by [`device::DeviceBackend`].

pub mod backend;
#[cfg(feature = "devices")]
pub mod device;
pub mod error;
pub mod service;
pub mod urls;

use std::sync::Arc;

/// What a capture produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Image,
    Video,
    Audio,
}

impl CaptureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureKind::Image => "image",
            CaptureKind::Video => "video",
            CaptureKind::Audio => "audio",
        }
    }

    pub fn needs_camera(&self) -> bool {
        matches!(self, CaptureKind::Image | CaptureKind::Video)
    }

    pub fn needs_microphone(&self) -> bool {
        matches!(self, CaptureKind::Video | CaptureKind::Audio)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, CaptureKind::Video | CaptureKind::Audio)
    }

    /// Container types to try, most preferred first.
    pub fn mime_preferences(&self) -> &'static [&'static str] {
        match self {
            CaptureKind::Image => &["image/jpeg"],
            CaptureKind::Video => &[
                "video/webm;codecs=vp9",
                "video/webm;codecs=vp8",
                "video/webm",
                "video/mp4",
                "video/x-motion-jpeg",
            ],
            CaptureKind::Audio => &[
                "audio/webm;codecs=opus",
                "audio/webm",
                "audio/ogg;codecs=opus",
                "audio/mp4",
                "audio/wav",
            ],
        }
    }

    /// Container used when the backend reports none of the preferences.
    pub fn fallback_mime(&self) -> &'static str {
        match self {
            CaptureKind::Image => "image/jpeg",
            CaptureKind::Video => "video/webm",
            CaptureKind::Audio => "audio/webm",
        }
    }
}

/// File extension for a container type.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let base = mime_type.split(';').next().unwrap_or_default().trim();
    match base {
        "video/mp4" | "audio/mp4" => "mp4",
        "audio/ogg" => "ogg",
        "audio/wav" => "wav",
        "video/x-motion-jpeg" => "mjpeg",
        "image/jpeg" => "jpg",
        _ => "webm",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Inactive,
    Recording,
    Paused,
}

/// Outcome of a permission check. `camera` and `microphone` are true only
/// for devices that were requested and opened.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionStatus {
    pub camera: bool,
    pub microphone: bool,
    pub granted: bool,
    pub message: String,
}

/// A finished capture handed to the host.
#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub kind: CaptureKind,
    pub mime_type: String,
    pub payload: Arc<[u8]>,
    /// Transient reference registered in [`urls::PayloadUrls`]; revoke it
    /// when the result is no longer displayed.
    pub url: String,
    pub suggested_name: String,
}
