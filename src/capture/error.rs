// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Capture error taxonomy.

use thiserror::Error;

/// Why a capture operation failed. None of these are fatal; each maps to a
/// message shown in the capture window.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("Please allow camera/microphone access in your system settings.")]
    NotAllowed,
    #[error("No camera or microphone found on this device.")]
    NotFound,
    #[error("Media capture is not supported on this device.")]
    NotSupported,
    #[error("The camera or microphone is already in use by another application.")]
    Busy,
    #[error("No active recording")]
    NoActiveRecording,
    #[error("No active camera or microphone stream")]
    NoActiveStream,
    #[error("Failed to encode capture: {0}")]
    Encode(String),
    #[error("{0}")]
    Other(String),
}

/// Extra guidance for granting device access on this platform.
pub fn permission_instructions() -> &'static str {
    match std::env::consts::OS {
        "macos" => "On macOS: open System Settings > Privacy & Security > Camera/Microphone and allow access for Sketchboard.",
        "windows" => "On Windows: open Settings > Privacy & security > Camera/Microphone and allow desktop apps to use them.",
        "linux" => "On Linux: make sure your user can open the video and audio devices (for example via the video and audio groups).",
        _ => "Please check your system settings to allow camera/microphone access.",
    }
}

/// Message shown when a permission check fails.
pub fn permission_message(error: &CaptureError) -> String {
    let mut message = String::from("Permission denied. ");
    message.push_str(&error.to_string());
    if *error == CaptureError::NotAllowed {
        message.push(' ');
        message.push_str(permission_instructions());
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_distinct() {
        let errors = [
            CaptureError::NotAllowed,
            CaptureError::NotFound,
            CaptureError::NotSupported,
            CaptureError::Busy,
        ];
        let messages: std::collections::HashSet<String> =
            errors.iter().map(permission_message).collect();
        assert_eq!(messages.len(), errors.len());
    }

    #[test]
    fn test_not_allowed_includes_instructions() {
        let message = permission_message(&CaptureError::NotAllowed);
        assert!(message.starts_with("Permission denied. "));
        assert!(message.ends_with(permission_instructions()));
    }
}
