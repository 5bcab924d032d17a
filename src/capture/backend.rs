// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Platform media backend abstraction.
//!
//! A backend hands out device streams and recorders. The capture service
//! only talks to these traits, so platforms without device access plug in
//! [`UnavailableBackend`] and users fall back to picking a file.

use super::error::CaptureError;
use super::RecordingState;
use image::RgbaImage;
use std::sync::mpsc::Sender;
use std::time::Duration;

/// Audio processing requested for microphone streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioProcessing {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl AudioProcessing {
    pub const NONE: Self = Self {
        echo_cancellation: false,
        noise_suppression: false,
        auto_gain_control: false,
    };

    pub const VOICE: Self = Self {
        echo_cancellation: true,
        noise_suppression: true,
        auto_gain_control: true,
    };
}

/// Which devices a stream should open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub video: bool,
    pub audio: Option<AudioProcessing>,
}

/// Something that can produce the current video frame at its native
/// resolution.
pub trait FrameSource {
    fn current_frame(&self) -> Option<RgbaImage>;
}

/// An open device stream.
pub trait MediaStream: FrameSource {
    /// Stop every track. Calling it again is harmless.
    fn stop_tracks(&mut self);
}

/// Encodes a stream into chunks of a container format.
pub trait MediaRecorder {
    /// Begin recording, delivering a chunk to `sink` every `timeslice`.
    fn start(&mut self, timeslice: Duration, sink: Sender<Vec<u8>>) -> Result<(), CaptureError>;
    fn pause(&mut self);
    fn resume(&mut self);
    /// Stop recording. Any buffered data is flushed to the sink before
    /// this returns.
    fn stop(&mut self);
    fn state(&self) -> RecordingState;

    /// Turn the joined chunks of a stopped recording into the final
    /// payload. Containers that need a header or post-processing do it here.
    fn finish(&mut self, data: Vec<u8>) -> Result<Vec<u8>, CaptureError> {
        Ok(data)
    }
}

pub trait MediaBackend {
    type Stream: MediaStream;
    type Recorder: MediaRecorder;

    /// Whether device streams can be requested at all.
    fn supports_media_devices(&self) -> bool;

    /// Whether streams can be recorded.
    fn supports_recorder(&self) -> bool;

    /// Whether recordings can be paused and resumed.
    fn supports_pause_resume(&self) -> bool {
        self.supports_recorder()
    }

    fn open_stream(&mut self, constraints: &StreamConstraints) -> Result<Self::Stream, CaptureError>;

    fn is_type_supported(&self, mime_type: &str) -> bool;

    fn create_recorder(
        &mut self,
        stream: &Self::Stream,
        mime_type: &str,
    ) -> Result<Self::Recorder, CaptureError>;
}

/// Backend for builds without device access.
#[derive(Debug, Default)]
pub struct UnavailableBackend;

/// Stream type of [`UnavailableBackend`]; never constructed.
#[derive(Debug)]
pub enum NoStream {}

/// Recorder type of [`UnavailableBackend`]; never constructed.
#[derive(Debug)]
pub enum NoRecorder {}

impl FrameSource for NoStream {
    fn current_frame(&self) -> Option<RgbaImage> {
        match *self {}
    }
}

impl MediaStream for NoStream {
    fn stop_tracks(&mut self) {
        match *self {}
    }
}

impl MediaRecorder for NoRecorder {
    fn start(&mut self, _timeslice: Duration, _sink: Sender<Vec<u8>>) -> Result<(), CaptureError> {
        match *self {}
    }

    fn pause(&mut self) {
        match *self {}
    }

    fn resume(&mut self) {
        match *self {}
    }

    fn stop(&mut self) {
        match *self {}
    }

    fn state(&self) -> RecordingState {
        match *self {}
    }
}

impl MediaBackend for UnavailableBackend {
    type Stream = NoStream;
    type Recorder = NoRecorder;

    fn supports_media_devices(&self) -> bool {
        false
    }

    fn supports_recorder(&self) -> bool {
        false
    }

    fn open_stream(&mut self, _constraints: &StreamConstraints) -> Result<NoStream, CaptureError> {
        Err(CaptureError::NotSupported)
    }

    fn is_type_supported(&self, _mime_type: &str) -> bool {
        false
    }

    fn create_recorder(&mut self, stream: &NoStream, _mime_type: &str) -> Result<NoRecorder, CaptureError> {
        match *stream {}
    }
}
