// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Capture session state.
//!
//! Holds at most one open stream and one recorder. Teardown goes through
//! [`CaptureService::stop_all_streams`] on every path, and is safe to call
//! any number of times.

use super::backend::{AudioProcessing, FrameSource, MediaBackend, MediaRecorder, MediaStream, StreamConstraints};
use super::error::{permission_message, CaptureError};
use super::urls::PayloadUrls;
use super::{extension_for_mime, CaptureKind, CaptureResult, PermissionStatus, RecordingState};
use anyhow::Context;
use image::codecs::jpeg::JpegEncoder;
use std::path::Path;
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::time::Duration;

/// Interval at which recorders deliver chunks.
pub const CHUNK_INTERVAL: Duration = Duration::from_secs(1);

pub const JPEG_QUALITY: u8 = 90;

struct ActiveRecording<R> {
    recorder: R,
    kind: CaptureKind,
    mime_type: String,
    chunks: Receiver<Vec<u8>>,
    recorded: Vec<Vec<u8>>,
}

impl<R: MediaRecorder> ActiveRecording<R> {
    /// Move delivered chunks into the recorded list, skipping empty ones.
    fn drain(&mut self) {
        self.recorded
            .extend(self.chunks.try_iter().filter(|chunk| !chunk.is_empty()));
    }
}

pub struct CaptureService<B: MediaBackend> {
    backend: B,
    stream: Option<B::Stream>,
    recording: Option<ActiveRecording<B::Recorder>>,
    urls: PayloadUrls,
}

impl<B: MediaBackend> CaptureService<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            stream: None,
            recording: None,
            urls: PayloadUrls::default(),
        }
    }

    pub fn supports_media_devices(&self) -> bool {
        self.backend.supports_media_devices()
    }

    pub fn supports_recorder(&self) -> bool {
        self.backend.supports_recorder()
    }

    pub fn supports_pause_resume(&self) -> bool {
        self.backend.supports_pause_resume()
    }

    #[cfg(test)]
    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Check device access by opening a throwaway stream and stopping it
    /// straight away. May trigger an OS permission prompt.
    pub fn check_permissions(&mut self, needs_camera: bool, needs_microphone: bool) -> PermissionStatus {
        let status = |granted: bool, message: String| PermissionStatus {
            camera: needs_camera && granted,
            microphone: needs_microphone && granted,
            granted,
            message,
        };

        if !self.backend.supports_media_devices() {
            return status(false, permission_message(&CaptureError::NotSupported));
        }

        let constraints = StreamConstraints {
            video: needs_camera,
            audio: needs_microphone.then_some(AudioProcessing::NONE),
        };
        match self.backend.open_stream(&constraints) {
            Ok(mut trial) => {
                trial.stop_tracks();
                status(true, "Permissions granted successfully".to_string())
            }
            Err(e) => {
                log::warn!("Permission check failed: {}", e);
                status(false, permission_message(&e))
            }
        }
    }

    /// Open the camera, optionally with the microphone.
    pub fn start_camera_stream(&mut self, include_audio: bool) -> Result<(), CaptureError> {
        self.open(StreamConstraints {
            video: true,
            audio: include_audio.then_some(AudioProcessing::NONE),
        })
    }

    /// Open the microphone with voice processing enabled.
    pub fn start_audio_stream(&mut self) -> Result<(), CaptureError> {
        self.open(StreamConstraints {
            video: false,
            audio: Some(AudioProcessing::VOICE),
        })
    }

    fn open(&mut self, constraints: StreamConstraints) -> Result<(), CaptureError> {
        if !self.backend.supports_media_devices() {
            return Err(CaptureError::NotSupported);
        }
        self.stop_all_streams();
        let stream = self.backend.open_stream(&constraints)?;
        log::info!(
            "Opened stream (video: {}, audio: {})",
            constraints.video,
            constraints.audio.is_some()
        );
        self.stream = Some(stream);
        Ok(())
    }

    /// Current frame of the open stream, for live preview.
    pub fn preview_frame(&self) -> Option<image::RgbaImage> {
        self.stream.as_ref().and_then(|s| s.current_frame())
    }

    /// Grab the current frame of the open stream and encode it as JPEG.
    pub fn capture_still_image(&mut self) -> Result<CaptureResult, CaptureError> {
        let stream = self.stream.as_ref().ok_or(CaptureError::NoActiveStream)?;
        let payload = encode_still(stream)?;
        Ok(self.finish(
            CaptureKind::Image,
            CaptureKind::Image.fallback_mime().to_string(),
            payload,
            format!("captured-image-{}.jpg", timestamp()),
        ))
    }

    /// First container type the backend supports, or the kind's fallback.
    pub fn select_mime_type(&self, kind: CaptureKind) -> &'static str {
        kind.mime_preferences()
            .iter()
            .copied()
            .find(|mime| self.backend.is_type_supported(mime))
            .unwrap_or_else(|| kind.fallback_mime())
    }

    /// Start recording the open stream.
    pub fn start_recording(&mut self, kind: CaptureKind) -> Result<(), CaptureError> {
        if !kind.is_recording() {
            return Err(CaptureError::Other(format!("Cannot record {}", kind.as_str())));
        }
        if !self.backend.supports_recorder() {
            return Err(CaptureError::NotSupported);
        }
        let stream = self.stream.as_ref().ok_or(CaptureError::NoActiveStream)?;

        let mime_type = self.select_mime_type(kind);
        let mut recorder = self.backend.create_recorder(stream, mime_type)?;
        let (sender, chunks) = channel();
        recorder.start(CHUNK_INTERVAL, sender)?;
        log::info!("Recording {} as {}", kind.as_str(), mime_type);

        self.recording = Some(ActiveRecording {
            recorder,
            kind,
            mime_type: mime_type.to_string(),
            chunks,
            recorded: Vec::new(),
        });
        Ok(())
    }

    /// Collect chunks delivered since the last call.
    pub fn poll(&mut self) {
        if let Some(recording) = &mut self.recording {
            recording.drain();
        }
    }

    pub fn pause(&mut self) {
        if let Some(recording) = &mut self.recording {
            if recording.recorder.state() == RecordingState::Recording {
                recording.recorder.pause();
            }
        }
    }

    pub fn resume(&mut self) {
        if let Some(recording) = &mut self.recording {
            if recording.recorder.state() == RecordingState::Paused {
                recording.recorder.resume();
            }
        }
    }

    pub fn recording_state(&self) -> RecordingState {
        self.recording
            .as_ref()
            .map(|r| r.recorder.state())
            .unwrap_or_default()
    }

    /// Stop recording and join every chunk into one payload.
    pub fn stop_recording(&mut self, kind: CaptureKind) -> Result<CaptureResult, CaptureError> {
        let mut recording = self.recording.take().ok_or(CaptureError::NoActiveRecording)?;
        if recording.kind != kind {
            log::warn!(
                "Stopping {} recording as {}",
                recording.kind.as_str(),
                kind.as_str()
            );
        }
        recording.recorder.stop();
        recording.drain();

        let payload = recording.recorder.finish(recording.recorded.concat())?;
        log::info!("Recorded {} bytes of {}", payload.len(), kind.as_str());
        let name = format!(
            "captured-{}-{}.{}",
            kind.as_str(),
            timestamp(),
            extension_for_mime(&recording.mime_type)
        );
        Ok(self.finish(kind, recording.mime_type, payload, name))
    }

    /// Stop every track and any active recorder.
    pub fn stop_all_streams(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
            log::debug!("Stopped capture stream");
        }
        if let Some(mut recording) = self.recording.take() {
            if recording.recorder.state() != RecordingState::Inactive {
                recording.recorder.stop();
            }
        }
    }

    /// Wrap a file picked by the user as a capture result.
    pub fn wrap_file(&mut self, kind: CaptureKind, path: &Path) -> anyhow::Result<CaptureResult> {
        let payload = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("captured-{}", kind.as_str()));
        let mime_type = mime_from_extension(path).unwrap_or(kind.fallback_mime());
        Ok(self.finish(kind, mime_type.to_string(), payload, name))
    }

    /// Payload behind a live URL.
    pub fn resolve(&self, url: &str) -> Option<Arc<[u8]>> {
        self.urls.resolve(url)
    }

    pub fn revoke(&mut self, url: &str) {
        self.urls.revoke(url);
    }

    #[cfg(test)]
    pub fn live_urls(&self) -> usize {
        self.urls.live_count()
    }

    fn finish(
        &mut self,
        kind: CaptureKind,
        mime_type: String,
        payload: Vec<u8>,
        suggested_name: String,
    ) -> CaptureResult {
        let payload: Arc<[u8]> = Arc::from(payload);
        let url = self.urls.create(Arc::clone(&payload));
        CaptureResult {
            kind,
            mime_type,
            payload,
            url,
            suggested_name,
        }
    }
}

impl<B: MediaBackend> Drop for CaptureService<B> {
    fn drop(&mut self) {
        self.stop_all_streams();
    }
}

/// Encode the source's current frame, at its native size, as JPEG.
pub fn encode_still<F: FrameSource + ?Sized>(source: &F) -> Result<Vec<u8>, CaptureError> {
    let frame = source
        .current_frame()
        .ok_or_else(|| CaptureError::Other("No video frame available".to_string()))?;
    encode_jpeg(frame)
}

/// Encode one frame as JPEG at [`JPEG_QUALITY`].
pub fn encode_jpeg(frame: image::RgbaImage) -> Result<Vec<u8>, CaptureError> {
    let rgb = image::DynamicImage::ImageRgba8(frame).to_rgb8();

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| CaptureError::Encode(e.to_string()))?;
    Ok(bytes)
}

fn timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string()
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webm" => "video/webm",
        "mp4" => "video/mp4",
        "ogg" => "audio/ogg",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mjpeg" => "video/x-motion-jpeg",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::sync::mpsc::Sender;

    /// Shared view of what the scripted backend did.
    #[derive(Default)]
    struct Calls {
        opened: Cell<usize>,
        stopped: Cell<usize>,
        recorder_stops: Cell<usize>,
        sink: RefCell<Option<Sender<Vec<u8>>>>,
    }

    struct ScriptedStream {
        calls: Rc<Calls>,
        frame: Option<RgbaImage>,
        stopped: bool,
    }

    impl FrameSource for ScriptedStream {
        fn current_frame(&self) -> Option<RgbaImage> {
            self.frame.clone()
        }
    }

    impl MediaStream for ScriptedStream {
        fn stop_tracks(&mut self) {
            if !self.stopped {
                self.stopped = true;
                self.calls.stopped.set(self.calls.stopped.get() + 1);
            }
        }
    }

    struct ScriptedRecorder {
        calls: Rc<Calls>,
        state: RecordingState,
    }

    impl MediaRecorder for ScriptedRecorder {
        fn start(&mut self, timeslice: Duration, sink: Sender<Vec<u8>>) -> Result<(), CaptureError> {
            assert_eq!(timeslice, CHUNK_INTERVAL);
            *self.calls.sink.borrow_mut() = Some(sink);
            self.state = RecordingState::Recording;
            Ok(())
        }

        fn pause(&mut self) {
            self.state = RecordingState::Paused;
        }

        fn resume(&mut self) {
            self.state = RecordingState::Recording;
        }

        fn stop(&mut self) {
            if let Some(sink) = self.calls.sink.borrow_mut().take() {
                let _ = sink.send(b"end".to_vec());
            }
            self.calls.recorder_stops.set(self.calls.recorder_stops.get() + 1);
            self.state = RecordingState::Inactive;
        }

        fn state(&self) -> RecordingState {
            self.state
        }
    }

    struct ScriptedBackend {
        calls: Rc<Calls>,
        open_error: Option<CaptureError>,
        supported: Vec<&'static str>,
    }

    impl ScriptedBackend {
        fn new() -> Self {
            Self {
                calls: Rc::new(Calls::default()),
                open_error: None,
                supported: vec!["video/webm;codecs=vp8", "video/webm", "audio/ogg;codecs=opus"],
            }
        }
    }

    impl MediaBackend for ScriptedBackend {
        type Stream = ScriptedStream;
        type Recorder = ScriptedRecorder;

        fn supports_media_devices(&self) -> bool {
            true
        }

        fn supports_recorder(&self) -> bool {
            true
        }

        fn open_stream(&mut self, constraints: &StreamConstraints) -> Result<ScriptedStream, CaptureError> {
            if let Some(e) = &self.open_error {
                return Err(e.clone());
            }
            self.calls.opened.set(self.calls.opened.get() + 1);
            Ok(ScriptedStream {
                calls: Rc::clone(&self.calls),
                frame: constraints
                    .video
                    .then(|| RgbaImage::from_pixel(64, 48, image::Rgba([200, 100, 50, 255]))),
                stopped: false,
            })
        }

        fn is_type_supported(&self, mime_type: &str) -> bool {
            self.supported.contains(&mime_type)
        }

        fn create_recorder(&mut self, _stream: &ScriptedStream, _mime_type: &str) -> Result<ScriptedRecorder, CaptureError> {
            Ok(ScriptedRecorder {
                calls: Rc::clone(&self.calls),
                state: RecordingState::Inactive,
            })
        }
    }

    fn send_chunk(calls: &Calls, chunk: &[u8]) {
        calls.sink.borrow().as_ref().unwrap().send(chunk.to_vec()).unwrap();
    }

    #[test]
    fn test_permission_check_releases_stream() {
        let backend = ScriptedBackend::new();
        let calls = Rc::clone(&backend.calls);
        let mut service = CaptureService::new(backend);

        let status = service.check_permissions(true, true);
        assert!(status.granted);
        assert!(status.camera && status.microphone);
        assert_eq!(calls.opened.get(), 1);
        assert_eq!(calls.stopped.get(), 1);
        assert!(!service.has_stream());

        let status = service.check_permissions(false, true);
        assert!(!status.camera && status.microphone);
    }

    #[test]
    fn test_permission_denied_message() {
        let mut backend = ScriptedBackend::new();
        backend.open_error = Some(CaptureError::NotFound);
        let mut service = CaptureService::new(backend);

        let status = service.check_permissions(true, false);
        assert!(!status.granted);
        assert!(!status.camera && !status.microphone);
        assert_eq!(status.message, "Permission denied. No camera or microphone found on this device.");
    }

    #[test]
    fn test_unavailable_backend_reports_not_supported() {
        let mut service = CaptureService::new(crate::capture::backend::UnavailableBackend);
        assert!(!service.check_permissions(true, false).granted);
        assert_eq!(service.start_camera_stream(false), Err(CaptureError::NotSupported));
        assert_eq!(service.start_recording(CaptureKind::Audio), Err(CaptureError::NotSupported));
    }

    #[test]
    fn test_still_image_is_jpeg_at_native_size() {
        let mut service = CaptureService::new(ScriptedBackend::new());
        assert_eq!(service.capture_still_image().unwrap_err(), CaptureError::NoActiveStream);

        service.start_camera_stream(false).unwrap();
        let result = service.capture_still_image().unwrap();
        assert_eq!(result.kind, CaptureKind::Image);
        assert_eq!(result.mime_type, "image/jpeg");
        assert!(result.suggested_name.starts_with("captured-image-"));
        assert!(result.suggested_name.ends_with(".jpg"));

        let decoded = image::load_from_memory(&result.payload).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
        assert_eq!(service.resolve(&result.url).as_deref(), Some(&result.payload[..]));
    }

    #[test]
    fn test_mime_preference_order() {
        let service = CaptureService::new(ScriptedBackend::new());
        assert_eq!(service.select_mime_type(CaptureKind::Video), "video/webm;codecs=vp8");
        assert_eq!(service.select_mime_type(CaptureKind::Audio), "audio/ogg;codecs=opus");

        let mut backend = ScriptedBackend::new();
        backend.supported.clear();
        let service = CaptureService::new(backend);
        assert_eq!(service.select_mime_type(CaptureKind::Video), "video/webm");
        assert_eq!(service.select_mime_type(CaptureKind::Audio), "audio/webm");
    }

    #[test]
    fn test_recording_concatenates_chunks() {
        let backend = ScriptedBackend::new();
        let calls = Rc::clone(&backend.calls);
        let mut service = CaptureService::new(backend);

        assert_eq!(service.start_recording(CaptureKind::Video), Err(CaptureError::NoActiveStream));
        service.start_camera_stream(true).unwrap();
        service.start_recording(CaptureKind::Video).unwrap();
        assert_eq!(service.recording_state(), RecordingState::Recording);

        send_chunk(&calls, b"one-");
        send_chunk(&calls, b"");
        service.poll();
        service.pause();
        assert_eq!(service.recording_state(), RecordingState::Paused);
        service.pause();
        assert_eq!(service.recording_state(), RecordingState::Paused);
        service.resume();
        send_chunk(&calls, b"two-");

        let result = service.stop_recording(CaptureKind::Video).unwrap();
        assert_eq!(&result.payload[..], b"one-two-end");
        assert_eq!(result.mime_type, "video/webm;codecs=vp8");
        assert!(result.suggested_name.starts_with("captured-video-"));
        assert!(result.suggested_name.ends_with(".webm"));
        assert_eq!(service.recording_state(), RecordingState::Inactive);

        assert_eq!(
            service.stop_recording(CaptureKind::Video).unwrap_err(),
            CaptureError::NoActiveRecording
        );
    }

    #[test]
    fn test_stop_all_streams_is_idempotent() {
        let backend = ScriptedBackend::new();
        let calls = Rc::clone(&backend.calls);
        let mut service = CaptureService::new(backend);

        service.start_audio_stream().unwrap();
        service.start_recording(CaptureKind::Audio).unwrap();
        service.stop_all_streams();
        service.stop_all_streams();

        assert_eq!(calls.stopped.get(), 1);
        assert_eq!(calls.recorder_stops.get(), 1);
        assert_eq!(service.recording_state(), RecordingState::Inactive);
        assert!(!service.has_stream());
    }

    #[test]
    fn test_revoke_releases_payload() {
        let mut service = CaptureService::new(ScriptedBackend::new());
        service.start_camera_stream(false).unwrap();
        let result = service.capture_still_image().unwrap();
        assert_eq!(service.live_urls(), 1);
        service.revoke(&result.url);
        assert_eq!(service.live_urls(), 0);
        assert!(service.resolve(&result.url).is_none());
    }

    #[test]
    fn test_wrap_file_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.MP4");
        std::fs::write(&path, b"data").unwrap();

        let mut service = CaptureService::new(ScriptedBackend::new());
        let result = service.wrap_file(CaptureKind::Video, &path).unwrap();
        assert_eq!(result.suggested_name, "clip.MP4");
        assert_eq!(result.mime_type, "video/mp4");
        assert_eq!(&result.payload[..], b"data");
    }
}
