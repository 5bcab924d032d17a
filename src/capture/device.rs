// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Local camera and microphone backend.
//!
//! The camera is read by a worker thread through nokhwa and the latest
//! frame is kept for preview, stills and recording. The microphone is an
//! input stream from cpal whose samples are buffered while recording.
//! Video is recorded as Motion JPEG (one JPEG per frame, concatenated);
//! audio as 16-bit PCM wrapped in WAV with hound.

use super::backend::{AudioProcessing, FrameSource, MediaBackend, MediaRecorder, MediaStream, StreamConstraints};
use super::error::CaptureError;
use super::service::encode_jpeg;
use super::RecordingState;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use image::RgbaImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex, MutexGuard, Once, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const MJPEG_MIME: &str = "video/x-motion-jpeg";
pub const WAV_MIME: &str = "audio/wav";

/// How long to wait for the camera to deliver its stream.
const CAMERA_START_TIMEOUT: Duration = Duration::from_secs(5);
const FRAME_RETRY: Duration = Duration::from_millis(50);
/// Frame interval of recorded video.
const RECORD_TICK: Duration = Duration::from_millis(100);

/// Noise gate window and the RMS level (fraction of full scale) below
/// which a window is silenced.
const GATE_WINDOW: Duration = Duration::from_millis(20);
const GATE_THRESHOLD: f32 = 0.01;
/// Auto gain normalizes the peak to this level, boosting at most `MAX_GAIN`.
const TARGET_PEAK: f32 = 0.9;
const MAX_GAIN: f32 = 8.0;

static INIT: Once = Once::new();

fn initialize() {
    INIT.call_once(|| {
        nokhwa::nokhwa_initialize(|granted| {
            if !granted {
                log::warn!("Camera access was not granted");
            }
        });
    });
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Map a device library error message onto the capture taxonomy.
pub fn classify_device_error(message: &str) -> CaptureError {
    let lower = message.to_ascii_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
    if has(&["permission", "denied", "not authorized", "not permitted"]) {
        CaptureError::NotAllowed
    } else if has(&["busy", "in use"]) {
        CaptureError::Busy
    } else if has(&["not found", "no such", "not available", "no device", "no camera"]) {
        CaptureError::NotFound
    } else {
        CaptureError::Other(message.to_string())
    }
}

fn device_error(error: impl std::fmt::Display) -> CaptureError {
    let message = error.to_string();
    log::debug!("Device error: {}", message);
    classify_device_error(&message)
}

/// Whether a camera or a default microphone is present.
pub fn devices_available() -> bool {
    initialize();
    let cameras = match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras.len(),
        Err(e) => {
            log::debug!("Camera query failed: {}", e);
            0
        }
    };
    let microphone = cpal::default_host().default_input_device().is_some();
    log::info!("Found {} camera(s), microphone: {}", cameras, microphone);
    cameras > 0 || microphone
}

/// Latest decoded camera frame, shared with the camera thread.
type LatestFrame = Arc<Mutex<Option<RgbaImage>>>;

struct CameraFeed {
    latest: LatestFrame,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl CameraFeed {
    fn open() -> Result<Self, CaptureError> {
        initialize();
        let latest = LatestFrame::default();
        let running = Arc::new(AtomicBool::new(true));
        let (ready, started) = channel();
        let worker = thread::Builder::new()
            .name("camera".into())
            .spawn({
                let latest = Arc::clone(&latest);
                let running = Arc::clone(&running);
                move || read_camera(latest, running, ready)
            })
            .map_err(|e| CaptureError::Other(e.to_string()))?;

        let mut feed = Self {
            latest,
            running,
            worker: Some(worker),
        };
        match started.recv_timeout(CAMERA_START_TIMEOUT) {
            Ok(Ok(())) => Ok(feed),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                // A driver stuck in open is left to finish on its own.
                feed.running.store(false, Ordering::Release);
                feed.worker = None;
                Err(CaptureError::Other("The camera did not start in time".to_string()))
            }
        }
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("Camera thread panicked");
            }
        }
    }
}

impl Drop for CameraFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_camera(latest: LatestFrame, running: Arc<AtomicBool>, ready: Sender<Result<(), CaptureError>>) {
    let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
    let opened = Camera::new(CameraIndex::Index(0), format).and_then(|mut camera| {
        camera.open_stream()?;
        Ok(camera)
    });
    let mut camera = match opened {
        Ok(camera) => camera,
        Err(e) => {
            let _ = ready.send(Err(device_error(e)));
            return;
        }
    };
    log::info!("Camera {} streaming", camera.info().human_name());
    let _ = ready.send(Ok(()));

    while running.load(Ordering::Acquire) {
        match camera.frame().and_then(|buffer| buffer.decode_image::<RgbFormat>()) {
            Ok(decoded) => {
                let (width, height) = (decoded.width(), decoded.height());
                match image::RgbImage::from_raw(width, height, decoded.into_raw()) {
                    Some(rgb) => *lock(&latest) = Some(image::DynamicImage::ImageRgb8(rgb).to_rgba8()),
                    None => log::warn!("Camera frame of {}x{} was truncated", width, height),
                }
            }
            Err(e) => {
                log::warn!("Camera frame failed: {}", e);
                thread::sleep(FRAME_RETRY);
            }
        }
    }
    if let Err(e) = camera.stop_stream() {
        log::warn!("Failed to stop camera: {}", e);
    }
    log::debug!("Camera thread finished");
}

/// Sample layout of a microphone stream.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PcmFormat {
    sample_rate: u32,
    channels: u16,
    processing: AudioProcessing,
}

/// Samples delivered by the input callback. Only kept while recording.
#[derive(Debug, Default)]
struct AudioTap {
    capturing: bool,
    samples: Vec<i16>,
}

impl AudioTap {
    fn push(&mut self, samples: impl IntoIterator<Item = i16>) {
        if self.capturing {
            self.samples.extend(samples);
        }
    }
}

struct MicrophoneFeed {
    _stream: cpal::Stream,
    tap: Arc<Mutex<AudioTap>>,
    format: PcmFormat,
}

impl MicrophoneFeed {
    fn open(processing: AudioProcessing) -> Result<Self, CaptureError> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or(CaptureError::NotFound)?;
        let supported = device.default_input_config().map_err(device_error)?;
        let config = supported.config();
        let tap = Arc::new(Mutex::new(AudioTap::default()));

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => build_input::<f32>(&device, &config, &tap),
            cpal::SampleFormat::I16 => build_input::<i16>(&device, &config, &tap),
            cpal::SampleFormat::U16 => build_input::<u16>(&device, &config, &tap),
            other => Err(CaptureError::Other(format!("Unsupported sample format {other:?}"))),
        }?;
        stream.play().map_err(device_error)?;

        if processing.echo_cancellation {
            log::info!("Echo cancellation is not available for local microphones");
        }
        log::info!(
            "Microphone open at {} Hz, {} channel(s)",
            config.sample_rate.0,
            config.channels
        );
        Ok(Self {
            _stream: stream,
            tap,
            format: PcmFormat {
                sample_rate: config.sample_rate.0,
                channels: config.channels,
                processing,
            },
        })
    }
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    tap: &Arc<Mutex<AudioTap>>,
) -> Result<cpal::Stream, CaptureError>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let tap = Arc::clone(tap);
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                lock(&tap).push(data.iter().map(|&s| s.to_sample::<i16>()));
            },
            |e| log::warn!("Microphone stream error: {}", e),
            None,
        )
        .map_err(device_error)
}

/// Open camera and/or microphone.
pub struct DeviceStream {
    camera: Option<CameraFeed>,
    microphone: Option<MicrophoneFeed>,
}

impl FrameSource for DeviceStream {
    fn current_frame(&self) -> Option<RgbaImage> {
        self.camera.as_ref().and_then(|camera| lock(&camera.latest).clone())
    }
}

impl MediaStream for DeviceStream {
    fn stop_tracks(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            camera.stop();
        }
        if self.microphone.take().is_some() {
            log::debug!("Microphone closed");
        }
    }
}

/// What a recorder reads from.
#[derive(Clone)]
enum Track {
    Frames(LatestFrame),
    Samples(Arc<Mutex<AudioTap>>, PcmFormat),
}

#[derive(Debug, Default)]
struct RecorderFlags {
    running: AtomicBool,
    paused: AtomicBool,
}

pub struct DeviceRecorder {
    track: Track,
    state: RecordingState,
    flags: Arc<RecorderFlags>,
    worker: Option<JoinHandle<()>>,
}

impl DeviceRecorder {
    fn new(track: Track) -> Self {
        Self {
            track,
            state: RecordingState::Inactive,
            flags: Arc::default(),
            worker: None,
        }
    }

    fn set_capturing(&self, capturing: bool) {
        if let Track::Samples(tap, _) = &self.track {
            lock(tap).capturing = capturing;
        }
    }
}

impl MediaRecorder for DeviceRecorder {
    fn start(&mut self, timeslice: Duration, sink: Sender<Vec<u8>>) -> Result<(), CaptureError> {
        if self.state != RecordingState::Inactive {
            return Err(CaptureError::Other("Recording already started".to_string()));
        }
        self.flags.running.store(true, Ordering::Release);
        self.flags.paused.store(false, Ordering::Release);
        if let Track::Samples(tap, _) = &self.track {
            lock(tap).samples.clear();
        }
        self.set_capturing(true);

        let track = self.track.clone();
        let flags = Arc::clone(&self.flags);
        let worker = thread::Builder::new()
            .name("recorder".into())
            .spawn(move || record(track, timeslice, sink, flags))
            .map_err(|e| CaptureError::Other(e.to_string()))?;
        self.worker = Some(worker);
        self.state = RecordingState::Recording;
        Ok(())
    }

    fn pause(&mut self) {
        self.flags.paused.store(true, Ordering::Release);
        self.set_capturing(false);
        self.state = RecordingState::Paused;
    }

    fn resume(&mut self) {
        self.flags.paused.store(false, Ordering::Release);
        self.set_capturing(true);
        self.state = RecordingState::Recording;
    }

    fn stop(&mut self) {
        self.flags.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("Recorder thread panicked");
            }
        }
        self.set_capturing(false);
        self.state = RecordingState::Inactive;
    }

    fn state(&self) -> RecordingState {
        self.state
    }

    fn finish(&mut self, data: Vec<u8>) -> Result<Vec<u8>, CaptureError> {
        match &self.track {
            Track::Frames(_) => Ok(data),
            Track::Samples(_, format) => encode_wav(&data, *format),
        }
    }
}

impl Drop for DeviceRecorder {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}

/// Recorder thread. Flushes a chunk every `timeslice` and once more when
/// stopped. Video takes one more frame on the way out.
fn record(track: Track, timeslice: Duration, sink: Sender<Vec<u8>>, flags: Arc<RecorderFlags>) {
    let mut pending = Vec::new();
    let mut flushed_at = Instant::now();
    loop {
        let running = flags.running.load(Ordering::Acquire);
        match &track {
            Track::Frames(latest) => {
                if !flags.paused.load(Ordering::Acquire) {
                    let frame = lock(latest).clone();
                    if let Some(frame) = frame {
                        match encode_jpeg(frame) {
                            Ok(jpeg) => pending.extend(jpeg),
                            Err(e) => log::warn!("Dropped a video frame: {}", e),
                        }
                    }
                }
            }
            Track::Samples(tap, _) => {
                let samples = std::mem::take(&mut lock(tap).samples);
                pending.extend(samples.iter().flat_map(|s| s.to_le_bytes()));
            }
        }

        if !running || flushed_at.elapsed() >= timeslice {
            if !pending.is_empty() && sink.send(std::mem::take(&mut pending)).is_err() {
                log::debug!("Recording sink closed");
                return;
            }
            flushed_at = Instant::now();
        }
        if !running {
            return;
        }
        thread::sleep(RECORD_TICK.min(timeslice));
    }
}

/// Silence every window whose RMS level is below the gate.
fn noise_gate(samples: &mut [i16], window: usize) {
    if window == 0 {
        return;
    }
    let threshold = GATE_THRESHOLD * f32::from(i16::MAX);
    for chunk in samples.chunks_mut(window) {
        let energy: f32 = chunk.iter().map(|&s| f32::from(s) * f32::from(s)).sum();
        let rms = (energy / chunk.len() as f32).sqrt();
        if rms < threshold {
            chunk.fill(0);
        }
    }
}

/// Scale so the loudest sample reaches `TARGET_PEAK`.
fn auto_gain(samples: &mut [i16]) {
    let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
    if peak == 0 {
        return;
    }
    let gain = (TARGET_PEAK * f32::from(i16::MAX) / f32::from(peak)).min(MAX_GAIN);
    for sample in samples.iter_mut() {
        *sample = (f32::from(*sample) * gain)
            .round()
            .clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
    }
}

fn encode_wav(pcm: &[u8], format: PcmFormat) -> Result<Vec<u8>, CaptureError> {
    let mut samples: Vec<i16> = pcm
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    if format.processing.noise_suppression {
        let window = format.sample_rate as u128 * GATE_WINDOW.as_millis() / 1000 * u128::from(format.channels);
        noise_gate(&mut samples, window as usize);
    }
    if format.processing.auto_gain_control {
        auto_gain(&mut samples);
    }

    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let encode = |e: hound::Error| CaptureError::Encode(e.to_string());
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(encode)?;
    for sample in samples {
        writer.write_sample(sample).map_err(encode)?;
    }
    writer.finalize().map_err(encode)?;
    Ok(cursor.into_inner())
}

/// Backend over the local camera and default microphone.
#[derive(Debug, Default)]
pub struct DeviceBackend;

impl DeviceBackend {
    pub fn new() -> Self {
        Self
    }
}

impl MediaBackend for DeviceBackend {
    type Stream = DeviceStream;
    type Recorder = DeviceRecorder;

    fn supports_media_devices(&self) -> bool {
        true
    }

    fn supports_recorder(&self) -> bool {
        true
    }

    fn open_stream(&mut self, constraints: &StreamConstraints) -> Result<DeviceStream, CaptureError> {
        let camera = constraints.video.then(CameraFeed::open).transpose()?;
        // The camera is released by drop if the microphone fails.
        let microphone = constraints.audio.map(MicrophoneFeed::open).transpose()?;
        Ok(DeviceStream { camera, microphone })
    }

    fn is_type_supported(&self, mime_type: &str) -> bool {
        mime_type == MJPEG_MIME || mime_type == WAV_MIME
    }

    fn create_recorder(&mut self, stream: &DeviceStream, mime_type: &str) -> Result<DeviceRecorder, CaptureError> {
        let track = match mime_type {
            MJPEG_MIME => {
                let camera = stream.camera.as_ref().ok_or(CaptureError::NoActiveStream)?;
                if stream.microphone.is_some() {
                    log::info!("Motion JPEG recordings carry no audio track");
                }
                Track::Frames(Arc::clone(&camera.latest))
            }
            WAV_MIME => {
                let microphone = stream.microphone.as_ref().ok_or(CaptureError::NoActiveStream)?;
                Track::Samples(Arc::clone(&microphone.tap), microphone.format)
            }
            _ => return Err(CaptureError::NotSupported),
        };
        Ok(DeviceRecorder::new(track))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::service::CaptureService;
    use crate::capture::CaptureKind;

    fn format(processing: AudioProcessing) -> PcmFormat {
        PcmFormat {
            sample_rate: 8000,
            channels: 1,
            processing,
        }
    }

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_classify_device_error() {
        assert_eq!(classify_device_error("Permission denied (os error 13)"), CaptureError::NotAllowed);
        assert_eq!(classify_device_error("Device or resource busy"), CaptureError::Busy);
        assert_eq!(classify_device_error("No such file or directory"), CaptureError::NotFound);
        assert_eq!(
            classify_device_error("The requested device is no longer available."),
            CaptureError::NotFound
        );
        assert_eq!(
            classify_device_error("driver exploded"),
            CaptureError::Other("driver exploded".to_string())
        );
    }

    #[test]
    fn test_noise_gate_silences_quiet_windows() {
        let mut samples = vec![100i16; 4];
        samples.extend([20000, -20000, 20000, -20000]);
        noise_gate(&mut samples, 4);
        assert_eq!(samples, vec![0, 0, 0, 0, 20000, -20000, 20000, -20000]);
    }

    #[test]
    fn test_auto_gain_caps_boost() {
        let mut loud = vec![16000i16, -8000];
        auto_gain(&mut loud);
        assert_eq!(loud[0], (TARGET_PEAK * 32767.0).round() as i16);

        let mut quiet = vec![100i16, -50];
        auto_gain(&mut quiet);
        assert_eq!(quiet, vec![800, -400]);

        let mut silent = vec![0i16; 3];
        auto_gain(&mut silent);
        assert_eq!(silent, vec![0, 0, 0]);
    }

    #[test]
    fn test_wav_header_and_samples() {
        let bytes = encode_wav(&pcm(&[1, -2, 3]), format(AudioProcessing::NONE)).unwrap();
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!((spec.channels, spec.sample_rate, spec.bits_per_sample), (1, 8000, 16));
        let samples: Vec<i16> = reader.into_samples().map(Result::unwrap).collect();
        assert_eq!(samples, vec![1, -2, 3]);
    }

    #[test]
    fn test_voice_processing_applies_to_wav() {
        // 160 samples per 20 ms window at 8 kHz mono.
        let mut input = vec![10i16; 160];
        input.extend(std::iter::repeat(1000i16).take(160));
        let bytes = encode_wav(&pcm(&input), format(AudioProcessing::VOICE)).unwrap();
        let samples: Vec<i16> = hound::WavReader::new(Cursor::new(bytes))
            .unwrap()
            .into_samples()
            .map(Result::unwrap)
            .collect();
        assert!(samples[..160].iter().all(|&s| s == 0));
        assert!(samples[160..].iter().all(|&s| s == 8000));
    }

    #[test]
    fn test_device_formats_selected() {
        let service = CaptureService::new(DeviceBackend::new());
        assert_eq!(service.select_mime_type(CaptureKind::Video), MJPEG_MIME);
        assert_eq!(service.select_mime_type(CaptureKind::Audio), WAV_MIME);
    }

    #[test]
    fn test_recorder_needs_matching_track() {
        let mut backend = DeviceBackend::new();
        let stream = DeviceStream {
            camera: None,
            microphone: None,
        };
        assert!(matches!(
            backend.create_recorder(&stream, MJPEG_MIME),
            Err(CaptureError::NoActiveStream)
        ));
        assert!(matches!(
            backend.create_recorder(&stream, WAV_MIME),
            Err(CaptureError::NoActiveStream)
        ));
        assert!(matches!(
            backend.create_recorder(&stream, "video/webm"),
            Err(CaptureError::NotSupported)
        ));
        assert!(stream.current_frame().is_none());
    }

    #[test]
    fn test_frame_recorder_flushes_on_stop() {
        let latest = LatestFrame::default();
        *lock(&latest) = Some(RgbaImage::from_pixel(8, 8, image::Rgba([10, 20, 30, 255])));
        let mut recorder = DeviceRecorder::new(Track::Frames(Arc::clone(&latest)));
        let (sink, chunks) = channel();

        recorder.start(Duration::from_secs(60), sink).unwrap();
        assert_eq!(recorder.state(), RecordingState::Recording);
        thread::sleep(Duration::from_millis(50));
        recorder.stop();
        assert_eq!(recorder.state(), RecordingState::Inactive);

        let data: Vec<u8> = chunks.try_iter().flatten().collect();
        assert_eq!(&data[..2], &[0xFF, 0xD8]);
        assert_eq!(recorder.finish(data.clone()).unwrap(), data);
    }

    #[test]
    fn test_sample_recorder_drops_paused_audio() {
        let tap = Arc::new(Mutex::new(AudioTap::default()));
        let mut recorder = DeviceRecorder::new(Track::Samples(Arc::clone(&tap), format(AudioProcessing::NONE)));
        let (sink, chunks) = channel();

        recorder.start(Duration::from_secs(60), sink).unwrap();
        assert!(lock(&tap).capturing);
        recorder.pause();
        lock(&tap).push([5, 5, 5]);
        recorder.resume();
        lock(&tap).push([7, -7]);
        recorder.stop();
        assert!(!lock(&tap).capturing);

        let data: Vec<u8> = chunks.try_iter().flatten().collect();
        assert_eq!(data, pcm(&[7, -7]));
        let wav = recorder.finish(data).unwrap();
        assert_eq!(&wav[..4], b"RIFF");
    }
}
