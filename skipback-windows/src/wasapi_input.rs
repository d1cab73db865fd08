//! WASAPI input capture provider.
//!
//! Opens a capture endpoint (microphone, line-in) in shared mode, asks the
//! audio engine to convert to 32-bit float at the configured rate and
//! channel count, and delivers fixed-size blocks via the `AudioBlockCallback`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use windows::core::PCWSTR;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::*;

use skipback_core::models::audio_models::{
    AudioSource, AudioTransportType, BlockStatus, DeviceBlock, SampleBlock, StreamFormat,
};
use skipback_core::models::config::RecorderConfiguration;
use skipback_core::models::error::RecorderError;
use skipback_core::traits::capture_provider::{AudioBlockCallback, CaptureProvider};

use crate::device_enumerator::DeviceEnumerator;
use crate::permissions::check_microphone_permission;

const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
const AUDCLNT_E_DEVICE_INVALIDATED: i32 = 0x8889_0004_u32 as i32;

/// WASAPI input capture.
///
/// Audio is pulled on a dedicated thread registered with MMCSS. `start`
/// returns only after the endpoint has been opened and started, so open
/// failures surface as `DeviceOpenFailure` to the caller.
pub struct WasapiInputCapture {
    device_id: Option<String>,
    device_name: String,
    is_default: bool,
    transport_type: Option<AudioTransportType>,
    running: Arc<AtomicBool>,
    /// Error that ended the capture thread after startup.
    stream_error: Arc<Mutex<Option<RecorderError>>>,
    capture_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

// SAFETY: All Windows COM objects are used on a single thread (the capture thread).
// The struct fields are either atomics, Mutex-protected, or plain data.
unsafe impl Send for WasapiInputCapture {}
unsafe impl Sync for WasapiInputCapture {}

impl WasapiInputCapture {
    /// Create a capture for the system default input device.
    pub fn default_device() -> Self {
        Self {
            device_id: None,
            device_name: "Default Input".into(),
            is_default: true,
            transport_type: None,
            running: Arc::new(AtomicBool::new(false)),
            stream_error: Arc::new(Mutex::new(None)),
            capture_handle: Mutex::new(None),
        }
    }

    /// Create a capture for a specific input device by ID.
    pub fn with_device(id: String, name: String, transport: Option<AudioTransportType>) -> Self {
        Self {
            device_id: Some(id),
            device_name: name,
            is_default: false,
            transport_type: transport,
            running: Arc::new(AtomicBool::new(false)),
            stream_error: Arc::new(Mutex::new(None)),
            capture_handle: Mutex::new(None),
        }
    }

    /// The device named by `config.device_id`, or the default device.
    pub fn from_config(config: &RecorderConfiguration) -> Self {
        match &config.device_id {
            Some(id) => Self::with_device(id.clone(), id.clone(), None),
            None => Self::default_device(),
        }
    }
}

impl CaptureProvider for WasapiInputCapture {
    fn is_available(&self) -> bool {
        let has_device = DeviceEnumerator::new()
            .map(|e| !e.list_capture_devices().unwrap_or_default().is_empty())
            .unwrap_or(false);
        has_device && check_microphone_permission().unwrap_or(false)
    }

    fn start(&mut self, format: StreamFormat, callback: AudioBlockCallback) -> Result<(), RecorderError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(RecorderError::ConfigurationFailed("input capture already running".into()));
        }

        self.running.store(true, Ordering::SeqCst);
        *self.stream_error.lock() = None;
        let running = Arc::clone(&self.running);
        let stream_error = Arc::clone(&self.stream_error);
        let device_id = self.device_id.clone();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let handle = thread::Builder::new()
            .name("wasapi-input-capture".into())
            .spawn(move || {
                if let Err(e) = input_capture_loop(running.clone(), device_id, format, callback, ready_tx) {
                    log::error!("Input capture error: {}", e);
                    *stream_error.lock() = Some(e);
                }
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| RecorderError::DeviceOpenFailure(format!("failed to spawn capture thread: {}", e)))?;

        *self.capture_handle.lock() = Some(handle);

        let startup = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(RecorderError::DeviceOpenFailure("capture thread exited during startup".into())));
        if let Err(e) = startup {
            self.stop()?;
            return Err(e);
        }
        Ok(())
    }

    fn take_stream_error(&mut self) -> Option<RecorderError> {
        self.stream_error.lock().take()
    }

    fn stop(&mut self) -> Result<(), RecorderError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.lock().take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn device_info(&self) -> AudioSource {
        AudioSource {
            id: self.device_id.clone().unwrap_or_else(|| "default-input".into()),
            name: self.device_name.clone(),
            is_default: self.is_default,
            transport_type: self.transport_type,
        }
    }
}

/// Collects engine packets (whose size varies) into fixed `block_size`-frame blocks.
struct BlockAssembler {
    block: Vec<f32>,
    filled: usize,
    frames: usize,
    status: BlockStatus,
}

impl BlockAssembler {
    fn new(format: StreamFormat) -> Self {
        Self {
            block: vec![0.0; format.block_samples()],
            filled: 0,
            frames: format.block_size as usize,
            status: BlockStatus::default(),
        }
    }

    fn push(&mut self, mut samples: &[f32], status: BlockStatus, callback: &AudioBlockCallback) {
        self.status.input_overflow |= status.input_overflow;
        self.status.input_underflow |= status.input_underflow;

        while !samples.is_empty() {
            let take = samples.len().min(self.block.len() - self.filled);
            self.block[self.filled..self.filled + take].copy_from_slice(&samples[..take]);
            self.filled += take;
            samples = &samples[take..];

            if self.filled == self.block.len() {
                callback(DeviceBlock::new(SampleBlock::F32(&self.block), self.frames).with_status(self.status));
                self.filled = 0;
                self.status = BlockStatus::default();
            }
        }
    }
}

/// Open the endpoint and start the stream.
///
/// Sequence:
/// 1. Get capture device (default or by ID)
/// 2. Activate IAudioClient
/// 3. Initialize in shared mode with auto-convert to float32 at the requested format
/// 4. Get IAudioCaptureClient service
/// 5. Start
unsafe fn open_stream(
    device_id: Option<&str>,
    format: StreamFormat,
) -> Result<(IAudioClient, IAudioCaptureClient), RecorderError> {
    let enumerator: IMMDeviceEnumerator =
        CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(|_| RecorderError::DeviceNotAvailable)?;

    let device = if let Some(id) = device_id {
        let wide_id: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
        enumerator
            .GetDevice(PCWSTR(wide_id.as_ptr()))
            .map_err(|_| RecorderError::DeviceNotAvailable)?
    } else {
        enumerator
            .GetDefaultAudioEndpoint(eCapture, eConsole)
            .map_err(|_| RecorderError::DeviceNotAvailable)?
    };

    let audio_client: IAudioClient = device
        .Activate(CLSCTX_ALL, None)
        .map_err(|e| RecorderError::DeviceOpenFailure(format!("Activate failed: {}", e)))?;

    let bits_per_sample = 32u16;
    let block_align = format.channels * bits_per_sample / 8;
    let wave_format = WAVEFORMATEX {
        wFormatTag: WAVE_FORMAT_IEEE_FLOAT,
        nChannels: format.channels,
        nSamplesPerSec: format.sample_rate,
        nAvgBytesPerSec: format.sample_rate * block_align as u32,
        nBlockAlign: block_align,
        wBitsPerSample: bits_per_sample,
        cbSize: 0,
    };

    // Engine buffer: 100ms in 100-nanosecond units
    let buffer_duration = 1_000_000;

    audio_client
        .Initialize(
            AUDCLNT_SHAREMODE_SHARED,
            AUDCLNT_STREAMFLAGS_NOPERSIST
                | AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM
                | AUDCLNT_STREAMFLAGS_SRC_DEFAULT_QUALITY,
            buffer_duration,
            0,
            &wave_format,
            None,
        )
        .map_err(|e| RecorderError::DeviceOpenFailure(format!("IAudioClient::Initialize failed: {}", e)))?;

    let capture_client: IAudioCaptureClient = audio_client
        .GetService()
        .map_err(|e| RecorderError::DeviceOpenFailure(format!("GetService failed: {}", e)))?;

    audio_client
        .Start()
        .map_err(|e| RecorderError::DeviceOpenFailure(format!("IAudioClient::Start failed: {}", e)))?;

    Ok((audio_client, capture_client))
}

/// Main capture loop running on a dedicated thread.
///
/// Reports the outcome of opening the stream through `ready` before pulling
/// any audio.
fn input_capture_loop(
    running: Arc<AtomicBool>,
    device_id: Option<String>,
    format: StreamFormat,
    callback: AudioBlockCallback,
    ready: SyncSender<Result<(), RecorderError>>,
) -> Result<(), RecorderError> {
    unsafe {
        if let Err(e) = CoInitializeEx(None, COINIT_MULTITHREADED).ok() {
            let error = RecorderError::DeviceOpenFailure(format!("CoInitializeEx failed: {}", e));
            let _ = ready.send(Err(error.clone()));
            return Err(error);
        }
        let _com_guard = CoUninitializeGuard;

        let (audio_client, capture_client) = match open_stream(device_id.as_deref(), format) {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready.send(Err(e.clone()));
                return Err(e);
            }
        };
        let _ = ready.send(Ok(()));

        // Register with MMCSS for real-time priority
        let mut task_index: u32 = 0;
        let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
        let _mmcss_handle = AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index);

        let channels = format.channels as usize;
        let mut assembler = BlockAssembler::new(format);
        let mut silence: Vec<f32> = Vec::new();

        let result = (|| -> Result<(), RecorderError> {
            while running.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(10));

                let mut packet_length = capture_client
                    .GetNextPacketSize()
                    .map_err(|e| stream_failure("GetNextPacketSize", e))?;

                while packet_length > 0 {
                    let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
                    let mut num_frames: u32 = 0;
                    let mut flags: u32 = 0;

                    capture_client
                        .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                        .map_err(|e| stream_failure("GetBuffer", e))?;

                    if num_frames > 0 && !buffer_ptr.is_null() {
                        let total_samples = num_frames as usize * channels;
                        let status = BlockStatus {
                            input_overflow: flags & (AUDCLNT_BUFFERFLAGS_DATA_DISCONTINUITY.0 as u32) != 0,
                            input_underflow: false,
                        };

                        if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 {
                            silence.clear();
                            silence.resize(total_samples, 0.0);
                            assembler.push(&silence, status, &callback);
                        } else {
                            let samples = std::slice::from_raw_parts(buffer_ptr as *const f32, total_samples);
                            assembler.push(samples, status, &callback);
                        }
                    }

                    capture_client
                        .ReleaseBuffer(num_frames)
                        .map_err(|e| stream_failure("ReleaseBuffer", e))?;

                    packet_length = capture_client
                        .GetNextPacketSize()
                        .map_err(|e| stream_failure("GetNextPacketSize", e))?;
                }
            }
            Ok(())
        })();

        let _ = audio_client.Stop();
        result
    }
}

/// Map a mid-stream WASAPI error; an invalidated endpoint means the device is gone.
fn stream_failure(call: &str, e: windows::core::Error) -> RecorderError {
    if e.code().0 == AUDCLNT_E_DEVICE_INVALIDATED {
        RecorderError::DeviceNotAvailable
    } else {
        RecorderError::DeviceOpenFailure(format!("{} failed: {}", call, e))
    }
}

/// RAII guard to call CoUninitialize when dropped.
struct CoUninitializeGuard;

impl Drop for CoUninitializeGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}
