//! # skipback-windows
//!
//! Windows WASAPI backend for the skip-back recorder.
//!
//! Provides:
//! - `WasapiInputCapture`: capture endpoint input, re-chunked into fixed-size blocks
//! - `DeviceEnumerator`: capture device enumeration via MMDevice API
//! - `permissions`: Windows microphone privacy check
//!
//! ## Usage
//! ```ignore
//! use skipback_core::{ChannelDelegate, RecorderConfiguration, RecorderController};
//! use skipback_windows::WasapiInputCapture;
//!
//! let config = RecorderConfiguration::default();
//! let (delegate, events) = ChannelDelegate::new();
//! let input = WasapiInputCapture::from_config(&config);
//! let mut recorder = RecorderController::spawn(config, input, delegate)?;
//! recorder.request_start();
//! ```

#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod permissions;
#[cfg(target_os = "windows")]
pub mod wasapi_input;

#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use wasapi_input::WasapiInputCapture;
