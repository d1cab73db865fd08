//! Windows audio device enumeration via the MMDevice API.
//!
//! Wraps `IMMDeviceEnumerator` to list capture endpoints (microphones,
//! line inputs) with friendly names and transport types.

use windows::Win32::Devices::FunctionDiscovery::{PKEY_Device_EnumeratorName, PKEY_Device_FriendlyName};
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use skipback_core::models::audio_models::{AudioSource, AudioTransportType};
use skipback_core::models::error::RecorderError;

/// Audio device enumerator using the Windows MMDevice API.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    /// Create a new device enumerator.
    ///
    /// Requires COM to be initialized on the calling thread.
    pub fn new() -> Result<Self, RecorderError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                    .map_err(|e| RecorderError::Unknown(format!("failed to create enumerator: {}", e)))?;
            Ok(Self { enumerator })
        }
    }

    /// List active capture devices.
    pub fn list_capture_devices(&self) -> Result<Vec<AudioSource>, RecorderError> {
        self.list_devices(eCapture)
    }

    /// Get the default capture device ID.
    pub fn default_capture_device_id(&self) -> Result<String, RecorderError> {
        unsafe {
            let device = self
                .enumerator
                .GetDefaultAudioEndpoint(eCapture, eConsole)
                .map_err(|_| RecorderError::DeviceNotAvailable)?;

            let id = device
                .GetId()
                .map_err(|e| RecorderError::Unknown(format!("GetId failed: {}", e)))?;

            Ok(id.to_string().unwrap_or_default())
        }
    }

    /// Find a capture device by ID or friendly name.
    pub fn find_capture_device(&self, id_or_name: &str) -> Result<Option<AudioSource>, RecorderError> {
        Ok(self
            .list_capture_devices()?
            .into_iter()
            .find(|d| d.id == id_or_name || d.name == id_or_name))
    }

    fn list_devices(&self, data_flow: EDataFlow) -> Result<Vec<AudioSource>, RecorderError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(data_flow, DEVICE_STATE_ACTIVE)
                .map_err(|e| RecorderError::Unknown(format!("EnumAudioEndpoints failed: {}", e)))?;

            let count = collection
                .GetCount()
                .map_err(|e| RecorderError::Unknown(format!("GetCount failed: {}", e)))?;

            // Get default device ID for comparison
            let default_id = self
                .enumerator
                .GetDefaultAudioEndpoint(data_flow, eConsole)
                .ok()
                .and_then(|d| d.GetId().ok())
                .and_then(|id| id.to_string().ok());

            let mut devices = Vec::new();

            for i in 0..count {
                let device = match collection.Item(i) {
                    Ok(d) => d,
                    Err(_) => continue,
                };

                let id = match device.GetId() {
                    Ok(id) => id.to_string().unwrap_or_default(),
                    Err(_) => continue,
                };

                let name = Self::get_device_friendly_name(&device).unwrap_or_else(|| format!("Device {}", i));

                let transport = Self::detect_transport_type(&device);
                let is_default = default_id.as_deref() == Some(id.as_str());

                devices.push(AudioSource {
                    id,
                    name,
                    is_default,
                    transport_type: Some(transport),
                });
            }

            Ok(devices)
        }
    }

    /// Read the PKEY_Device_FriendlyName property from a device.
    fn get_device_friendly_name(device: &IMMDevice) -> Option<String> {
        unsafe {
            let store = device.OpenPropertyStore(STGM_READ).ok()?;
            let value = store.GetValue(&PKEY_Device_FriendlyName).ok()?;
            let name = value.to_string();
            (!name.is_empty()).then_some(name)
        }
    }

    /// Detect the transport type of an audio device from its enumerator name.
    fn detect_transport_type(device: &IMMDevice) -> AudioTransportType {
        let enumerator_name = unsafe {
            device
                .OpenPropertyStore(STGM_READ)
                .and_then(|store| store.GetValue(&PKEY_Device_EnumeratorName))
                .map(|value| value.to_string())
        };

        match enumerator_name {
            Ok(name) => transport_from_enumerator_name(&name),
            Err(_) => AudioTransportType::Unknown,
        }
    }
}

fn transport_from_enumerator_name(name: &str) -> AudioTransportType {
    if name.contains("BTHLEENUM") {
        AudioTransportType::BluetoothLE
    } else if name.contains("BTHENUM") {
        AudioTransportType::Bluetooth
    } else if name.contains("USB") {
        AudioTransportType::Usb
    } else if name.contains("ROOT") || name.contains("SW") {
        AudioTransportType::Virtual
    } else {
        AudioTransportType::BuiltIn
    }
}
