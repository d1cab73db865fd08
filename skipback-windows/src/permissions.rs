//! Windows microphone privacy permission check.
//!
//! On Windows 10 1803+, microphone access is controlled by the privacy
//! settings at Settings > Privacy > Microphone. Desktop apps are generally
//! allowed unless the user has disabled the global toggle.

use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use skipback_core::models::error::RecorderError;

// E_ACCESSDENIED and AUDCLNT_E_DEVICE_IN_USE
const ACCESS_DENIED: i32 = -2147024891;
const DEVICE_IN_USE: i32 = -2004287478;

/// Check if input capture is permitted.
///
/// Attempts to activate the default capture device. `E_ACCESSDENIED` or
/// `AUDCLNT_E_DEVICE_IN_USE` means capture is blocked, typically by the
/// Windows privacy settings.
pub fn check_microphone_permission() -> Result<bool, RecorderError> {
    unsafe {
        CoInitializeEx(None, COINIT_MULTITHREADED)
            .ok()
            .map_err(|e| RecorderError::Unknown(format!("CoInitializeEx failed: {}", e)))?;

        let result = check_mic_access_inner();

        CoUninitialize();
        result
    }
}

unsafe fn check_mic_access_inner() -> Result<bool, RecorderError> {
    let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
        .map_err(|e| RecorderError::Unknown(format!("failed to create enumerator: {}", e)))?;

    let device = match enumerator.GetDefaultAudioEndpoint(eCapture, eConsole) {
        Ok(d) => d,
        Err(_) => return Ok(false), // No capture device
    };

    let result: windows::core::Result<IAudioClient> = device.Activate(CLSCTX_ALL, None);

    match result {
        Ok(_) => Ok(true),
        Err(e) => {
            let code = e.code().0;
            if code == ACCESS_DENIED || code == DEVICE_IN_USE {
                Ok(false)
            } else {
                log::warn!("Unexpected error checking microphone permission: {}", e);
                Ok(true)
            }
        }
    }
}
