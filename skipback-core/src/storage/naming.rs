use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

/// File name for a recording finished at `at`: `recording_YYYYmmdd_HHMMSS.<ext>`.
pub fn recording_file_name(at: &DateTime<Local>, extension: &str) -> String {
    format!("recording_{}.{}", at.format("%Y%m%d_%H%M%S"), extension)
}

/// Path for a recording in `directory`, suffixed `_1`, `_2`, ... when a file
/// with the timestamped name already exists (two sessions ending in the same
/// second).
pub fn unique_recording_path(directory: &Path, at: &DateTime<Local>, extension: &str) -> PathBuf {
    let candidate = directory.join(recording_file_name(at, extension));
    if !candidate.exists() {
        return candidate;
    }

    let stem = format!("recording_{}", at.format("%Y%m%d_%H%M%S"));
    (1u32..)
        .map(|n| directory.join(format!("{}_{}.{}", stem, n, extension)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}
