//! UniFFI API module for Swift and Kotlin bindings.
//!
//! This module exposes the backup merge operations via UniFFI for mobile platforms.
//! All functions use JSON strings for input/output to simplify cross-language marshalling.

use crate::error::BackupError;

/// Get the version of the goaltrack-core library.
#[uniffi::export]
pub fn get_core_version() -> String {
    crate::get_core_version().to_string()
}

/// Merge two backups.
///
/// # Arguments
/// * `input_json` - JSON string with format:
///   ```json
///   {
///     "primary": {"goals": [...], "dataPoints": [...]},
///     "secondary": {"goals": [...], "dataPoints": [...]},
///     "strategy": "stop_on_conflict"
///   }
///   ```
///
/// # Returns
/// JSON string with format:
///   ```json
///   {
///     "success": false,
///     "merged": null,
///     "conflicts": {"summary": {"total_conflicts": 1, ...}, "conflicts": [...]},
///     "stats": {"goals_shared": 1, ...}
///   }
///   ```
#[uniffi::export]
pub fn merge_backups_json(input_json: String) -> Result<String, BackupError> {
    crate::backup_merge::merge_backups_json(&input_json)
}

/// Export a conflict report (as returned inside a merge result) in its stable file format.
#[uniffi::export]
pub fn export_conflict_report_json(report_json: String) -> Result<String, BackupError> {
    crate::conflict_report::export_conflict_report_json(&report_json)
}

/// Default file name for a merged backup created at `unix_seconds`.
#[uniffi::export]
pub fn merged_backup_file_name(unix_seconds: i64) -> Result<String, BackupError> {
    let now = chrono::DateTime::from_timestamp(unix_seconds, 0)
        .ok_or_else(|| BackupError::Export(format!("timestamp out of range: {}", unix_seconds)))?;
    Ok(crate::conflict_report::merged_backup_file_name(now))
}

/// Default file name for a conflict report created at `unix_seconds`.
#[uniffi::export]
pub fn conflict_report_file_name(unix_seconds: i64) -> Result<String, BackupError> {
    let now = chrono::DateTime::from_timestamp(unix_seconds, 0)
        .ok_or_else(|| BackupError::Export(format!("timestamp out of range: {}", unix_seconds)))?;
    Ok(crate::conflict_report::conflict_report_file_name(now))
}
