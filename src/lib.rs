//! Goal Tracker Core Library
//!
//! Cross-platform core functionality for the goal tracker, including:
//! - **backup**: Backup payload model (goals, questions, data points) and validation
//! - **backup_merge**: Merge of two diverged backups with conflict detection
//! - **conflict_report**: Conflict reports and stable export of reports and merged backups
//!
//! This library accepts data as JSON and returns results as JSON.
//! Each platform (iOS, Android, web, desktop) handles its own file and
//! database I/O and calls this library for the core logic.
//!
//! # Example (conceptual)
//! ```ignore
//! let primary = decode_payload_json(&read_file("phone-backup.json"))?;
//! let secondary = decode_payload_json(&read_file("tablet-backup.json"))?;
//! let result = merge_backups(&primary, &secondary, MergeStrategy::StopOnConflict);
//!
//! if let Some(merged) = &result.merged {
//!     write_file(&merged_backup_file_name(now), &export_merged_payload(merged)?);
//! } else if let Some(report) = &result.conflicts {
//!     write_file(&conflict_report_file_name(now), &export_conflict_report(report)?);
//! }
//! ```

pub mod backup;
pub mod backup_merge;
pub mod conflict_report;
pub mod error;

pub use backup::{
    decode_payload_json, BackupPayload, DataPoint, DataPointValue, Frequency, Goal, GoalCategory,
    Question, ResponseType, Schedule, TimeOfDay, ValidationRules, BACKUP_FORMAT_VERSION,
};
pub use backup_merge::{
    merge_backups, merge_backups_json, MergeInput, MergeResult, MergeStats, MergeStrategy,
};
pub use conflict_report::{
    conflict_report_file_name, export_conflict_report, export_conflict_report_json,
    export_merged_payload, merged_backup_file_name, ConflictRecord, ConflictSide, ConflictSummary,
    ConflictType, MergeConflictReport,
};
pub use error::{BackupError, BackupResult};

/// Returns the core crate version.
pub fn get_core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// WASM bindings
#[cfg(feature = "wasm")]
pub mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::*;

// C FFI exports for desktop P/Invoke
#[cfg(feature = "ffi")]
pub mod ffi;

// UniFFI bindings for Swift/Kotlin
#[cfg(feature = "uniffi")]
pub mod uniffi_api;

#[cfg(feature = "uniffi")]
pub use uniffi_api::*;

// UniFFI scaffolding - generates the FFI glue code
#[cfg(feature = "uniffi")]
uniffi::setup_scaffolding!();
