//! Merge conflict reports and stable export.
//!
//! Exports are pretty-printed JSON with keys sorted at every level so that two
//! exports of the same report are byte-identical and diff cleanly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backup::{datetime, BackupPayload};
use crate::error::{BackupError, BackupResult};

/// Which kind of record a conflict belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    Goal,
    Question,
    DataPoint,
}

/// One of the two payloads handed to the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSide {
    Primary,
    Secondary,
}

impl ConflictSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictSide::Primary => "primary",
            ConflictSide::Secondary => "secondary",
        }
    }
}

/// A single field-level divergence between the two payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Goal the conflicting record belongs to
    pub goal_id: Uuid,
    /// Goal title for display
    pub goal_title: String,
    pub conflict_type: ConflictType,
    /// Set for question and data point conflicts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<Uuid>,
    /// Set for data point conflicts (primary record's timestamp)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "datetime::iso8601_option"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    /// Name of the differing field
    pub field: String,
    /// Primary payload's value, rendered for display
    pub primary_value: String,
    /// Secondary payload's value, rendered for display
    pub secondary_value: String,
    /// Side whose goal has the later `updatedAt` (primary on ties)
    pub preferred_side: ConflictSide,
    /// Human-readable resolution hint
    pub recommendation: String,
}

/// Counts derived from the conflict list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "uniffi", derive(uniffi::Record))]
pub struct ConflictSummary {
    pub total_conflicts: u32,
    pub goal_conflicts: u32,
    pub question_conflicts: u32,
    pub data_point_conflicts: u32,
    /// True when at least one goal, question or data point survives after
    /// every conflicting item is discarded
    pub can_proceed_without_conflicting_data: bool,
}

impl ConflictSummary {
    pub fn from_conflicts(conflicts: &[ConflictRecord], can_proceed: bool) -> Self {
        let count = |kind: ConflictType| {
            conflicts.iter().filter(|c| c.conflict_type == kind).count() as u32
        };
        let goal_conflicts = count(ConflictType::Goal);
        let question_conflicts = count(ConflictType::Question);
        let data_point_conflicts = count(ConflictType::DataPoint);

        Self {
            total_conflicts: goal_conflicts + question_conflicts + data_point_conflicts,
            goal_conflicts,
            question_conflicts,
            data_point_conflicts,
            can_proceed_without_conflicting_data: can_proceed,
        }
    }
}

/// Every irreconcilable difference found by a merge, in deterministic order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeConflictReport {
    pub summary: ConflictSummary,
    pub conflicts: Vec<ConflictRecord>,
}

impl MergeConflictReport {
    pub fn new(conflicts: Vec<ConflictRecord>, can_proceed: bool) -> Self {
        Self {
            summary: ConflictSummary::from_conflicts(&conflicts, can_proceed),
            conflicts,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Serialize a conflict report for writing to a file.
pub fn export_conflict_report(report: &MergeConflictReport) -> BackupResult<Vec<u8>> {
    to_stable_json(report)
}

/// Serialize a merged payload for writing to a file.
pub fn export_merged_payload(payload: &BackupPayload) -> BackupResult<Vec<u8>> {
    to_stable_json(payload)
}

/// Export a JSON-encoded conflict report and return the stable text.
/// Convenience function for FFI.
pub fn export_conflict_report_json(report_json: &str) -> BackupResult<String> {
    let report: MergeConflictReport = serde_json::from_str(report_json)?;
    let bytes = export_conflict_report(&report)?;
    String::from_utf8(bytes).map_err(|e| BackupError::Export(e.to_string()))
}

/// Default file name for an exported merged backup.
pub fn merged_backup_file_name(now: DateTime<Utc>) -> String {
    format!("merged-backup-{}.json", now.format("%Y%m%d-%H%M%S"))
}

/// Default file name for an exported conflict report.
pub fn conflict_report_file_name(now: DateTime<Utc>) -> String {
    format!("merge-conflict-report-{}.json", now.format("%Y%m%d-%H%M%S"))
}

// Going through `serde_json::Value` sorts object keys (its map is a BTreeMap).
fn to_stable_json<T: Serialize>(value: &T) -> BackupResult<Vec<u8>> {
    let tree = serde_json::to_value(value).map_err(|e| BackupError::Export(e.to_string()))?;
    let mut bytes =
        serde_json::to_vec_pretty(&tree).map_err(|e| BackupError::Export(e.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}
