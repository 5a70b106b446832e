//! WASM bindings for the web client.

use wasm_bindgen::prelude::*;

use crate::backup_merge::{merge_backups, MergeInput, MergeResult};
use crate::conflict_report::{export_conflict_report, MergeConflictReport};

/// Initialize panic hook for better error messages.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Merge two backups.
///
/// Takes a JsValue (MergeInput) and returns a JsValue (MergeResult).
#[wasm_bindgen(js_name = mergeBackups)]
pub fn merge_backups_js(input: JsValue) -> Result<JsValue, JsValue> {
    let input: MergeInput = serde_wasm_bindgen::from_value(input)
        .map_err(|e| JsValue::from_str(&format!("Failed to parse input: {}", e)))?;

    input
        .primary
        .validate()
        .and_then(|_| input.secondary.validate())
        .map_err(|e| JsValue::from_str(&format!("Merge failed: {}", e)))?;

    let output: MergeResult = merge_backups(&input.primary, &input.secondary, input.strategy);

    serde_wasm_bindgen::to_value(&output)
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize output: {}", e)))
}

/// Merge backups using JSON strings (alternative API).
///
/// Takes a JSON string and returns a JSON string.
#[wasm_bindgen(js_name = mergeBackupsJson)]
pub fn merge_backups_json_js(input_json: &str) -> Result<String, JsValue> {
    crate::backup_merge::merge_backups_json(input_json)
        .map_err(|e| JsValue::from_str(&format!("Merge failed: {}", e)))
}

/// Export a conflict report in its stable file format.
///
/// Takes a JsValue (MergeConflictReport) and returns the report text.
#[wasm_bindgen(js_name = exportConflictReport)]
pub fn export_conflict_report_js(report: JsValue) -> Result<String, JsValue> {
    let report: MergeConflictReport = serde_wasm_bindgen::from_value(report)
        .map_err(|e| JsValue::from_str(&format!("Failed to parse report: {}", e)))?;

    let bytes = export_conflict_report(&report)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    String::from_utf8(bytes).map_err(|e| JsValue::from_str(&format!("Export failed: {}", e)))
}
