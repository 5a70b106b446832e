//! C FFI exports for desktop P/Invoke.
//!
//! These functions provide a C-compatible interface for calling Rust functions from C#.
//! All functions use JSON strings for input/output to simplify marshalling.

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use crate::backup_merge::merge_backups_json;
use crate::conflict_report::export_conflict_report_json;

/// Merge two backups.
///
/// # Safety
///
/// - `input_json` must be a valid null-terminated C string holding a `MergeInput`
/// - The returned pointer must be freed by calling `free_string`
///
/// # Returns
///
/// A null-terminated C string containing the JSON result (MergeResult).
/// Returns null when the input pointer is null or not UTF-8.
#[no_mangle]
pub unsafe extern "C" fn merge_backups_ffi(input_json: *const c_char) -> *mut c_char {
    let Some(input) = c_char_to_str(input_json) else {
        return ptr::null_mut();
    };

    match merge_backups_json(input) {
        Ok(json) => string_to_c_char(json),
        Err(e) => create_error_response(&format!("Merge failed: {}", e)),
    }
}

/// Export a conflict report in its stable file format.
///
/// # Safety
///
/// - `report_json` must be a valid null-terminated C string holding a `MergeConflictReport`
/// - The returned pointer must be freed by calling `free_string`
///
/// # Returns
///
/// A null-terminated C string with the exported report text.
/// Returns null when the input pointer is null or not UTF-8.
#[no_mangle]
pub unsafe extern "C" fn export_conflict_report_ffi(report_json: *const c_char) -> *mut c_char {
    let Some(report) = c_char_to_str(report_json) else {
        return ptr::null_mut();
    };

    match export_conflict_report_json(report) {
        Ok(text) => string_to_c_char(text),
        Err(e) => create_error_response(&format!("Export failed: {}", e)),
    }
}

/// Free a string that was allocated by Rust.
///
/// # Safety
///
/// - `s` must be a pointer that was returned by one of the FFI functions
/// - This function must only be called once per pointer
/// - After calling this function, the pointer is invalid
#[no_mangle]
pub unsafe extern "C" fn free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Borrow a C string as `&str`, or `None` when null or not UTF-8.
unsafe fn c_char_to_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}

/// Convert a Rust string to a C string pointer.
fn string_to_c_char(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(c_string) => c_string.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Create an error response JSON string.
fn create_error_response(message: &str) -> *mut c_char {
    let error_json = serde_json::json!({ "success": false, "error": message }).to_string();
    string_to_c_char(error_json)
}
