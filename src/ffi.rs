//! FFI bindings for Edit Flux
//!
//! This module provides C-compatible functions so host editors written in
//! other languages can drive an edit session. All functions use C strings
//! (null-terminated) and return allocated memory that must be freed by the
//! caller using `edit_flux_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::normalizer::ChangeNotification;
use crate::pipeline::{events_to_report, EditSession};
use crate::types::EditEventRecord;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Replay recorded events (NDJSON or JSON array) and return report JSON.
///
/// # Safety
/// - `events` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `edit_flux_free_string`.
/// - Returns NULL on error; call `edit_flux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn edit_flux_events_to_report(events: *const c_char) -> *mut c_char {
    clear_last_error();

    let events_str = match cstr_to_string(events) {
        Some(s) => s,
        None => {
            set_last_error("Invalid events string pointer");
            return ptr::null_mut();
        }
    };

    match events_to_report(&events_str) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Session API
// ============================================================================

/// Opaque handle to an EditSession
pub struct EditSessionHandle {
    session: EditSession,
}

/// Create a new session.
///
/// # Safety
/// - `config_json` may be NULL for defaults, otherwise a valid null-terminated
///   C string holding a (possibly partial) JSON config.
/// - Must be freed with `edit_flux_session_free`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn edit_flux_session_new(
    config_json: *const c_char,
) -> *mut EditSessionHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        LedgerConfig::default()
    } else {
        let parsed = cstr_to_string(config_json)
            .ok_or_else(|| LedgerError::InvalidConfig("config is not valid UTF-8".to_string()))
            .and_then(|json| LedgerConfig::from_json(&json));
        match parsed {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match EditSession::with_config(config) {
        Ok(session) => Box::into_raw(Box::new(EditSessionHandle { session })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `edit_flux_session_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn edit_flux_session_free(session: *mut EditSessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Seed the session with the document text present when observation began.
///
/// # Safety
/// - `session` must be a valid pointer returned by `edit_flux_session_new`.
/// - `document` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn edit_flux_session_initialise(
    session: *mut EditSessionHandle,
    document: *const c_char,
) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }

    let handle = &mut *session;

    let document_str = match cstr_to_string(document) {
        Some(s) => s,
        None => {
            set_last_error("Invalid document string pointer");
            return -1;
        }
    };

    match handle.session.initialise(&document_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Consume one event record given as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `edit_flux_session_new`.
/// - `event_json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn edit_flux_session_consume_event(
    session: *mut EditSessionHandle,
    event_json: *const c_char,
) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }

    let handle = &mut *session;

    let json_str = match cstr_to_string(event_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid event string pointer");
            return -1;
        }
    };

    let result = serde_json::from_str::<EditEventRecord>(&json_str)
        .map_err(LedgerError::from)
        .and_then(|record| handle.session.consume_record(record));

    match result {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Apply one host change notification.
///
/// `change_json` is `{"start_line": .., "end_line": .., "text": ..}`;
/// `document` is the full document text after the change.
///
/// # Safety
/// - `session` must be a valid pointer returned by `edit_flux_session_new`.
/// - `change_json` and `document` must be valid null-terminated C strings.
/// - Returns the number of events consumed, or -1 on error.
#[no_mangle]
pub unsafe extern "C" fn edit_flux_session_apply_change(
    session: *mut EditSessionHandle,
    change_json: *const c_char,
    document: *const c_char,
) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }

    let handle = &mut *session;

    let change_str = match cstr_to_string(change_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid change string pointer");
            return -1;
        }
    };

    let document_str = match cstr_to_string(document) {
        Some(s) => s,
        None => {
            set_last_error("Invalid document string pointer");
            return -1;
        }
    };

    let result = serde_json::from_str::<ChangeNotification>(&change_str)
        .map_err(LedgerError::from)
        .and_then(|change| handle.session.apply_change(&change, &document_str));

    match result {
        Ok(count) => i32::try_from(count).unwrap_or(i32::MAX),
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Current metrics as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `edit_flux_session_new`.
/// - Returns a newly allocated string that must be freed with `edit_flux_free_string`.
/// - Returns NULL on error; call `edit_flux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn edit_flux_session_metrics(session: *mut EditSessionHandle) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let handle = &*session;

    match serde_json::to_string(&handle.session.metrics()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Full session report as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `edit_flux_session_new`.
/// - Returns a newly allocated string that must be freed with `edit_flux_free_string`.
/// - Returns NULL on error; call `edit_flux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn edit_flux_session_report(session: *mut EditSessionHandle) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let handle = &*session;

    match handle.session.report_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Edit Flux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an Edit Flux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn edit_flux_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Edit Flux call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn edit_flux_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Edit Flux library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn edit_flux_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        unsafe {
            let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
            edit_flux_free_string(ptr);
            s
        }
    }

    #[test]
    fn test_ffi_events_to_report() {
        let events = CString::new(
            r#"[{"line":0,"kind":"add","timestamp":"2024-01-15T14:00:00Z","content":"pasted text","assisted":true}]"#,
        )
        .unwrap();

        let report = unsafe { take_string(edit_flux_events_to_report(events.as_ptr())) };
        let payload: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(payload["snapshot"]["content"], "pasted text");
        assert_eq!(
            payload["snapshot"]["metrics"]["assisted_text_percentage"],
            100.0
        );
    }

    #[test]
    fn test_ffi_session_lifecycle() {
        unsafe {
            let session = edit_flux_session_new(ptr::null());
            assert!(!session.is_null());

            let document = CString::new("fn main() {\n}").unwrap();
            assert_eq!(edit_flux_session_initialise(session, document.as_ptr()), 0);

            let change = CString::new(r#"{"start_line":0,"end_line":0,"text":"\n    run();"}"#)
                .unwrap();
            let after = CString::new("fn main() {\n    run();\n}").unwrap();
            assert_eq!(
                edit_flux_session_apply_change(session, change.as_ptr(), after.as_ptr()),
                2
            );

            let event = CString::new(
                r#"{"line":1,"kind":"modify","timestamp":"2030-01-01T00:00:00Z","content":"    run()?;"}"#,
            )
            .unwrap();
            assert_eq!(edit_flux_session_consume_event(session, event.as_ptr()), 0);

            let metrics = take_string(edit_flux_session_metrics(session));
            let metrics: serde_json::Value = serde_json::from_str(&metrics).unwrap();
            assert!(metrics["assisted_text_percentage"].as_f64().unwrap() > 0.0);

            let report = take_string(edit_flux_session_report(session));
            let report: serde_json::Value = serde_json::from_str(&report).unwrap();
            assert_eq!(report["snapshot"]["content"], "fn main() {\n    run()?;\n}");

            edit_flux_session_free(session);
        }
    }

    #[test]
    fn test_ffi_session_with_config() {
        unsafe {
            let config = CString::new(r#"{"bucket_width_ms": 1000}"#).unwrap();
            let session = edit_flux_session_new(config.as_ptr());
            assert!(!session.is_null());
            edit_flux_session_free(session);

            let bad = CString::new(r#"{"bucket_width_ms": 0}"#).unwrap();
            let session = edit_flux_session_new(bad.as_ptr());
            assert!(session.is_null());
            assert!(!edit_flux_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let session = edit_flux_session_new(ptr::null());

            let missing_line = CString::new(
                r#"{"line":7,"kind":"modify","timestamp":"2024-01-15T14:00:00Z","content":"x"}"#,
            )
            .unwrap();
            assert_eq!(
                edit_flux_session_consume_event(session, missing_line.as_ptr()),
                -1
            );

            let error = edit_flux_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("Line not found"));

            assert_eq!(
                edit_flux_session_consume_event(ptr::null_mut(), missing_line.as_ptr()),
                -1
            );

            edit_flux_session_free(session);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = edit_flux_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
