//! FFI bindings for ImmuneScore
//!
//! This module provides C-compatible functions for calling the score engine
//! from the mobile app. All functions use C strings (null-terminated) and
//! return allocated memory that must be freed by the caller using
//! `immune_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::coach::FORECAST_WINDOW_DAYS;
use crate::config::TrainingConfig;
use crate::pipeline::{
    coach_json, predict_json, records_from_json, retrain_from_history, score_history_json,
};
use crate::predictor::ScorePredictor;
use crate::store::JsonFileStore;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

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
// Predictor API
// ============================================================================

/// Opaque handle to a ScorePredictor
pub struct ImmunePredictorHandle {
    predictor: ScorePredictor,
}

/// Create a predictor.
///
/// # Safety
/// - `params_path` may be NULL (in-memory parameters) or a valid
///   null-terminated C string naming the JSON parameter file.
/// - Returns a pointer that must be freed with `immune_predictor_free`.
/// - Returns NULL on error; call `immune_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn immune_predictor_new(
    params_path: *const c_char,
) -> *mut ImmunePredictorHandle {
    clear_last_error();

    let predictor = if params_path.is_null() {
        ScorePredictor::in_memory()
    } else {
        match cstr_to_string(params_path) {
            Some(path) => ScorePredictor::new(Box::new(JsonFileStore::new(path))),
            None => {
                set_last_error("Invalid params path string");
                return ptr::null_mut();
            }
        }
    };

    Box::into_raw(Box::new(ImmunePredictorHandle { predictor }))
}

/// Free a predictor.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `immune_predictor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn immune_predictor_free(handle: *mut ImmunePredictorHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Score raw metrics given as a JSON object.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `immune_predictor_new`.
/// - `metrics_json` must be a valid null-terminated C string.
/// - Returns the score (1-100), or -1 on error; call `immune_last_error`.
#[no_mangle]
pub unsafe extern "C" fn immune_predictor_predict(
    handle: *const ImmunePredictorHandle,
    metrics_json: *const c_char,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null predictor pointer");
        return -1;
    }
    let handle = &*handle;

    let json = match cstr_to_string(metrics_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid metrics JSON string pointer");
            return -1;
        }
    };

    match predict_json(&handle.predictor, &json) {
        Ok(score) => score as i32,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Fit the predictor on daily records (JSON array or NDJSON).
///
/// Records without an `immune_score` are skipped; no scored records is a no-op.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `immune_predictor_new`.
/// - `records_json` must be a valid null-terminated C string.
/// - `config_json` may be NULL (defaults) or a valid null-terminated C string.
/// - Returns 0 on success, -1 on error; call `immune_last_error`.
#[no_mangle]
pub unsafe extern "C" fn immune_predictor_fit(
    handle: *const ImmunePredictorHandle,
    records_json: *const c_char,
    config_json: *const c_char,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null predictor pointer");
        return -1;
    }
    let handle = &*handle;

    let records = match cstr_to_string(records_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid records JSON string pointer");
            return -1;
        }
    };

    let config = if config_json.is_null() {
        *handle.predictor.config()
    } else {
        let parsed = match cstr_to_string(config_json) {
            Some(s) => TrainingConfig::from_json(&s),
            None => {
                set_last_error("Invalid config JSON string pointer");
                return -1;
            }
        };
        match parsed {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return -1;
            }
        }
    };

    let result = records_from_json(&records)
        .and_then(|history| retrain_from_history(&handle.predictor, &history, &config));
    match result {
        Ok(_) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Reset the predictor to default parameters.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `immune_predictor_new`.
/// - Returns 0 on success, -1 for a NULL handle.
#[no_mangle]
pub unsafe extern "C" fn immune_predictor_reset(handle: *const ImmunePredictorHandle) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null predictor pointer");
        return -1;
    }
    (*handle).predictor.reset();
    0
}

/// Current weights, bias and state as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `immune_predictor_new`.
/// - Returns a newly allocated string that must be freed with `immune_free_string`.
/// - Returns NULL on error; call `immune_last_error`.
#[no_mangle]
pub unsafe extern "C" fn immune_predictor_parameters(
    handle: *const ImmunePredictorHandle,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null predictor pointer");
        return ptr::null_mut();
    }
    let predictor = &(*handle).predictor;

    let params = predictor.parameters();
    let payload = serde_json::json!({
        "weights": params.weights,
        "bias": params.bias,
        "state": predictor.state(),
    });
    match serde_json::to_string(&payload) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Rescore daily records and return them as a JSON array.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `immune_predictor_new`.
/// - `records_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `immune_free_string`.
/// - Returns NULL on error; call `immune_last_error`.
#[no_mangle]
pub unsafe extern "C" fn immune_score_history(
    handle: *const ImmunePredictorHandle,
    records_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null predictor pointer");
        return ptr::null_mut();
    }
    let handle = &*handle;

    let records = match cstr_to_string(records_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid records JSON string pointer");
            return ptr::null_mut();
        }
    };

    match score_history_json(&handle.predictor, &records) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Forecast and coaching nudges for daily records, as JSON.
///
/// The forecast scores the per-metric mean of the last `days` records (0 uses
/// the default window of 3); nudges are for the latest record.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `immune_predictor_new`.
/// - `records_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `immune_free_string`.
/// - Returns NULL on error; call `immune_last_error`.
#[no_mangle]
pub unsafe extern "C" fn immune_coach(
    handle: *const ImmunePredictorHandle,
    records_json: *const c_char,
    days: u32,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null predictor pointer");
        return ptr::null_mut();
    }
    let handle = &*handle;

    let records = match cstr_to_string(records_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid records JSON string pointer");
            return ptr::null_mut();
        }
    };

    let days = if days == 0 {
        FORECAST_WINDOW_DAYS
    } else {
        days as usize
    };
    match coach_json(&handle.predictor, &records, days) {
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

/// Free a string returned by ImmuneScore functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an ImmuneScore function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn immune_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next ImmuneScore call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn immune_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}
