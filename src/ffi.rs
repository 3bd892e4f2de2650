//! FFI bindings for Habit Pulse
//!
//! C-compatible entry points for mobile and desktop hosts. Every argument is a
//! null-terminated UTF-8 string (dates as `YYYY-MM-DD`, snapshots as
//! `habit.snapshot.v1` JSON). Results are JSON strings allocated by Rust that
//! must be released with `pulse_free_string`. On failure a function returns
//! NULL and `pulse_last_error` describes why.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::calendar::parse_day;
use crate::config::EngineConfig;
use crate::engine::{
    snapshot_daily_score, snapshot_habit_streak, snapshot_habit_streak_after_update,
    snapshot_period_average, snapshot_user_streaks, HabitEngine, HabitStreak,
};
use crate::error::EngineError;
use crate::store::InMemoryStore;
use crate::types::{HabitId, ProgressRecord};

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

/// Read a C string argument, recording an error naming `what` when unusable
unsafe fn read_arg(ptr: *const c_char, what: &str) -> Option<String> {
    if ptr.is_null() {
        set_last_error(&format!("Null {what} pointer"));
        return None;
    }
    match CStr::from_ptr(ptr).to_str() {
        Ok(s) => Some(s.to_string()),
        Err(_) => {
            set_last_error(&format!("Invalid UTF-8 in {what}"));
            None
        }
    }
}

fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => {
            set_last_error("Result contains an interior NUL byte");
            ptr::null_mut()
        }
    }
}

/// Hand a JSON result to the caller, or record the error and return NULL
fn into_result(result: Result<String, EngineError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Snapshot API
// ============================================================================

/// Daily score of an owner on a date.
///
/// Returns `{"date", "percentage", "habit_count"}`.
///
/// # Safety
/// - All arguments must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_daily_score(
    snapshot_json: *const c_char,
    owner_id: *const c_char,
    date: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(json) = read_arg(snapshot_json, "snapshot_json") else {
        return ptr::null_mut();
    };
    let Some(owner) = read_arg(owner_id, "owner_id") else {
        return ptr::null_mut();
    };
    let Some(date) = read_arg(date, "date") else {
        return ptr::null_mut();
    };

    into_result(snapshot_daily_score(&json, &owner, &date))
}

/// Average completion of an owner over an inclusive date range.
///
/// Returns `{"owner_id", "start", "end", "average"}`; `average` is null when
/// no date in the range had a participating habit.
///
/// # Safety
/// - All arguments must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_period_average(
    snapshot_json: *const c_char,
    owner_id: *const c_char,
    start: *const c_char,
    end: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(json) = read_arg(snapshot_json, "snapshot_json") else {
        return ptr::null_mut();
    };
    let Some(owner) = read_arg(owner_id, "owner_id") else {
        return ptr::null_mut();
    };
    let Some(start) = read_arg(start, "start") else {
        return ptr::null_mut();
    };
    let Some(end) = read_arg(end, "end") else {
        return ptr::null_mut();
    };

    into_result(snapshot_period_average(&json, &owner, &start, &end))
}

/// Current and longest streak of an owner as of `today`.
///
/// Returns `{"current", "longest"}`.
///
/// # Safety
/// - All arguments must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_user_streaks(
    snapshot_json: *const c_char,
    owner_id: *const c_char,
    today: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(json) = read_arg(snapshot_json, "snapshot_json") else {
        return ptr::null_mut();
    };
    let Some(owner) = read_arg(owner_id, "owner_id") else {
        return ptr::null_mut();
    };
    let Some(today) = read_arg(today, "today") else {
        return ptr::null_mut();
    };

    into_result(snapshot_user_streaks(&json, &owner, &today))
}

/// Streak shown on a habit's panel as of `today`.
///
/// Returns `{"owner_id", "name", "date", "streak"}`.
///
/// # Safety
/// - All arguments must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_habit_streak(
    snapshot_json: *const c_char,
    owner_id: *const c_char,
    habit_name: *const c_char,
    today: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(json) = read_arg(snapshot_json, "snapshot_json") else {
        return ptr::null_mut();
    };
    let Some(owner) = read_arg(owner_id, "owner_id") else {
        return ptr::null_mut();
    };
    let Some(name) = read_arg(habit_name, "habit_name") else {
        return ptr::null_mut();
    };
    let Some(today) = read_arg(today, "today") else {
        return ptr::null_mut();
    };

    into_result(snapshot_habit_streak(&json, &owner, &name, &today))
}

/// Streak shown on a habit's panel right after logging `new_raw_value` today.
///
/// The value is not persisted.
///
/// # Safety
/// - All string arguments must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_habit_streak_after_update(
    snapshot_json: *const c_char,
    owner_id: *const c_char,
    habit_name: *const c_char,
    today: *const c_char,
    new_raw_value: f64,
) -> *mut c_char {
    clear_last_error();

    let Some(json) = read_arg(snapshot_json, "snapshot_json") else {
        return ptr::null_mut();
    };
    let Some(owner) = read_arg(owner_id, "owner_id") else {
        return ptr::null_mut();
    };
    let Some(name) = read_arg(habit_name, "habit_name") else {
        return ptr::null_mut();
    };
    let Some(today) = read_arg(today, "today") else {
        return ptr::null_mut();
    };

    into_result(snapshot_habit_streak_after_update(
        &json,
        &owner,
        &name,
        &today,
        new_raw_value,
    ))
}

// ============================================================================
// Engine Handle API
// ============================================================================

/// Opaque handle to an engine over an in-memory store
pub struct PulseEngineHandle {
    engine: HabitEngine<InMemoryStore>,
}

/// Create an engine from a snapshot.
///
/// `lookback_days <= 0` selects the default history window.
///
/// # Safety
/// - `snapshot_json` must be a valid null-terminated C string.
/// - Must be freed with `pulse_engine_free`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_engine_new(
    snapshot_json: *const c_char,
    lookback_days: i32,
) -> *mut PulseEngineHandle {
    clear_last_error();

    let Some(json) = read_arg(snapshot_json, "snapshot_json") else {
        return ptr::null_mut();
    };

    let mut config = EngineConfig::default();
    if lookback_days > 0 {
        config.lookback_days = lookback_days as u32;
    }

    match InMemoryStore::from_json(&json) {
        Ok(store) => Box::into_raw(Box::new(PulseEngineHandle {
            engine: HabitEngine::with_config(store, config),
        })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a pointer returned by `pulse_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulse_engine_free(engine: *mut PulseEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Store a progress value, replacing any earlier value for the same date.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `pulse_engine_new`.
/// - String arguments must be valid null-terminated C strings.
/// - Returns 0 on success, -1 on error; call `pulse_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn pulse_engine_log_progress(
    engine: *mut PulseEngineHandle,
    owner_id: *const c_char,
    habit_name: *const c_char,
    date: *const c_char,
    raw_value: f64,
) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }
    let handle = &mut *engine;

    let Some(owner) = read_arg(owner_id, "owner_id") else {
        return -1;
    };
    let Some(name) = read_arg(habit_name, "habit_name") else {
        return -1;
    };
    let Some(date) = read_arg(date, "date") else {
        return -1;
    };

    let result = parse_day(&date)
        .and_then(|date| ProgressRecord::new(HabitId::new(owner, name), date, raw_value))
        .and_then(|record| handle.engine.store_mut().log_progress(record));
    match result {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Current and longest streak of an owner, from an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `pulse_engine_new`.
/// - String arguments must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_engine_user_streaks(
    engine: *const PulseEngineHandle,
    owner_id: *const c_char,
    today: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &*engine;

    let Some(owner) = read_arg(owner_id, "owner_id") else {
        return ptr::null_mut();
    };
    let Some(today) = read_arg(today, "today") else {
        return ptr::null_mut();
    };

    into_result(
        handle
            .engine
            .user_streaks_str(&owner, &today)
            .and_then(|result| Ok(serde_json::to_string(&result)?)),
    )
}

/// Streak shown on a habit's panel, from an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `pulse_engine_new`.
/// - String arguments must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_engine_habit_streak(
    engine: *const PulseEngineHandle,
    owner_id: *const c_char,
    habit_name: *const c_char,
    today: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &*engine;

    let Some(owner) = read_arg(owner_id, "owner_id") else {
        return ptr::null_mut();
    };
    let Some(name) = read_arg(habit_name, "habit_name") else {
        return ptr::null_mut();
    };
    let Some(today) = read_arg(today, "today") else {
        return ptr::null_mut();
    };

    let habit_id = HabitId::new(owner, name);
    let result = parse_day(&today).and_then(|date| {
        let streak = handle.engine.habit_streak(&habit_id, date)?;
        Ok(serde_json::to_string(&HabitStreak {
            habit_id: habit_id.clone(),
            date,
            streak,
        })?)
    });
    into_result(result)
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by a Pulse function.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Pulse function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulse_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Pulse call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if the last call succeeded.
#[no_mangle]
pub unsafe extern "C" fn pulse_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the Habit Pulse library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn pulse_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn sample_snapshot() -> CString {
        CString::new(
            r#"{
            "schema_version": "habit.snapshot.v1",
            "habits": [
                {"owner_id": "u1", "name": "read", "kind": "build",
                 "schedule": {"type": "interval", "days": 1},
                 "goal": {"value": 10, "unit": "pages"}, "start_date": "2023-08-10"},
                {"owner_id": "u1", "name": "smoke", "kind": "quit",
                 "schedule": {"type": "weekly", "days": ["monday"]},
                 "start_date": "2023-08-10"}
            ],
            "progress": [
                {"owner_id": "u1", "name": "read", "date": "2023-08-13", "raw_value": 10},
                {"owner_id": "u1", "name": "read", "date": "2023-08-14", "raw_value": 10},
                {"owner_id": "u1", "name": "smoke", "date": "2023-08-14", "raw_value": 1}
            ]
        }"#,
        )
        .unwrap()
    }

    unsafe fn take(result: *mut c_char) -> String {
        assert!(!result.is_null(), "unexpected error: {:?}", last_error());
        let s = CStr::from_ptr(result).to_str().unwrap().to_string();
        pulse_free_string(result);
        s
    }

    unsafe fn last_error() -> Option<String> {
        let error = pulse_last_error();
        if error.is_null() {
            None
        } else {
            Some(CStr::from_ptr(error).to_str().unwrap().to_string())
        }
    }

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    #[test]
    fn test_ffi_daily_score() {
        let snapshot = sample_snapshot();
        let (owner, date) = (c("u1"), c("2023-08-14"));

        unsafe {
            let json = take(pulse_daily_score(snapshot.as_ptr(), owner.as_ptr(), date.as_ptr()));
            assert!(json.contains("\"percentage\":100"));
            assert!(json.contains("\"habit_count\":2"));
        }
    }

    #[test]
    fn test_ffi_period_average_and_streaks() {
        let snapshot = sample_snapshot();
        let owner = c("u1");
        let (start, end) = (c("2023-08-13"), c("2023-08-15"));

        unsafe {
            let json = take(pulse_period_average(
                snapshot.as_ptr(),
                owner.as_ptr(),
                start.as_ptr(),
                end.as_ptr(),
            ));
            // 100, 100, 0
            assert!(json.contains("\"average\":67"));

            let json = take(pulse_user_streaks(snapshot.as_ptr(), owner.as_ptr(), end.as_ptr()));
            assert_eq!(json, r#"{"current":2,"longest":2}"#);
        }
    }

    #[test]
    fn test_ffi_habit_streaks() {
        let snapshot = sample_snapshot();
        let (owner, name, today) = (c("u1"), c("read"), c("2023-08-15"));

        unsafe {
            let json = take(pulse_habit_streak(
                snapshot.as_ptr(),
                owner.as_ptr(),
                name.as_ptr(),
                today.as_ptr(),
            ));
            assert!(json.contains("\"streak\":2"));

            let json = take(pulse_habit_streak_after_update(
                snapshot.as_ptr(),
                owner.as_ptr(),
                name.as_ptr(),
                today.as_ptr(),
                12.0,
            ));
            assert!(json.contains("\"streak\":3"));
            assert!(json.contains("\"name\":\"read\""));
        }
    }

    #[test]
    fn test_ffi_engine_lifecycle() {
        let snapshot = sample_snapshot();
        let (owner, name, today) = (c("u1"), c("read"), c("2023-08-15"));

        unsafe {
            let engine = pulse_engine_new(snapshot.as_ptr(), 0);
            assert!(!engine.is_null());

            let status = pulse_engine_log_progress(
                engine,
                owner.as_ptr(),
                name.as_ptr(),
                today.as_ptr(),
                10.0,
            );
            assert_eq!(status, 0);

            let json = take(pulse_engine_habit_streak(
                engine,
                owner.as_ptr(),
                name.as_ptr(),
                today.as_ptr(),
            ));
            assert!(json.contains("\"streak\":3"));

            let json = take(pulse_engine_user_streaks(engine, owner.as_ptr(), today.as_ptr()));
            assert_eq!(json, r#"{"current":3,"longest":3}"#);

            let bad = pulse_engine_log_progress(
                engine,
                owner.as_ptr(),
                name.as_ptr(),
                today.as_ptr(),
                -1.0,
            );
            assert_eq!(bad, -1);
            assert!(last_error().is_some());

            pulse_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        let invalid = c("not json");
        let (owner, date) = (c("u1"), c("2023-08-14"));

        unsafe {
            let result = pulse_daily_score(invalid.as_ptr(), owner.as_ptr(), date.as_ptr());
            assert!(result.is_null());
            assert!(last_error().is_some_and(|e| e.contains("Invalid JSON")));

            let snapshot = sample_snapshot();
            let result = pulse_daily_score(snapshot.as_ptr(), ptr::null(), date.as_ptr());
            assert!(result.is_null());
            assert_eq!(last_error().as_deref(), Some("Null owner_id pointer"));

            // a successful call clears the error
            take(pulse_daily_score(snapshot.as_ptr(), owner.as_ptr(), date.as_ptr()));
            assert!(last_error().is_none());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = pulse_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
