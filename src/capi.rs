//! C boundary of the bridge.
//!
//! Exported symbols give host runtimes a handle-based view of [`Predictor`]:
//! construction, forward passes, geometry accessors, and profile control.
//! Every call tolerates a null handle. Report strings cross the boundary as
//! heap `CString`s and come back through [`netbridge_free_string`].
//!
//! Failures of fallible calls leave a message readable through
//! [`netbridge_last_error`] on the calling thread.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_float, c_int};
use std::path::Path;
use std::ptr;
use std::slice;

use log::error;

use crate::execution::mode::{self, ExecutionMode};
use crate::predictor::Predictor;
use crate::profile::Profile;

/// Opaque handle passed across the C boundary
pub type PredictorHandle = *mut Predictor;

pub const MODE_CPU: c_int = 0;
pub const MODE_GPU: c_int = 1;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = RefCell::new(None);
}

fn record_error(message: String) {
    error!("{}", message);
    let cstring = CString::new(message).unwrap_or_default();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(cstring));
}

fn clear_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

fn mode_from_c(mode: c_int) -> ExecutionMode {
    if mode == MODE_GPU {
        ExecutionMode::Gpu
    } else {
        ExecutionMode::Cpu
    }
}

/// Build a predictor from a definition file and a weights file.
///
/// `batch` overrides the batch dimension declared in the definition. `mode`
/// requests the process execution mode; the first request in the process
/// wins. Returns null on failure and records a message for
/// [`netbridge_last_error`].
///
/// # Safety
/// `model_path` and `weights_path` must be null or valid NUL-terminated
/// strings.
#[no_mangle]
pub unsafe extern "C" fn netbridge_new(
    model_path: *const c_char,
    weights_path: *const c_char,
    batch: c_int,
    mode: c_int,
) -> PredictorHandle {
    clear_error();

    if model_path.is_null() || weights_path.is_null() {
        record_error("netbridge_new called with a null path".to_string());
        return ptr::null_mut();
    }
    if batch < 1 {
        record_error(format!("netbridge_new called with batch {}", batch));
        return ptr::null_mut();
    }

    let model_path = match CStr::from_ptr(model_path).to_str() {
        Ok(s) => s,
        Err(_) => {
            record_error("Model path is not valid UTF-8".to_string());
            return ptr::null_mut();
        }
    };
    let weights_path = match CStr::from_ptr(weights_path).to_str() {
        Ok(s) => s,
        Err(_) => {
            record_error("Weights path is not valid UTF-8".to_string());
            return ptr::null_mut();
        }
    };

    mode::set_global_mode(mode_from_c(mode));

    match Predictor::from_files_with_batch(
        Path::new(model_path),
        Path::new(weights_path),
        batch as usize,
    ) {
        Ok(predictor) => Box::into_raw(Box::new(predictor)),
        Err(e) => {
            record_error(e.to_string());
            ptr::null_mut()
        }
    }
}

/// Destroy a predictor. A null handle is a no-op.
///
/// # Safety
/// `handle` must be null or a live pointer from [`netbridge_new`], and must
/// not be used after this call.
#[no_mangle]
pub unsafe extern "C" fn netbridge_delete(handle: PredictorHandle) {
    if handle.is_null() {
        return;
    }
    drop(Box::from_raw(handle));
}

/// Request the process-wide execution mode. The first request wins.
#[no_mangle]
pub extern "C" fn netbridge_set_mode(mode: c_int) {
    mode::set_global_mode(mode_from_c(mode));
}

/// One-time library initialization hook.
///
/// Kept for hosts that pair every load with an init call. Process logging
/// stays host-owned, so there is nothing to set up here.
#[no_mangle]
pub extern "C" fn netbridge_init() {}

/// Begin a profiling session on the predictor.
///
/// Null `name` or `metadata` read as empty strings.
///
/// # Safety
/// `handle` must be null or a live pointer from [`netbridge_new`]. `name`
/// and `metadata` must be null or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn netbridge_start_profiling(
    handle: PredictorHandle,
    name: *const c_char,
    metadata: *const c_char,
) {
    let predictor = match handle.as_mut() {
        Some(p) => p,
        None => return,
    };
    let name = if name.is_null() {
        String::new()
    } else {
        CStr::from_ptr(name).to_string_lossy().into_owned()
    };
    let metadata = if metadata.is_null() {
        String::new()
    } else {
        CStr::from_ptr(metadata).to_string_lossy().into_owned()
    };
    predictor.start_profiling(&name, &metadata);
}

/// Stamp the end time of the running profiling session.
///
/// # Safety
/// `handle` must be null or a live pointer from [`netbridge_new`].
#[no_mangle]
pub unsafe extern "C" fn netbridge_end_profiling(handle: PredictorHandle) {
    if let Some(predictor) = handle.as_mut() {
        predictor.end_profiling();
    }
}

/// Clear the recorded entries of the running profiling session.
///
/// # Safety
/// `handle` must be null or a live pointer from [`netbridge_new`].
#[no_mangle]
pub unsafe extern "C" fn netbridge_disable_profiling(handle: PredictorHandle) {
    if let Some(predictor) = handle.as_mut() {
        predictor.disable_profiling();
    }
}

/// Serialized JSON report of the running profiling session.
///
/// Always returns a parseable report; with a null handle or no session it
/// is the canonical empty report. The caller owns the returned string and
/// releases it through [`netbridge_free_string`].
///
/// # Safety
/// `handle` must be null or a live pointer from [`netbridge_new`].
#[no_mangle]
pub unsafe extern "C" fn netbridge_read_profile(handle: PredictorHandle) -> *mut c_char {
    let report = match handle.as_ref() {
        Some(predictor) => predictor
            .read_profile()
            .unwrap_or_else(|_| Profile::empty_report()),
        None => Profile::empty_report(),
    };
    CString::new(report)
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut())
}

/// Release a string returned by this library. A null pointer is a no-op.
///
/// # Safety
/// `s` must be null or a pointer obtained from [`netbridge_read_profile`],
/// and must not be used after this call.
#[no_mangle]
pub unsafe extern "C" fn netbridge_free_string(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    drop(CString::from_raw(s));
}

/// Run one forward pass over a full batch of input data.
///
/// `input` must hold `batch * channels * height * width` floats in NCHW
/// order. Returns 0 on success, -1 on failure with a message recorded for
/// [`netbridge_last_error`].
///
/// # Safety
/// `handle` must be null or a live pointer from [`netbridge_new`]. `input`
/// must be null or point to at least the full batch of floats.
#[no_mangle]
pub unsafe extern "C" fn netbridge_predict(
    handle: PredictorHandle,
    input: *const c_float,
) -> c_int {
    clear_error();

    let predictor = match handle.as_mut() {
        Some(p) => p,
        None => {
            record_error("netbridge_predict called with a null handle".to_string());
            return -1;
        }
    };
    if input.is_null() {
        record_error("netbridge_predict called with a null input".to_string());
        return -1;
    }

    let len = predictor.batch() * predictor.instance_len();
    let data = slice::from_raw_parts(input, len);
    match predictor.predict(data) {
        Ok(_) => 0,
        Err(e) => {
            record_error(e.to_string());
            -1
        }
    }
}

/// Borrowed view of the most recent predictions.
///
/// Points at `batch * pred_len` floats and stays valid until the next
/// predict or delete on this handle. Null before the first successful
/// predict or with a null handle.
///
/// # Safety
/// `handle` must be null or a live pointer from [`netbridge_new`].
#[no_mangle]
pub unsafe extern "C" fn netbridge_get_predictions(handle: PredictorHandle) -> *const c_float {
    match handle.as_ref() {
        Some(predictor) => match predictor.last_output() {
            Some(output) => output.as_ptr(),
            None => ptr::null(),
        },
        None => ptr::null(),
    }
}

/// Input blob width, 0 with a null handle.
///
/// # Safety
/// `handle` must be null or a live pointer from [`netbridge_new`].
#[no_mangle]
pub unsafe extern "C" fn netbridge_width(handle: PredictorHandle) -> c_int {
    match handle.as_ref() {
        Some(predictor) => predictor.width() as c_int,
        None => 0,
    }
}

/// Input blob height, 0 with a null handle.
///
/// # Safety
/// `handle` must be null or a live pointer from [`netbridge_new`].
#[no_mangle]
pub unsafe extern "C" fn netbridge_height(handle: PredictorHandle) -> c_int {
    match handle.as_ref() {
        Some(predictor) => predictor.height() as c_int,
        None => 0,
    }
}

/// Input blob channels, 0 with a null handle.
///
/// # Safety
/// `handle` must be null or a live pointer from [`netbridge_new`].
#[no_mangle]
pub unsafe extern "C" fn netbridge_channels(handle: PredictorHandle) -> c_int {
    match handle.as_ref() {
        Some(predictor) => predictor.channels() as c_int,
        None => 0,
    }
}

/// Output values per instance, 0 with a null handle.
///
/// # Safety
/// `handle` must be null or a live pointer from [`netbridge_new`].
#[no_mangle]
pub unsafe extern "C" fn netbridge_pred_len(handle: PredictorHandle) -> c_int {
    match handle.as_ref() {
        Some(predictor) => predictor.pred_len() as c_int,
        None => 0,
    }
}

/// Message of the most recent failed call on this thread, or null.
///
/// The pointer stays valid until the next fallible call on the same thread.
#[no_mangle]
pub extern "C" fn netbridge_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| match slot.borrow().as_ref() {
        Some(message) => message.as_ptr(),
        None => ptr::null(),
    })
}
