// src/translate.rs
//
// Engine return conventions → host results.
//
// The engine reports failure in-band: FLUID_FAILED for status codes, -1 for
// ids, null for objects. Each function here maps one convention; callers
// then hand `None` to Lua as `nil`.

use std::ffi::{CStr, c_char, c_int};
use std::ptr::NonNull;

use crate::engine::{FLUID_OK, SeqId};

/// Status code: success is `Some(())`.
///
/// Only FLUID_OK counts as success; any other value is a failure.
pub fn status(code: c_int) -> Option<()> {
    (code == FLUID_OK).then_some(())
}

/// Id or count where every negative value means failure.
pub fn id(value: c_int) -> Option<c_int> {
    (value >= 0).then_some(value)
}

pub fn seq_id(value: SeqId) -> Option<SeqId> {
    (value >= 0).then_some(value)
}

pub fn object<T>(ptr: *mut T) -> Option<NonNull<T>> {
    NonNull::new(ptr)
}

/// Enumerated result with one reserved failure value (e.g. FLUID_NO_TYPE).
pub fn enumerated(code: c_int, failed: c_int) -> Option<c_int> {
    (code != failed).then_some(code)
}

/// Value whose full range is meaningful, including negatives.
pub fn signed(value: c_int) -> c_int {
    value
}

/// Boolean-valued int: any non-zero is true.
pub fn flag(value: c_int) -> bool {
    value != 0
}

/// Borrowed C string, copied out. Null means "none".
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string valid for the
/// duration of the call.
pub unsafe fn string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let text = unsafe { CStr::from_ptr(ptr) };
    Some(text.to_string_lossy().into_owned())
}

/// Value written through an out-parameter, kept only if the call succeeded.
pub fn out_param<T>(code: c_int, value: T) -> Option<T> {
    status(code).map(|()| value)
}
