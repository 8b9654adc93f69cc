// SPDX-License-Identifier: AGPL-3.0-or-later
//! C FFI exports for non-Rust hosts
//!
//! Trees cross the boundary as ADF JSON; strings returned through an out
//! pointer belong to the library and must be released with
//! `adfmd_string_free`.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use crate::traits::ConversionError;

/// Result code for FFI operations
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiResult {
    Success = 0,
    InvalidJson = 1,
    StructuralViolation = 2,
    GrammarMismatch = 3,
    NullPointer = 4,
    Utf8Error = 5,
    InteriorNul = 6,
    InvalidConfig = 7,
}

impl From<&ConversionError> for FfiResult {
    fn from(err: &ConversionError) -> Self {
        match err {
            ConversionError::Json(_) => FfiResult::InvalidJson,
            ConversionError::StructuralViolation { .. } => FfiResult::StructuralViolation,
            ConversionError::GrammarMismatch { .. } => FfiResult::GrammarMismatch,
            ConversionError::Config(_) => FfiResult::InvalidConfig,
        }
    }
}

/// Shared plumbing: read the input string, convert, hand back an owned C string
unsafe fn convert(
    input: *const c_char,
    out: *mut *mut c_char,
    f: fn(&str) -> crate::Result<String>,
) -> FfiResult {
    if input.is_null() || out.is_null() {
        return FfiResult::NullPointer;
    }

    let input = match CStr::from_ptr(input).to_str() {
        Ok(s) => s,
        Err(_) => return FfiResult::Utf8Error,
    };

    let output = match f(input) {
        Ok(s) => s,
        Err(err) => return FfiResult::from(&err),
    };

    let c_string = match CString::new(output) {
        Ok(s) => s,
        Err(_) => return FfiResult::InteriorNul,
    };
    *out = c_string.into_raw();

    FfiResult::Success
}

/// Convert ADF JSON to annotated Markdown
///
/// # Safety
/// - `json` must be a valid null-terminated UTF-8 string
/// - `out_markdown` must be a valid pointer to store the result
#[no_mangle]
pub unsafe extern "C" fn adfmd_to_markdown(
    json: *const c_char,
    out_markdown: *mut *mut c_char,
) -> FfiResult {
    convert(json, out_markdown, crate::adf_json_to_markdown)
}

/// Convert annotated Markdown to ADF JSON
///
/// # Safety
/// - `markdown` must be a valid null-terminated UTF-8 string
/// - `out_json` must be a valid pointer to store the result
#[no_mangle]
pub unsafe extern "C" fn adfmd_from_markdown(
    markdown: *const c_char,
    out_json: *mut *mut c_char,
) -> FfiResult {
    convert(markdown, out_json, crate::markdown_to_adf_json)
}

/// Free a string allocated by the library
///
/// # Safety
/// - `s` must be a valid string from this library or null
#[no_mangle]
pub unsafe extern "C" fn adfmd_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Get library version
///
/// Returns a static string, do not free
#[no_mangle]
pub extern "C" fn adfmd_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
