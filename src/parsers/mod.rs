//! Text → record parsers for the three tools
//!
//! All functions here are pure. Malformed or missing fields fall back to
//! defaults instead of failing the whole parse, because the tools routinely
//! print partial output while a device or stream is changing state.

pub mod audio;
pub mod bluetooth;
pub mod network;

/// `yes`/`no` flag value, anything else is false
pub(crate) fn yes_no(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("yes")
}

/// Value after the first `:` of a `Key: value` line
pub(crate) fn field_value(line: &str) -> &str {
    line.split_once(':').map(|(_, value)| value.trim()).unwrap_or("")
}
