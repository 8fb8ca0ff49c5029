//! Total normalization functions over optional record fields.
//!
//! Nothing in this module returns an error: absent or malformed input
//! degrades to empty strings so one bad record never fails an export.

pub mod address;
pub mod diacritics;
pub mod name;

pub use address::{format_one_line, normalize, NormalizedAddress, STATE_SUFFIX_COUNTRIES};
pub use diacritics::strip_diacritics;
pub use name::split_name;

/// Owned copy of an optional field, empty when absent.
pub(crate) fn text(value: Option<&String>) -> String {
    value.cloned().unwrap_or_default()
}
