//! Display name rules enforced by the server.
//!
//! A name is valid iff its length in characters is strictly greater than 3
//! and strictly less than 25. The browser client checks `3..=25` before
//! sending; the server bound is the authoritative one.

use crate::errors::NameError;

/// Shortest accepted name, in characters.
pub const MIN_NAME_LEN: usize = 4;

/// Longest accepted name, in characters.
pub const MAX_NAME_LEN: usize = 24;

/// Text of the `Error` response sent when a name is rejected.
pub const INVALID_NAME_MESSAGE: &str = "Name is of incorrect length.";

/// Check a candidate display name.
pub fn validate_name(name: &str) -> Result<(), NameError> {
    let len = name.chars().count();
    if (MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        Ok(())
    } else {
        Err(NameError::Length { len })
    }
}

/// Boolean form of [`validate_name`].
pub fn is_valid_name(name: &str) -> bool {
    validate_name(name).is_ok()
}
