//! Error taxonomy for the chat relay.
//!
//! - [`DecodeError`]: an inbound frame is not a valid command (malformed input)
//! - [`NameError`]: a display name violates the length rule
//! - [`RegistryError`]: a lifecycle event references a bad connection identity
//! - [`SendError`]: a single connection could not accept an outbound frame
//!
//! None of these are fatal. The relay answers the first two with an `Error`
//! response to the sender, swallows unknown connections, and logs send
//! failures per target.

use thiserror::Error;

use crate::ids::ConnectionId;

/// Coarse classification used as a structured log field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Frame not parseable or missing a required field.
    MalformedInput,
    /// Name length outside the accepted bounds.
    InvalidName,
    /// Event for a connection that is not in the registry.
    UnknownConnection,
    /// Connect event for an identity that is already registered.
    DuplicateConnection,
    /// Outbound frame could not be handed to a connection.
    SendFailure,
}

impl ErrorKind {
    /// Stable `snake_case` label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MalformedInput => "malformed_input",
            Self::InvalidName => "invalid_name",
            Self::UnknownConnection => "unknown_connection",
            Self::DuplicateConnection => "duplicate_connection",
            Self::SendFailure => "send_failure",
        }
    }
}

/// An inbound frame could not be turned into a command.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame is not valid JSON, or a payload has the wrong shape.
    #[error("Invalid frame: {0}")]
    Json(#[from] serde_json::Error),
    /// The frame is JSON but not an object.
    #[error("Frame must be a JSON object")]
    NotAnObject,
    /// A required field is absent or null.
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),
    /// A field that must be an integer is not one.
    #[error("Field '{0}' must be an integer")]
    NotAnInteger(&'static str),
    /// A field that must be a string is not one.
    #[error("Field '{0}' must be a string")]
    NotAString(&'static str),
    /// `Type` is an integer that names no known message.
    #[error("Unknown message type {0}")]
    UnknownType(i64),
}

impl DecodeError {
    /// Classification for logging.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::MalformedInput
    }
}

/// A display name was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    /// Name length (in characters) is outside the accepted range.
    #[error("Name is of incorrect length.")]
    Length {
        /// Observed length in characters.
        len: usize,
    },
}

impl NameError {
    /// Classification for logging.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidName
    }
}

/// Registry mutation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A session with this identity already exists.
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),
    /// No session with this identity exists.
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),
}

impl RegistryError {
    /// Classification for logging.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateConnection(_) => ErrorKind::DuplicateConnection,
            Self::UnknownConnection(_) => ErrorKind::UnknownConnection,
        }
    }
}

/// A frame could not be handed off to one connection.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The connection's outbound side has gone away.
    #[error("connection closed")]
    Closed,
    /// The connection's outbound queue is full.
    #[error("outbound queue full")]
    Full,
}

impl SendError {
    /// Classification for logging.
    pub fn kind(self) -> ErrorKind {
        ErrorKind::SendFailure
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_json_error_display() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err = DecodeError::from(json_err);
        assert!(err.to_string().starts_with("Invalid frame:"));
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn unknown_type_display() {
        assert_eq!(
            DecodeError::UnknownType(9).to_string(),
            "Unknown message type 9"
        );
    }

    #[test]
    fn missing_field_display() {
        assert_eq!(
            DecodeError::MissingField("Name").to_string(),
            "Missing required field 'Name'"
        );
    }

    #[test]
    fn name_error_matches_client_message() {
        let err = NameError::Length { len: 2 };
        assert_eq!(err.to_string(), "Name is of incorrect length.");
        assert_eq!(err.kind(), ErrorKind::InvalidName);
    }

    #[test]
    fn registry_error_kinds() {
        let dup = RegistryError::DuplicateConnection("c1".into());
        let unknown = RegistryError::UnknownConnection("c2".into());
        assert_eq!(dup.kind(), ErrorKind::DuplicateConnection);
        assert_eq!(unknown.kind(), ErrorKind::UnknownConnection);
        assert_eq!(dup.to_string(), "connection c1 is already registered");
    }

    #[test]
    fn kind_labels_are_snake_case() {
        assert_eq!(ErrorKind::SendFailure.as_str(), "send_failure");
        assert_eq!(SendError::Full.kind().as_str(), "send_failure");
        assert_eq!(ErrorKind::MalformedInput.as_str(), "malformed_input");
    }
}
