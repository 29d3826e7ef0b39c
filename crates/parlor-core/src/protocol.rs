//! Wire protocol between browser clients and the relay.
//!
//! Inbound frames are JSON objects `{"Type": <int>, "Name"?: <str>, "Message"?: <str>}`
//! decoded into a [`Command`]. Outbound frames are `{"Type": <int>, "Data": {...}}`
//! encoded from a [`Response`]. Command and response tags use separate
//! numbering and must stay fixed for client compatibility. Payload field names
//! (`Name`, `Message`, `Users`) are case-sensitive.

use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::errors::DecodeError;

/// Inbound command tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandType {
    /// Set the display name for the first time.
    Register = 0,
    /// Chat text.
    Message = 1,
    /// Replace the display name.
    NameChange = 2,
}

impl CommandType {
    /// Numeric wire tag.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Look up a command type by wire tag.
    pub fn from_tag(tag: i64) -> Option<Self> {
        match tag {
            0 => Some(Self::Register),
            1 => Some(Self::Message),
            2 => Some(Self::NameChange),
            _ => None,
        }
    }
}

/// Outbound response tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseType {
    /// A user registered.
    Connection = 0,
    /// A named user left.
    Disconnect = 1,
    /// Chat text from a user.
    Message = 2,
    /// A user renamed themselves.
    NameChange = 3,
    /// Roster of registered names.
    UserCount = 4,
    /// Something the sender did was rejected.
    Error = 255,
}

impl ResponseType {
    /// Numeric wire tag.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Look up a response type by wire tag.
    pub fn from_tag(tag: i64) -> Option<Self> {
        match tag {
            0 => Some(Self::Connection),
            1 => Some(Self::Disconnect),
            2 => Some(Self::Message),
            3 => Some(Self::NameChange),
            4 => Some(Self::UserCount),
            255 => Some(Self::Error),
            _ => None,
        }
    }
}

/// A decoded inbound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `Type: 0` with `Name`.
    Register {
        /// Requested display name (not yet validated).
        name: String,
    },
    /// `Type: 1` with `Message`.
    Message {
        /// Chat text, forwarded verbatim.
        text: String,
    },
    /// `Type: 2` with `Name`.
    Rename {
        /// Requested new display name (not yet validated).
        new_name: String,
    },
}

impl Command {
    /// Wire tag of this command.
    pub fn command_type(&self) -> CommandType {
        match self {
            Self::Register { .. } => CommandType::Register,
            Self::Message { .. } => CommandType::Message,
            Self::Rename { .. } => CommandType::NameChange,
        }
    }

    /// Parse an inbound text frame.
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(frame)?;
        let Value::Object(map) = value else {
            return Err(DecodeError::NotAnObject);
        };

        let tag = integer_field(&map, "Type")?;
        match CommandType::from_tag(tag) {
            Some(CommandType::Register) => Ok(Self::Register {
                name: string_field(&map, "Name")?,
            }),
            Some(CommandType::Message) => Ok(Self::Message {
                text: string_field(&map, "Message")?,
            }),
            Some(CommandType::NameChange) => Ok(Self::Rename {
                new_name: string_field(&map, "Name")?,
            }),
            None => Err(DecodeError::UnknownType(tag)),
        }
    }

    /// Serialize as a client would send it.
    pub fn encode(&self) -> String {
        let value = match self {
            Self::Register { name } => {
                serde_json::json!({ "Type": CommandType::Register.tag(), "Name": name })
            }
            Self::Message { text } => {
                serde_json::json!({ "Type": CommandType::Message.tag(), "Message": text })
            }
            Self::Rename { new_name } => {
                serde_json::json!({ "Type": CommandType::NameChange.tag(), "Name": new_name })
            }
        };
        value.to_string()
    }
}

fn integer_field(map: &Map<String, Value>, field: &'static str) -> Result<i64, DecodeError> {
    match map.get(field) {
        None | Some(Value::Null) => Err(DecodeError::MissingField(field)),
        Some(v) => v
            .as_i64()
            .or_else(|| v.as_f64().and_then(integral_float))
            .ok_or(DecodeError::NotAnInteger(field)),
    }
}

/// `1.0` counts as `1`; `1.5` does not.
#[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
fn integral_float(f: f64) -> Option<i64> {
    const EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
    (f.trunc() == f && f.abs() <= EXACT).then_some(f as i64)
}

fn string_field(map: &Map<String, Value>, field: &'static str) -> Result<String, DecodeError> {
    match map.get(field) {
        None | Some(Value::Null) => Err(DecodeError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(DecodeError::NotAString(field)),
    }
}

/// An outbound message, one payload shape per tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// `{Name}`: a user registered.
    Connection {
        /// Registered name.
        name: String,
    },
    /// `{Name}`: a named user left.
    Disconnect {
        /// Name of the departed user.
        name: String,
    },
    /// `{Name, Message}`: chat text. `name` is empty for anonymous senders.
    Message {
        /// Sender's display name.
        name: String,
        /// Chat text.
        message: String,
    },
    /// `{Message}`: pre-formatted rename notice.
    NameChange {
        /// Human-readable notice.
        message: String,
    },
    /// `{Users}`: registered names in registration order.
    UserCount {
        /// Roster.
        users: Vec<String>,
    },
    /// `{Message}`: error for the sender only.
    Error {
        /// Human-readable error.
        message: String,
    },
}

#[derive(Serialize, Deserialize)]
struct NameData<S> {
    #[serde(rename = "Name")]
    name: S,
}

#[derive(Serialize, Deserialize)]
struct MessageData<S> {
    #[serde(rename = "Message")]
    message: S,
}

#[derive(Serialize, Deserialize)]
struct ChatData<S> {
    #[serde(rename = "Name")]
    name: S,
    #[serde(rename = "Message")]
    message: S,
}

#[derive(Serialize, Deserialize)]
struct UsersData<L> {
    #[serde(rename = "Users")]
    users: L,
}

impl Response {
    /// A user registered under `name`.
    pub fn connection(name: impl Into<String>) -> Self {
        Self::Connection { name: name.into() }
    }

    /// A named user left.
    pub fn disconnect(name: impl Into<String>) -> Self {
        Self::Disconnect { name: name.into() }
    }

    /// Chat text from `name`.
    pub fn message(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Message {
            name: name.into(),
            message: message.into(),
        }
    }

    /// `"{old} is now known as {new}"`.
    pub fn name_change(old_name: &str, new_name: &str) -> Self {
        Self::NameChange {
            message: format!("{old_name} is now known as {new_name}"),
        }
    }

    /// Roster of registered names.
    pub fn user_count(users: Vec<String>) -> Self {
        Self::UserCount { users }
    }

    /// Error for the sender.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Wire tag of this response.
    pub fn response_type(&self) -> ResponseType {
        match self {
            Self::Connection { .. } => ResponseType::Connection,
            Self::Disconnect { .. } => ResponseType::Disconnect,
            Self::Message { .. } => ResponseType::Message,
            Self::NameChange { .. } => ResponseType::NameChange,
            Self::UserCount { .. } => ResponseType::UserCount,
            Self::Error { .. } => ResponseType::Error,
        }
    }

    /// Serialize into an outbound text frame.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize response");
            String::new()
        })
    }

    /// Parse an outbound frame back into a response (client side).
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(frame)?;
        let Value::Object(mut map) = value else {
            return Err(DecodeError::NotAnObject);
        };

        let tag = integer_field(&map, "Type")?;
        let data = map.remove("Data").ok_or(DecodeError::MissingField("Data"))?;
        let response = match ResponseType::from_tag(tag) {
            Some(ResponseType::Connection) => Self::Connection {
                name: payload::<NameData<String>>(data)?.name,
            },
            Some(ResponseType::Disconnect) => Self::Disconnect {
                name: payload::<NameData<String>>(data)?.name,
            },
            Some(ResponseType::Message) => {
                let d = payload::<ChatData<String>>(data)?;
                Self::Message {
                    name: d.name,
                    message: d.message,
                }
            }
            Some(ResponseType::NameChange) => Self::NameChange {
                message: payload::<MessageData<String>>(data)?.message,
            },
            Some(ResponseType::UserCount) => Self::UserCount {
                users: payload::<UsersData<Vec<String>>>(data)?.users,
            },
            Some(ResponseType::Error) => Self::Error {
                message: payload::<MessageData<String>>(data)?.message,
            },
            None => return Err(DecodeError::UnknownType(tag)),
        };
        Ok(response)
    }
}

fn payload<T: DeserializeOwned>(data: Value) -> Result<T, DecodeError> {
    Ok(serde_json::from_value(data)?)
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut envelope = serializer.serialize_struct("Response", 2)?;
        envelope.serialize_field("Type", &self.response_type().tag())?;
        match self {
            Self::Connection { name } | Self::Disconnect { name } => {
                envelope.serialize_field("Data", &NameData { name: name.as_str() })?;
            }
            Self::Message { name, message } => {
                envelope.serialize_field(
                    "Data",
                    &ChatData {
                        name: name.as_str(),
                        message: message.as_str(),
                    },
                )?;
            }
            Self::NameChange { message } | Self::Error { message } => {
                envelope.serialize_field(
                    "Data",
                    &MessageData {
                        message: message.as_str(),
                    },
                )?;
            }
            Self::UserCount { users } => {
                envelope.serialize_field("Data", &UsersData { users })?;
            }
        }
        envelope.end()
    }
}
