//! # parlor-core
//!
//! Foundation types for the Parlor chat relay:
//!
//! - [`ids::ConnectionId`]: opaque, time-ordered identity of a live connection
//! - [`protocol`]: typed inbound [`Command`]s and outbound [`Response`]s with
//!   their JSON wire codec
//! - [`names`]: server-side display name rules
//! - [`errors`]: error taxonomy shared by the relay and transport crates
//! - [`logging`]: `tracing` subscriber initialisation

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod names;
pub mod protocol;

pub use errors::{DecodeError, ErrorKind, NameError, RegistryError, SendError};
pub use ids::ConnectionId;
pub use protocol::{Command, CommandType, Response, ResponseType};
