//! # parlor-relay
//!
//! Transport-agnostic core of the Parlor chat relay.
//!
//! - [`transport`]: the capability interface a socket adapter drives
//! - [`registry`]: synchronized store of live sessions
//! - [`handlers`]: per-command decision logic
//! - [`broadcast`]: fan-out of encoded responses
//! - [`service`]: [`ChatService`], wiring the above behind [`ConnectionEvents`]

#![deny(unsafe_code)]

pub mod broadcast;
pub mod handlers;
pub mod registry;
pub mod service;
pub mod transport;

pub use broadcast::{Broadcaster, DeliveryReport, Outgoing, Target};
pub use handlers::CommandHandlers;
pub use registry::{Session, SessionRegistry};
pub use service::ChatService;
pub use transport::{ConnectionEvents, FrameSink};
