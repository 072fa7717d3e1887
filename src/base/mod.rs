//! Base types and error handling.
//!
//! Provides foundational types shared by every layer of the connector:
//! - [`ConnectError`]: terminal error taxonomy for a connection attempt
//! - [`ChannelConfig`]: the channel-argument snapshot threaded through
//!   connect and handshake
//! - [`Target`]: a `host:port` connection target

pub mod config;
pub mod error;
pub mod target;

pub use config::{ChannelConfig, ConfigValue};
pub use error::ConnectError;
pub use target::Target;
