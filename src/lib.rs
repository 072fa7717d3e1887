//! # rpcnet
//!
//! A gRPC-core-inspired RPC channel connector library for Rust.
//!
//! `rpcnet` turns a resolved network address into a ready-to-use,
//! multiplexed RPC transport: an asynchronous raw connect, an optional
//! preamble byte write, a chained handshake pipeline (proxy tunneling,
//! transport security), and HTTP/2 transport construction, reported back
//! through a single completion callback per attempt.
//!
//! ## Guarantees
//!
//! - **One attempt at a time**: a connector drives exactly one connection
//!   attempt per `start`; a second concurrent `start` is a fatal contract
//!   violation
//! - **Exactly-once completion**: every attempt ends in exactly one
//!   callback invocation, on the shared execution context
//! - **No internal retry**: terminal failures propagate to the caller,
//!   who owns retry and backoff policy
//! - **Usable handles only**: channel creation degrades to a lame channel
//!   instead of returning an invalid handle
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rpcnet::channel::{ChannelFactory, ChannelFactoryConfig};
//! use rpcnet::base::ChannelConfig;
//! use std::time::Duration;
//! use tokio::time::Instant;
//!
//! #[tokio::main]
//! async fn main() {
//!     let factory = ChannelFactory::new(ChannelFactoryConfig::default());
//!     let channel = factory.create_plaintext_channel("svc.local:50051", ChannelConfig::new());
//!     let deadline = Instant::now() + Duration::from_secs(20);
//!     match channel.connect_once(deadline).await {
//!         Ok(result) => println!("connected: {:?}", result.config),
//!         Err(e) => println!("connect failed: {e}"),
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Core types and error definitions
//! - [`exec`] - Deferred, ordered completion-callback delivery
//! - [`socket`] - Raw connect, endpoints, and proxy settings
//! - [`handshake`] - Chained negotiation pipeline and HTTP CONNECT
//! - [`transport`] - HTTP/2 transport construction and read-ahead replay
//! - [`connector`] - The one-attempt-at-a-time connection state machine
//! - [`channel`] - Factory glue and the lame-channel fallback

pub mod base;
pub mod channel;
pub mod connector;
pub mod exec;
pub mod handshake;
pub mod socket;
pub mod transport;

pub use base::{ChannelConfig, ConnectError, Target};
pub use channel::{Channel, ChannelFactory, ChannelFactoryConfig};
pub use connector::{ConnectArgs, ConnectResult, Connector};
