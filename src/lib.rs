//! # Server Browser
//!
//! Client for the Teeworlds 0.7 connectionless UDP protocol: asks master
//! servers for the addresses of registered game servers, then asks every
//! game server for its info.
//!
//! ## Layers
//! - **core**: VarInt codec, packet builders and the response classifier
//! - **transport**: datagram transport trait and its UDP implementation
//! - **protocol**: token handshake, retry engine and response parsers
//! - **service**: the [`Browser`] and its two-level fan-out
//!
//! ```no_run
//! use server_browser::Browser;
//!
//! # async fn run() {
//! let browser = Browser::default();
//! for server in browser.server_infos().await {
//!     println!("{} {}", server.address, server.name);
//! }
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::config::BrowserConfig;
pub use crate::core::packet::{PacketKind, RequestKind};
pub use crate::core::varint::VarInt;
pub use crate::error::{BrowserError, Result};
pub use crate::protocol::handshake::RetryPolicy;
pub use crate::protocol::message::{ClientInfo, ServerInfo};
pub use crate::service::Browser;
pub use crate::transport::{Transport, UdpTransport};
