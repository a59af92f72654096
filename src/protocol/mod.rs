//! # Protocol Layer
//!
//! The client side of the discovery protocol.
//!
//! ## Components
//! - **Handshake**: token exchange, typed exchange and the adaptive retry loop
//! - **Message**: parsed tokens, server lists, server counts and server infos

pub mod handshake;
pub mod message;
