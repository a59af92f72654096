//! # Core Protocol Components
//!
//! Low-level field encoding, packet construction and response
//! classification.
//!
//! ## Components
//! - **VarInt**: variable-length signed integers and NUL-terminated strings
//! - **Packet**: token and typed requests, response classification
//!
//! ## Wire Format
//! ```text
//! [Flags(1)] [Token(4)] [Response Token(4)] [Signature(8)] [Payload(N)]
//! ```
//!
//! Classification only looks at the length and the signature; payload
//! validation is left to the parsers in `protocol::message`.

pub mod packet;
pub mod varint;
