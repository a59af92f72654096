//! # Error Types
//!
//! Error handling for the server browser.
//!
//! This module defines all error variants that can occur while encoding
//! protocol fields, talking to master and game servers, and loading
//! configuration.
//!
//! ## Error Categories
//! - **I/O Errors**: socket and address resolution failures
//! - **Codec Errors**: empty or truncated varint buffers
//! - **Protocol Errors**: short writes, malformed or unexpected responses, timeouts
//! - **Input Errors**: malformed target addresses supplied by the caller
//! - **Configuration Errors**: unreadable or invalid configuration
//!
//! Only short writes are fatal to an exchange; read failures and mismatches
//! are retried by the handshake engine until its time budget runs out.
//!
//! ## Example Usage
//! ```rust
//! use server_browser::core::varint::VarInt;
//! use server_browser::error::{BrowserError, Result};
//!
//! fn first_field(bytes: &[u8]) -> Result<i32> {
//!     let mut buffer = VarInt::from_bytes(bytes);
//!     buffer.unpack()
//! }
//!
//! assert!(matches!(first_field(&[]), Err(BrowserError::NoDataToUnpack)));
//! assert_eq!(first_field(&[0x01]).ok(), Some(1));
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Codec errors
    pub const ERR_NO_DATA: &str = "no data to unpack";
    pub const ERR_TRUNCATED_VARINT: &str = "varint continues past the end of the buffer";
    pub const ERR_UNTERMINATED_STRING: &str = "string is not NUL terminated";

    /// Exchange errors
    pub const ERR_INVALID_WRITE: &str = "invalid write: datagram was not fully sent";
    pub const ERR_INVALID_RESPONSE: &str = "invalid response message";
    pub const ERR_INVALID_HEADER_LENGTH: &str = "response header is too short";
    pub const ERR_MISMATCH: &str = "response type does not match request type";
    pub const ERR_TIMEOUT: &str = "exchange timed out";

    /// Input validation errors
    pub const ERR_INVALID_IP: &str = "invalid ip address";
    pub const ERR_INVALID_PORT: &str = "invalid port, expected 0..=65535";
}

/// Primary error type for all browser operations
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("no data to unpack")]
    NoDataToUnpack,

    #[error("varint continues past the end of the buffer")]
    TruncatedVarInt,

    #[error("string is not NUL terminated")]
    UnterminatedString,

    #[error("invalid write: datagram was not fully sent")]
    InvalidWrite,

    #[error("invalid response message")]
    InvalidResponseMessage,

    #[error("response header is too short")]
    InvalidHeaderLength,

    #[error("response type does not match request type")]
    RequestResponseMismatch,

    #[error("exchange timed out")]
    Timeout,

    #[error("invalid ip address: {0}")]
    InvalidIp(String),

    #[error("invalid port {0}, expected 0..=65535")]
    InvalidPort(i64),

    #[error("invalid token response")]
    InvalidToken,

    #[error("invalid server list: {0}")]
    InvalidServerList(String),

    #[error("invalid server info: {0}")]
    InvalidServerInfo(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using BrowserError
pub type Result<T> = std::result::Result<T, BrowserError>;
