//! Connless packet construction and response classification.
//!
//! ## Wire Format
//! ```text
//! token request:  [04 00 00] [ff ff ff ff] [05] [client token(4)] [zero padding]
//! token response: [04 00 00] [client token(4)] [05] [server token(4)]
//! typed request:  [21] [server token(4)] [client token(4)] [signature(8)] [payload]
//! typed response: [21] [client token(4)] [server token(4)] [signature(8)] [payload]
//! ```

use std::fmt;

use crate::config::{
    MIN_HEADER_LENGTH, REQUEST_INFO, REQUEST_SERVER_COUNT, REQUEST_SERVER_LIST, SEND_INFO,
    SEND_SERVER_COUNT, SEND_SERVER_LIST, SIGNATURE_SIZE, TOKEN_PREFIX_SIZE, TOKEN_RESPONSE_SIZE,
};
use crate::core::varint::VarInt;
use crate::error::{BrowserError, Result};

/// Control packet flag, shifted into the first header byte
pub const PACKET_FLAG_CONTROL: u8 = 0x04;

/// Connless packet flag with protocol version 1
pub const PACKET_FLAG_CONNLESS: u8 = 0x21;

/// Control message id of a token request/response
pub const CTRL_MSG_TOKEN: u8 = 0x05;

/// Placeholder token used before the server issued one
pub const TOKEN_NONE: [u8; 4] = [0xFF; 4];

/// Data size a token request is padded to, so servers cannot be used to
/// amplify traffic
pub const TOKEN_REQUEST_DATA_SIZE: usize = 512;

const CONTROL_HEADER_SIZE: usize = 7;

/// Logical type of a received datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Token,
    ServerList,
    ServerCount,
    ServerInfo,
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketKind::Token => "token",
            PacketKind::ServerList => "serverlist",
            PacketKind::ServerCount => "servercount",
            PacketKind::ServerInfo => "serverinfo",
        };
        f.write_str(name)
    }
}

/// Requests that need a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    ServerList,
    ServerCount,
    ServerInfo,
}

impl RequestKind {
    /// The response type a server answers this request with
    pub fn response_kind(self) -> PacketKind {
        match self {
            RequestKind::ServerList => PacketKind::ServerList,
            RequestKind::ServerCount => PacketKind::ServerCount,
            RequestKind::ServerInfo => PacketKind::ServerInfo,
        }
    }

    fn signature(self) -> &'static [u8; SIGNATURE_SIZE] {
        match self {
            RequestKind::ServerList => &REQUEST_SERVER_LIST,
            RequestKind::ServerCount => &REQUEST_SERVER_COUNT,
            RequestKind::ServerInfo => &REQUEST_INFO,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.response_kind(), f)
    }
}

/// Token pair negotiated by the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    /// Chosen by us, echoed by the server
    pub client: [u8; 4],
    /// Issued by the server, required on every typed request
    pub server: [u8; 4],
}

impl Token {
    /// Browser token carried inside info requests
    pub fn browser_token(&self) -> i32 {
        i32::from_be_bytes(self.client)
    }
}

/// Pick a fresh client token
pub fn new_client_token() -> [u8; 4] {
    rand::random()
}

/// Build the token request for `client_token`
pub fn token_request(client_token: [u8; 4]) -> Vec<u8> {
    let mut packet = vec![0u8; CONTROL_HEADER_SIZE + TOKEN_REQUEST_DATA_SIZE];
    packet[0] = PACKET_FLAG_CONTROL;
    packet[3..7].copy_from_slice(&TOKEN_NONE);
    packet[7] = CTRL_MSG_TOKEN;
    packet[8..12].copy_from_slice(&client_token);
    packet
}

/// Build the typed request of `kind` authorized by `token`
pub fn request(kind: RequestKind, token: &Token) -> Vec<u8> {
    let mut packet = Vec::with_capacity(TOKEN_PREFIX_SIZE + SIGNATURE_SIZE + 5);
    packet.push(PACKET_FLAG_CONNLESS);
    packet.extend_from_slice(&token.server);
    packet.extend_from_slice(&token.client);
    packet.extend_from_slice(kind.signature());

    if kind == RequestKind::ServerInfo {
        let mut payload = VarInt::new();
        payload.pack(token.browser_token());
        packet.extend_from_slice(payload.as_bytes());
    }

    packet
}

/// Determine which response `message` is.
///
/// # Errors
/// - [`BrowserError::InvalidHeaderLength`] if the message cannot hold a header
/// - [`BrowserError::InvalidResponseMessage`] if no known signature matches
pub fn classify(message: &[u8]) -> Result<PacketKind> {
    if message.len() < MIN_HEADER_LENGTH {
        return Err(BrowserError::InvalidHeaderLength);
    }

    if message.len() == TOKEN_RESPONSE_SIZE {
        return Ok(PacketKind::Token);
    }

    let signature = message
        .get(TOKEN_PREFIX_SIZE..TOKEN_PREFIX_SIZE + SIGNATURE_SIZE)
        .ok_or(BrowserError::InvalidResponseMessage)?;

    if signature == SEND_SERVER_LIST {
        Ok(PacketKind::ServerList)
    } else if signature == SEND_SERVER_COUNT {
        Ok(PacketKind::ServerCount)
    } else if signature == SEND_INFO {
        Ok(PacketKind::ServerInfo)
    } else {
        Err(BrowserError::InvalidResponseMessage)
    }
}

/// Payload behind the header and signature of a classified typed response
pub fn payload(message: &[u8]) -> &[u8] {
    message
        .get(TOKEN_PREFIX_SIZE + SIGNATURE_SIZE..)
        .unwrap_or_default()
}
