//! Parsed responses: tokens, server lists, server counts and server infos.

use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::config::TOKEN_RESPONSE_SIZE;
use crate::core::packet::{self, PacketKind, Token, CTRL_MSG_TOKEN, PACKET_FLAG_CONTROL};
use crate::core::varint::VarInt;
use crate::error::{BrowserError, Result};

/// Size of one server list entry: IPv6 address (16) + big endian port (2)
pub const SERVER_LIST_ENTRY_SIZE: usize = 18;

/// Upper bound on clients a server may report
pub const MAX_CLIENTS: i32 = 64;

/// One client connected to a game server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub clan: String,
    pub country: i32,
    pub score: i32,
    /// Playing rather than spectating
    pub is_player: bool,
}

/// Status record a game server reports about itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Where the info was fetched from, the identity of the server
    pub address: SocketAddr,
    pub version: String,
    pub name: String,
    pub hostname: String,
    pub map: String,
    pub game_type: String,
    pub flags: i32,
    pub skill_level: i32,
    pub num_players: i32,
    pub max_players: i32,
    pub num_clients: i32,
    pub max_clients: i32,
    pub clients: Vec<ClientInfo>,
}

impl ServerInfo {
    /// Server requires a password to join
    pub fn is_passworded(&self) -> bool {
        self.flags & 0x01 != 0
    }
}

/// Extract the token pair from a token response
pub fn parse_token(response: &[u8]) -> Result<Token> {
    if response.len() != TOKEN_RESPONSE_SIZE
        || response[0] != PACKET_FLAG_CONTROL
        || response[7] != CTRL_MSG_TOKEN
    {
        return Err(BrowserError::InvalidToken);
    }

    let mut client = [0u8; 4];
    let mut server = [0u8; 4];
    client.copy_from_slice(&response[3..7]);
    server.copy_from_slice(&response[8..12]);

    Ok(Token { client, server })
}

/// Extract the game-server addresses from a server list response
pub fn parse_server_list(response: &[u8]) -> Result<Vec<SocketAddr>> {
    expect_kind(response, PacketKind::ServerList)
        .map_err(|e| BrowserError::InvalidServerList(e.to_string()))?;

    let entries = packet::payload(response);
    if entries.len() % SERVER_LIST_ENTRY_SIZE != 0 {
        return Err(BrowserError::InvalidServerList(format!(
            "payload of {} bytes is not a multiple of {SERVER_LIST_ENTRY_SIZE}",
            entries.len()
        )));
    }

    let servers = entries
        .chunks_exact(SERVER_LIST_ENTRY_SIZE)
        .map(|entry| {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&entry[..16]);
            let ip = Ipv6Addr::from(octets);
            let ip = match ip.to_ipv4_mapped() {
                Some(v4) => IpAddr::V4(v4),
                None => IpAddr::V6(ip),
            };
            let port = u16::from_be_bytes([entry[16], entry[17]]);
            SocketAddr::new(ip, port)
        })
        .collect();

    Ok(servers)
}

/// Extract the number of registered servers from a server count response
pub fn parse_server_count(response: &[u8]) -> Result<u16> {
    expect_kind(response, PacketKind::ServerCount)?;

    match packet::payload(response) {
        [high, low, ..] => Ok(u16::from_be_bytes([*high, *low])),
        _ => Err(BrowserError::InvalidResponseMessage),
    }
}

/// Decode a server info response received from `source`
pub fn parse_server_info(response: &[u8], source: SocketAddr) -> Result<ServerInfo> {
    expect_kind(response, PacketKind::ServerInfo)
        .map_err(|e| BrowserError::InvalidServerInfo(e.to_string()))?;

    let mut fields = VarInt::from_bytes(packet::payload(response));
    decode_server_info(&mut fields, source).map_err(|e| match e {
        BrowserError::InvalidServerInfo(_) => e,
        other => BrowserError::InvalidServerInfo(other.to_string()),
    })
}

fn decode_server_info(fields: &mut VarInt, address: SocketAddr) -> Result<ServerInfo> {
    // browser token echoed back, not needed once the response is classified
    let _token = fields.unpack()?;

    let version = fields.unpack_str()?;
    let name = fields.unpack_str()?;
    let hostname = fields.unpack_str()?;
    let map = fields.unpack_str()?;
    let game_type = fields.unpack_str()?;
    let flags = fields.unpack()?;
    let skill_level = fields.unpack()?;
    let num_players = fields.unpack()?;
    let max_players = fields.unpack()?;
    let num_clients = fields.unpack()?;
    let max_clients = fields.unpack()?;

    if !(0..=MAX_CLIENTS).contains(&num_clients)
        || !(0..=MAX_CLIENTS).contains(&max_clients)
        || num_players < 0
        || num_players > num_clients
        || max_players < 0
        || max_players > max_clients
    {
        return Err(BrowserError::InvalidServerInfo(format!(
            "inconsistent counts: players {num_players}/{max_players}, clients {num_clients}/{max_clients}"
        )));
    }

    let mut clients = Vec::with_capacity(num_clients as usize);
    for _ in 0..num_clients {
        clients.push(ClientInfo {
            name: fields.unpack_str()?,
            clan: fields.unpack_str()?,
            country: fields.unpack()?,
            score: fields.unpack()?,
            is_player: fields.unpack()? != 0,
        });
    }

    Ok(ServerInfo {
        address,
        version,
        name,
        hostname,
        map,
        game_type,
        flags,
        skill_level,
        num_players,
        max_players,
        num_clients,
        max_clients,
        clients,
    })
}

fn expect_kind(response: &[u8], expected: PacketKind) -> Result<()> {
    let kind = packet::classify(response)?;
    if kind != expected {
        return Err(BrowserError::RequestResponseMismatch);
    }
    Ok(())
}
