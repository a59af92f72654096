//! Fake master and game servers on loopback UDP

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use server_browser::config::{
    REQUEST_INFO, REQUEST_SERVER_COUNT, REQUEST_SERVER_LIST, SEND_INFO, SEND_SERVER_COUNT,
    SEND_SERVER_LIST,
};
use server_browser::core::varint::VarInt;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

pub const SERVER_TOKEN: [u8; 4] = [0x5E, 0x12, 0x7A, 0x01];

#[derive(Debug, Clone)]
pub enum Role {
    Master { servers: Vec<SocketAddr> },
    Game { name: String, players: Vec<String> },
    /// Answers token requests, then replies to every typed request with a
    /// server count
    WrongType,
    Silent,
}

impl Role {
    pub fn master(servers: &[SocketAddr]) -> Self {
        Role::Master {
            servers: servers.to_vec(),
        }
    }

    pub fn game(name: &str) -> Self {
        Role::Game {
            name: name.to_string(),
            players: vec!["nameless tee".to_string(), "brainless tee".to_string()],
        }
    }
}

/// Network conditions between the browser and a peer
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    /// Only every n-th received datagram is answered
    pub answer_every: Option<usize>,
    /// Delay before each answer leaves
    pub delay: Duration,
    /// Send every answer twice
    pub duplicate: bool,
}

pub struct Peer {
    pub addr: SocketAddr,
    received: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl Peer {
    /// Datagrams that reached the peer so far, dropped ones included
    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub async fn spawn_peer(role: Role) -> Peer {
    spawn_peer_with(role, Conditions::default()).await
}

pub async fn spawn_peer_with(role: Role, conditions: Conditions) -> Peer {
    let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let addr = socket.local_addr().unwrap();
    let received = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&received);
    let task = tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        loop {
            let Ok((n, from)) = socket.recv_from(&mut buf).await else {
                break;
            };
            let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(every) = conditions.answer_every {
                if count % every != 0 {
                    continue;
                }
            }
            let Some(response) = answer(&role, &buf[..n]) else {
                continue;
            };

            let socket = Arc::clone(&socket);
            let conditions = conditions.clone();
            tokio::spawn(async move {
                if !conditions.delay.is_zero() {
                    tokio::time::sleep(conditions.delay).await;
                }
                let _ = socket.send_to(&response, from).await;
                if conditions.duplicate {
                    let _ = socket.send_to(&response, from).await;
                }
            });
        }
    });

    Peer {
        addr,
        received,
        task,
    }
}

/// What a well-behaved peer of `role` replies to `request`
pub fn answer(role: &Role, request: &[u8]) -> Option<Vec<u8>> {
    if matches!(role, Role::Silent) {
        return None;
    }

    match *request.first()? {
        0x04 if request.len() >= 12 => {
            let mut response = vec![0x04, 0, 0];
            response.extend_from_slice(&request[8..12]);
            response.push(0x05);
            response.extend_from_slice(&SERVER_TOKEN);
            Some(response)
        }
        0x21 if request.len() >= 17 && request[1..5] == SERVER_TOKEN => {
            let mut response = vec![0x21];
            response.extend_from_slice(&request[5..9]);
            response.extend_from_slice(&SERVER_TOKEN);

            let signature = &request[9..17];
            match role {
                Role::Master { servers } if signature == REQUEST_SERVER_LIST => {
                    response.extend_from_slice(&SEND_SERVER_LIST);
                    for server in servers {
                        let octets = match server.ip() {
                            IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
                            IpAddr::V6(v6) => v6.octets(),
                        };
                        response.extend_from_slice(&octets);
                        response.extend_from_slice(&server.port().to_be_bytes());
                    }
                }
                Role::Master { servers } if signature == REQUEST_SERVER_COUNT => {
                    response.extend_from_slice(&SEND_SERVER_COUNT);
                    response.extend_from_slice(&(servers.len() as u16).to_be_bytes());
                }
                Role::Game { name, players } if signature == REQUEST_INFO => {
                    let browser_token = VarInt::from_bytes(&request[17..]).unpack().ok()?;
                    response.extend_from_slice(&SEND_INFO);
                    response.extend_from_slice(&info_payload(browser_token, name, players));
                }
                Role::WrongType => {
                    response.extend_from_slice(&SEND_SERVER_COUNT);
                    response.extend_from_slice(&[0, 0]);
                }
                _ => return None,
            }
            Some(response)
        }
        _ => None,
    }
}

fn info_payload(browser_token: i32, name: &str, players: &[String]) -> Vec<u8> {
    let mut v = VarInt::new();
    v.pack(browser_token);
    v.pack_str("0.7.5");
    v.pack_str(name);
    v.pack_str("");
    v.pack_str("ctf5");
    v.pack_str("CTF");
    v.pack(0);
    v.pack(1);
    v.pack(players.len() as i32);
    v.pack(8);
    v.pack(players.len() as i32);
    v.pack(8);
    for (score, player) in players.iter().enumerate() {
        v.pack_str(player);
        v.pack_str("");
        v.pack(-1);
        v.pack(score as i32);
        v.pack(1);
    }
    v.as_bytes().to_vec()
}
