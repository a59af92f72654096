#![no_main]

use libfuzzer_sys::fuzz_target;
use server_browser::core::packet::{self, PacketKind};
use server_browser::protocol::message::{
    parse_server_count, parse_server_info, parse_server_list, parse_token,
};

fuzz_target!(|data: &[u8]| {
    // Whatever a peer sends must be rejected or parsed, never panic
    let source = "127.0.0.1:8303".parse().unwrap();
    match packet::classify(data) {
        Ok(PacketKind::Token) => {
            let _ = parse_token(data);
        }
        Ok(PacketKind::ServerList) => {
            let _ = parse_server_list(data);
        }
        Ok(PacketKind::ServerCount) => {
            let _ = parse_server_count(data);
        }
        Ok(PacketKind::ServerInfo) => {
            let _ = parse_server_info(data, source);
        }
        Err(_) => {}
    }
});
