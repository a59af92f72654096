//! End-to-end discovery against fake master and game servers

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod support;

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use server_browser::config::BrowserConfig;
use server_browser::error::BrowserError;
use server_browser::service::Browser;
use support::{spawn_peer, Role};

const BUDGET: Duration = Duration::from_millis(500);

fn browser_for(masters: &[SocketAddr]) -> Browser {
    let config = BrowserConfig::default_with_overrides(|c| {
        c.discovery.master_servers = masters.iter().map(SocketAddr::to_string).collect();
        c.discovery.master_timeout = BUDGET;
        c.discovery.server_timeout = BUDGET;
        c.transport.bind_address = "127.0.0.1:0".to_string();
    });
    Browser::new(config).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_masters_yield_each_server_once() {
    let alpha = spawn_peer(Role::game("alpha")).await;
    let beta = spawn_peer(Role::game("beta")).await;
    let gamma = spawn_peer(Role::game("gamma")).await;

    let first = spawn_peer(Role::master(&[alpha.addr, beta.addr])).await;
    let second = spawn_peer(Role::master(&[beta.addr, gamma.addr])).await;

    let browser = browser_for(&[first.addr, second.addr]);
    let servers = browser.server_infos().await;

    assert_eq!(servers.len(), 3);
    let names: HashSet<_> = servers.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, HashSet::from(["alpha", "beta", "gamma"]));

    let beta_info = servers.iter().find(|s| s.address == beta.addr).unwrap();
    assert_eq!(beta_info.map, "ctf5");
    assert_eq!(beta_info.clients.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dead_master_does_not_affect_others() {
    let alpha = spawn_peer(Role::game("alpha")).await;
    let live = spawn_peer(Role::master(&[alpha.addr])).await;
    let dead = spawn_peer(Role::Silent).await;

    let browser = browser_for(&[dead.addr, live.addr]);
    let servers = browser.server_infos().await;

    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0].address, alpha.addr);
    assert!(dead.received() > 0, "dead master should have been asked");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_silent_game_server_is_skipped() {
    let alpha = spawn_peer(Role::game("alpha")).await;
    let silent = spawn_peer(Role::Silent).await;
    let master = spawn_peer(Role::master(&[silent.addr, alpha.addr])).await;

    let browser = browser_for(&[master.addr]);
    let servers = browser
        .server_infos_with_timeouts(BUDGET, Duration::from_millis(200))
        .await;

    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0].name, "alpha");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_reachable_master_yields_nothing() {
    let dead = spawn_peer(Role::Silent).await;

    let browser = browser_for(&[dead.addr]);
    let servers = browser
        .server_infos_with_timeouts(Duration::from_millis(100), Duration::from_millis(100))
        .await;

    assert!(servers.is_empty());
}

#[tokio::test]
async fn test_server_list_and_count() {
    let listed: Vec<SocketAddr> = vec![
        "127.0.0.1:8303".parse().unwrap(),
        "127.0.0.2:8304".parse().unwrap(),
        "[2001:db8::1]:8305".parse().unwrap(),
    ];
    let master = spawn_peer(Role::master(&listed)).await;
    let browser = browser_for(&[master.addr]);

    let servers = browser.server_list(master.addr, BUDGET).await.unwrap();
    assert_eq!(servers, listed);

    let count = browser.server_count(master.addr, BUDGET).await.unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn test_server_info_by_ip_and_port() {
    let alpha = spawn_peer(Role::game("alpha")).await;
    let browser = browser_for(&[alpha.addr]);

    let info = browser
        .server_info("127.0.0.1", i64::from(alpha.addr.port()))
        .await
        .unwrap();

    assert_eq!(info.address, alpha.addr);
    assert_eq!(info.name, "alpha");
    assert_eq!(info.version, "0.7.5");
    assert_eq!(info.clients[0].name, "nameless tee");
}

#[tokio::test]
async fn test_server_info_from_silent_server_times_out() {
    let silent = spawn_peer(Role::Silent).await;
    let browser = browser_for(&[silent.addr]);

    let result = browser
        .server_info_with_timeout(
            "127.0.0.1",
            i64::from(silent.addr.port()),
            Duration::from_millis(100),
        )
        .await;

    assert!(matches!(result, Err(BrowserError::Timeout)));
}

#[tokio::test]
async fn test_game_server_is_no_master() {
    let alpha = spawn_peer(Role::game("alpha")).await;
    let browser = browser_for(&[alpha.addr]);

    let result = browser
        .server_list(alpha.addr, Duration::from_millis(100))
        .await;
    assert!(matches!(result, Err(BrowserError::Timeout)));
}
