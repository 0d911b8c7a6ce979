//! Start/shutdown orchestration: idempotence, bind conflicts, teardown.

mod common;

use common::{get_until_status, local_config, start_local};
use liveserve::{ServerError, ServerState, StaticServer};

#[tokio::test]
async fn shutdown_twice_is_idempotent() {
    let site = tempfile::tempdir().unwrap();
    let (server, _addr) = start_local(site.path()).await;

    server.shutdown().await;
    assert_eq!(server.state(), ServerState::Stopped);
    server.shutdown().await;
    assert_eq!(server.state(), ServerState::Stopped);
}

#[tokio::test]
async fn concurrent_shutdowns_are_safe() {
    let site = tempfile::tempdir().unwrap();
    let (server, _addr) = start_local(site.path()).await;

    let other = server.clone();
    tokio::join!(server.shutdown(), other.shutdown());
    assert_eq!(server.state(), ServerState::Stopped);
}

#[tokio::test]
async fn start_is_idempotent_while_listening() {
    let site = tempfile::tempdir().unwrap();
    let (server, addr) = start_local(site.path()).await;
    assert_eq!(server.state(), ServerState::Listening(addr));

    let again = server.start().await.unwrap();
    assert_eq!(addr, again);

    server.shutdown().await;
}

#[tokio::test]
async fn start_after_shutdown_is_refused() {
    let site = tempfile::tempdir().unwrap();
    let (server, _addr) = start_local(site.path()).await;
    server.shutdown().await;

    assert!(matches!(
        server.start().await,
        Err(ServerError::Stopped)
    ));
}

#[tokio::test]
async fn bind_conflict_runs_the_shutdown_sequence() {
    let site = tempfile::tempdir().unwrap();

    // Occupy a port, then ask the server for the same one.
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();

    let mut config = local_config(site.path());
    config.port = Some(port);
    let server = StaticServer::new(config);

    assert!(matches!(
        server.start().await,
        Err(ServerError::AddrInUse { .. })
    ));
    assert_eq!(server.state(), ServerState::Stopped);
}

#[tokio::test]
async fn missing_root_is_fatal_before_listening() {
    let site = tempfile::tempdir().unwrap();
    let mut config = local_config(&site.path().join("does-not-exist"));
    config.port = None;
    let server = StaticServer::new(config);

    assert!(matches!(
        server.start().await,
        Err(ServerError::NotADirectory { .. })
    ));
    assert_eq!(server.state(), ServerState::Stopped);
}

#[tokio::test]
async fn shutdown_stops_serving() {
    let site = tempfile::tempdir().unwrap();
    std::fs::write(site.path().join("index.html"), "x").unwrap();

    let (server, addr) = start_local(site.path()).await;
    let client = reqwest::Client::new();
    get_until_status(&client, &format!("http://{addr}/index.html"), 200).await;

    server.shutdown().await;

    // The listener is gone and tracked connections were ended.
    let result = client
        .get(format!("http://{addr}/index.html"))
        .send()
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn wait_until_stopped_resolves_after_shutdown() {
    let site = tempfile::tempdir().unwrap();
    let (server, _addr) = start_local(site.path()).await;

    let waiter = server.clone();
    let waiting = tokio::spawn(async move { waiter.wait_until_stopped().await });

    server.shutdown().await;
    tokio::time::timeout(std::time::Duration::from_secs(1), waiting)
        .await
        .expect("waiter should resolve once stopped")
        .unwrap();
}
