//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use liveserve::{MountConfig, ServerConfig, StaticServer};

/// Config serving `dir` at `/` on a system-chosen loopback port. Process
/// hooks are left out so tests don't install global panic/signal handlers.
pub fn local_config(dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: None,
        serve: vec![MountConfig::new(dir, "/")],
        close_on_interrupt: false,
        close_on_fault: false,
        verbose: false,
        ..Default::default()
    }
}

/// Start a server for `dir` and return it with the bound address.
#[allow(dead_code)]
pub async fn start_local(dir: &Path) -> (StaticServer, SocketAddr) {
    let server = StaticServer::new(local_config(dir));
    let addr = server.start().await.expect("server should start");
    (server, addr)
}

/// Poll `url` until it answers with `status`, returning that response.
/// Watcher events are asynchronous, so route changes need a settling window.
#[allow(dead_code)]
pub async fn get_until_status(
    client: &reqwest::Client,
    url: &str,
    status: u16,
) -> reqwest::Response {
    for _ in 0..100 {
        if let Ok(response) = client.get(url).send().await {
            if response.status().as_u16() == status {
                return response;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("{url} never answered {status}");
}

/// Expected validator for a file: lowercase hex of its mtime in ms.
#[allow(dead_code)]
pub fn expected_etag(path: &Path) -> String {
    let ms = std::fs::metadata(path)
        .unwrap()
        .modified()
        .unwrap()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64;
    format!("{ms:x}")
}
