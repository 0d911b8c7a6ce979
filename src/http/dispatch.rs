//! Per-request dispatch state machine.
//!
//! # Responsibilities
//! - Accept only GET; anything else is 405 with an empty body
//! - Resolve the percent-decoded path against the route table verbatim
//! - Honor `if-none-match` against the entry's validator (304)
//! - Stream hits (200), diagnose misses (404), contain faults (500)
//! - Append an access record for every completed request
//!
//! # Design Decisions
//! - No filesystem traversal at request time: only registered paths are
//!   reachable, so path traversal is structurally impossible
//! - The entry is captured once at lookup; the table may mutate mid-stream
//! - A read failure after headers are committed aborts the stream and is
//!   logged at error level (the status line can no longer be amended)

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use futures_util::TryStreamExt;
use percent_encoding::percent_decode_str;
use tokio_util::io::ReaderStream;

use crate::http::websocket::UpgradeBridge;
use crate::routing::{FileEntry, RouteTable};

const TEXT_HTML: &str = "text/html; charset=utf-8";

/// State injected into the dispatcher.
#[derive(Clone)]
pub struct AppState {
    pub table: Arc<RouteTable>,
    pub bridge: Option<Arc<UpgradeBridge>>,
}

/// Fallback handler every request funnels through.
pub async fn dispatch(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    // Upgrade requests bypass the dispatch state machine entirely; the
    // bridge only exists when a channel handler was configured. A rejection
    // just means this is a plain request.
    if let (Some(bridge), Ok(ws)) = (state.bridge.as_ref(), ws) {
        return bridge.accept(ws, peer);
    }

    let response = handle(&state, &method, &uri, &headers).await;
    tracing::info!(
        client = %peer,
        status = response.status().as_u16(),
        method = %method,
        path = %uri.path(),
        "request"
    );
    response
}

async fn handle(state: &AppState, method: &Method, uri: &Uri, headers: &HeaderMap) -> Response {
    if method != Method::GET {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let path = match percent_decode_str(uri.path()).decode_utf8() {
        Ok(path) => path.into_owned(),
        Err(e) => return server_error(&format!("bad path encoding: {e}")),
    };

    let Some(entry) = state.table.get(&path) else {
        return not_found(&path);
    };

    if let Some(validator) = headers.get(header::IF_NONE_MATCH).and_then(|v| v.to_str().ok()) {
        if validator == entry.etag() {
            return StatusCode::NOT_MODIFIED.into_response();
        }
    }

    match stream_file(&entry).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(path = %path, file = %entry.abs_path.display(), error = %e, "request failed");
            server_error(&e.to_string())
        }
    }
}

/// Open the entry's file and build the streaming 200 response. The file
/// handle lives inside the body stream and is released when the stream is
/// dropped, on normal completion and on any read error alike.
async fn stream_file(entry: &FileEntry) -> io::Result<Response> {
    let file = tokio::fs::File::open(&entry.abs_path).await?;
    let len = file.metadata().await?.len();

    let path = entry.abs_path.clone();
    let stream = ReaderStream::new(file).inspect_err(move |e| {
        // Headers are already committed; the stream aborts the connection.
        tracing::error!(file = %path.display(), error = %e, "read failed mid-stream, aborting response");
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, len)
        .header(header::CONTENT_TYPE, &entry.content_type)
        .header(header::ETAG, entry.etag())
        .body(Body::from_stream(stream))
        .map_err(io::Error::other)
}

fn not_found(path: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, TEXT_HTML)],
        format!("404 Not found: {path}"),
    )
        .into_response()
}

fn server_error(description: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, TEXT_HTML)],
        format!("500 Server error: {description}"),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::websocket::ServedChannel;
    use axum::extract::Request;
    use axum::{Extension, Router};
    use tower::ServiceExt;

    fn app(state: AppState) -> Router {
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(Extension(ConnectInfo(peer)))
    }

    fn state_with_table(table: RouteTable) -> AppState {
        AppState {
            table: Arc::new(table),
            bridge: None,
        }
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn non_get_is_405_with_empty_body() {
        let app = app(state_with_table(RouteTable::new(vec![])));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/anything")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(body_string(response).await.is_empty());
    }

    #[tokio::test]
    async fn miss_is_404_naming_the_path() {
        let app = app(state_with_table(RouteTable::new(vec![])));
        let response = app
            .oneshot(Request::builder().uri("/missing.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        assert_eq!(body_string(response).await, "404 Not found: /missing.txt");
    }

    #[tokio::test]
    async fn lookup_key_is_percent_decoded() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("hello world.txt");
        std::fs::write(&file, "hi").unwrap();

        let table = RouteTable::new(vec![]);
        table.upsert("/hello world.txt".to_string(), &file, 7);

        let app = app(state_with_table(table));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/hello%20world.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "hi");
    }

    #[tokio::test]
    async fn hit_streams_bytes_with_validator_headers() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("page.html");
        std::fs::write(&file, "<h1>served</h1>").unwrap();

        let table = RouteTable::new(vec![]);
        table.upsert("/page.html".to_string(), &file, 0xbeef);

        let app = app(state_with_table(table));
        let response = app
            .oneshot(Request::builder().uri("/page.html").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ETAG], "beef");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "15");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        assert_eq!(body_string(response).await, "<h1>served</h1>");
    }

    #[tokio::test]
    async fn matching_validator_is_304_without_body() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("page.html");
        std::fs::write(&file, "<h1>served</h1>").unwrap();

        let table = RouteTable::new(vec![]);
        table.upsert("/page.html".to_string(), &file, 0xbeef);
        let app = app(state_with_table(table));

        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri("/page.html")
                        .header(header::IF_NONE_MATCH, "beef")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
            assert!(body_string(response).await.is_empty());
        }
    }

    #[tokio::test]
    async fn stale_validator_gets_fresh_body() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("page.html");
        std::fs::write(&file, "new").unwrap();

        let table = RouteTable::new(vec![]);
        table.upsert("/page.html".to_string(), &file, 0x20);
        let app = app(state_with_table(table));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/page.html")
                    .header(header::IF_NONE_MATCH, "1f")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ETAG], "20");
        assert_eq!(body_string(response).await, "new");
    }

    #[tokio::test]
    async fn plain_get_dispatches_when_a_bridge_is_configured() {
        // A request without upgrade headers must fall through to the state
        // machine even though the bridge exists.
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("page.html");
        std::fs::write(&file, "plain").unwrap();

        let table = RouteTable::new(vec![]);
        table.upsert("/page.html".to_string(), &file, 1);

        let bridge = UpgradeBridge::new(Arc::new(|_channel: ServedChannel| async {}));
        let state = AppState {
            table: Arc::new(table),
            bridge: Some(Arc::new(bridge)),
        };

        let response = app(state)
            .oneshot(Request::builder().uri("/page.html").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "plain");
    }

    #[tokio::test]
    async fn deleted_file_behind_live_entry_is_500() {
        // A request may race a deletion: lookup succeeds, open fails.
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("gone.txt");
        std::fs::write(&file, "x").unwrap();

        let table = RouteTable::new(vec![]);
        table.upsert("/gone.txt".to_string(), &file, 1);
        std::fs::remove_file(&file).unwrap();

        let app = app(state_with_table(table));
        let response = app
            .oneshot(Request::builder().uri("/gone.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_string(response).await.starts_with("500 Server error: "));
    }
}
