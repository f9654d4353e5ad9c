//! Shared async HTTP test server helpers.

use std::{path::PathBuf, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
    routing::get,
};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use url::Url;

/// Lightweight HTTP test server wrapper.
pub struct TestHttpServer {
    base_url: Url,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestHttpServer {
    /// Spawn `router` on a random localhost port.
    ///
    /// # Panics
    ///
    /// Panics if listener bind or URL parsing fails.
    pub async fn new(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test HTTP listener");
        let addr = listener
            .local_addr()
            .expect("read test listener local addr");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let server = axum::serve(listener, router).with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        });

        tokio::spawn(async move {
            server.await.expect("run test HTTP server");
        });

        Self {
            base_url: Url::parse(&format!("http://{addr}/")).expect("parse base URL"),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Join path to server base URL.
    ///
    /// # Panics
    ///
    /// Panics if URL join fails.
    #[must_use]
    pub fn url(&self, path: &str) -> Url {
        self.base_url.join(path).expect("join server URL path")
    }

    /// Base URL of this server.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl Drop for TestHttpServer {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

/// One request seen by a [`FileServer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggedRequest {
    pub path: String,
    pub range: Option<String>,
}

/// Requests seen by a [`FileServer`], shared with the test.
#[derive(Clone, Debug, Default)]
pub struct RequestLog {
    entries: Arc<Mutex<Vec<LoggedRequest>>>,
}

impl RequestLog {
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Requests for one file.
    #[must_use]
    pub fn requests_for(&self, path: &str) -> Vec<LoggedRequest> {
        self.entries
            .lock()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }
}

/// Serves files from a directory, honouring `Range: bytes=N-` unless
/// built [`FileServer::without_ranges`].
#[derive(Clone, Debug)]
pub struct FileServer {
    root: PathBuf,
    ranges: bool,
    log: RequestLog,
}

impl FileServer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ranges: true,
            log: RequestLog::default(),
        }
    }

    /// Answer range requests with the whole file and `200`.
    #[must_use]
    pub fn without_ranges(mut self) -> Self {
        self.ranges = false;
        self
    }

    #[must_use]
    pub fn log(&self) -> RequestLog {
        self.log.clone()
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/{*path}", get(serve_file))
            .with_state(self)
    }

    /// Spawn a server for this directory.
    pub async fn spawn(self) -> TestHttpServer {
        TestHttpServer::new(self.router()).await
    }
}

async fn serve_file(
    State(server): State<FileServer>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    server.log.entries.lock().push(LoggedRequest {
        path: path.clone(),
        range: range.clone(),
    });

    let Ok(data) = tokio::fs::read(server.root.join(&path)).await else {
        return status(StatusCode::NOT_FOUND);
    };
    let start = range
        .filter(|_| server.ranges)
        .and_then(|r| r.strip_prefix("bytes=")?.strip_suffix('-')?.parse::<usize>().ok());

    match start {
        Some(start) if start < data.len() => Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(
                header::CONTENT_RANGE,
                format!("bytes {start}-{}/{}", data.len() - 1, data.len()),
            )
            .body(Body::from(data[start..].to_vec()))
            .unwrap(),
        Some(_) => status(StatusCode::RANGE_NOT_SATISFIABLE),
        None => Response::builder()
            .status(StatusCode::OK)
            .body(Body::from(data))
            .unwrap(),
    }
}

fn status(code: StatusCode) -> Response {
    Response::builder()
        .status(code)
        .body(Body::empty())
        .unwrap()
}
