use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use serde_json::Value;
use tokio::net::TcpListener;

/// A bulk request as received by the fake Elasticsearch node.
#[derive(Debug, Clone)]
pub struct CollectedBulk {
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl CollectedBulk {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Parsed ndjson lines, action and document alternating.
    pub fn lines(&self) -> Vec<Value> {
        self.body
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| serde_json::from_str(l).expect("ndjson line is not JSON"))
            .collect()
    }

    pub fn documents(&self) -> Vec<Value> {
        self.lines().into_iter().skip(1).step_by(2).collect()
    }
}

pub type CollectorStore = Arc<Mutex<Vec<CollectedBulk>>>;

#[derive(Clone)]
pub struct Collector {
    pub port: u16,
    store: CollectorStore,
    status: Arc<AtomicU16>,
}

impl Collector {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind collector listener");
        let port = listener.local_addr().unwrap().port();

        let collector = Self {
            port,
            store: Arc::new(Mutex::new(Vec::new())),
            status: Arc::new(AtomicU16::new(200)),
        };

        let server = collector.clone();
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener
                    .accept()
                    .await
                    .expect("failed to accept connection");
                let server = server.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let server = server.clone();
                        async move { server.handle(req).await }
                    });
                    let _ = Builder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        collector
    }

    /// Status code returned for every later request.
    pub fn respond_with(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    /// Wait until at least `min_expected` requests arrived, or the timeout passes.
    pub async fn drain(&self, timeout_ms: u64, min_expected: usize) -> Vec<CollectedBulk> {
        let deadline =
            tokio::time::Instant::now() + tokio::time::Duration::from_millis(timeout_ms);

        loop {
            {
                let current = self.store.lock().unwrap();
                if current.len() >= min_expected {
                    break;
                }
            }

            if tokio::time::Instant::now() >= deadline {
                break;
            }

            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        self.store.lock().unwrap().drain(..).collect()
    }

    async fn handle<B>(&self, req: Request<B>) -> Result<Response<Full<Bytes>>, Infallible>
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
    {
        if req.method() != Method::POST {
            return Ok(Response::builder()
                .status(StatusCode::METHOD_NOT_ALLOWED)
                .body(Full::default())
                .unwrap());
        }

        let path = req.uri().path().to_owned();

        let mut headers = HashMap::new();
        for (name, value) in req.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_owned(), v.to_owned());
            }
        }

        let body_bytes = req
            .collect()
            .await
            .map(|c| c.to_bytes())
            .unwrap_or_default();

        self.store.lock().unwrap().push(CollectedBulk {
            path,
            headers,
            body: String::from_utf8_lossy(&body_bytes).into_owned(),
        });

        let status = StatusCode::from_u16(self.status.load(Ordering::SeqCst))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = if status.is_success() {
            Bytes::from_static(br#"{"took":1,"errors":false,"items":[]}"#)
        } else {
            Bytes::from_static(br#"{"error":{"type":"cluster_block_exception"}}"#)
        };

        Ok(Response::builder().status(status).body(Full::new(body)).unwrap())
    }
}
