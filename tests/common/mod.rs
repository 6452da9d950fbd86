//! In-process mock of the CodeAlive REST API.
//!
//! Routes are fixed `(method, path) -> (status, body)` replies. Every
//! request is recorded so tests can assert on paths, query pairs, headers
//! and bodies, or on how many requests were sent at all.

#![allow(dead_code)]

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Recorded {
    pub fn query_values(&self, name: &str) -> Vec<String> {
        self.query
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

#[derive(Clone)]
struct MockState {
    routes: Arc<HashMap<(String, String), (u16, String)>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

pub struct MockApi {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockApi {
    /// Start a server answering the given routes. Unknown routes get 404.
    pub fn start(routes: &[(&str, &str, u16, &str)]) -> Self {
        let routes: HashMap<(String, String), (u16, String)> = routes
            .iter()
            .map(|(method, path, status, body)| {
                (
                    (method.to_string(), path.to_string()),
                    (*status, body.to_string()),
                )
            })
            .collect();

        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            routes: Arc::new(routes),
            requests: requests.clone(),
        };

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let port = listener.local_addr().unwrap().port();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                let app = Router::new().fallback(handle).with_state(state);
                axum::serve(listener, app).await.unwrap();
            });
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            requests,
        }
    }

    /// Convenience for a single `GET` or `POST` route returning JSON.
    pub fn json(method: &str, path: &str, body: &Value) -> Self {
        let text = body.to_string();
        Self::start(&[(method, path, 200, text.as_str())])
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handle(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let query = uri
        .query()
        .map(|q| {
            reqwest::Url::parse(&format!("http://mock/?{}", q))
                .unwrap()
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default();

    let headers = headers
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
        .collect();

    state.requests.lock().unwrap().push(Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        query,
        headers,
        body,
    });

    let key = (method.to_string(), uri.path().to_string());
    let (status, body) = state
        .routes
        .get(&key)
        .cloned()
        .unwrap_or((404, r#"{"message":"no such route"}"#.to_string()));

    Response::builder()
        .status(StatusCode::from_u16(status).unwrap())
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

/// A local port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
