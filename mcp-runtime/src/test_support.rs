use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use serde_json::{Value, json};

use crate::client::{ClientConfig, Credentials, ShoppingInsightClient};

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub path: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub content_type: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct UpstreamState {
    status: StatusCode,
    body: Value,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

/// In-process stand-in for the DataLab API: answers every path with a fixed
/// status/body and records what it received.
pub(crate) struct Upstream {
    pub base_url: String,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl Upstream {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

pub(crate) async fn spawn_upstream(status: StatusCode, body: Value) -> Upstream {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let state = UpstreamState {
        status,
        body,
        calls: calls.clone(),
    };
    let app = Router::new().fallback(record).with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Upstream {
        base_url: format!("http://{addr}/v1/datalab/shopping"),
        calls,
    }
}

async fn record(
    State(state): State<UpstreamState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    state.calls.lock().unwrap().push(RecordedCall {
        path: uri.path().to_string(),
        client_id: header("x-naver-client-id"),
        client_secret: header("x-naver-client-secret"),
        content_type: header("content-type"),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });
    (state.status, Json(state.body.clone()))
}

pub(crate) fn test_client(base_url: &str) -> ShoppingInsightClient {
    ShoppingInsightClient::new(
        Credentials::new("test-id", "test-secret"),
        ClientConfig {
            base_url: base_url.to_string(),
            timeout: Some(Duration::from_secs(5)),
        },
    )
    .unwrap()
}

pub(crate) fn trend_body() -> Value {
    json!({
        "startDate": "2023-01-01",
        "endDate": "2023-03-01",
        "timeUnit": "month",
        "results": [{
            "title": "패션의류",
            "category": ["50000000"],
            "data": [
                { "period": "2023-01-01", "ratio": 12.345 },
                { "period": "2023-02-01", "ratio": 100 }
            ]
        }]
    })
}
