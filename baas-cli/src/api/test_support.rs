//! Scripted transport for orchestration tests

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::time::Instant;

use super::client::BaasClient;
use super::models::Endpoint;
use super::resilience::RateLimitConfig;
use super::transport::{HttpRequest, HttpResponse, Method, Transport, TransportError};
use super::auth::ClientCredentials;

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync;
type Latency = dyn Fn(&HttpRequest) -> Duration + Send + Sync;

/// A request as seen by the transport, with the (paused-clock) time it arrived
#[derive(Debug, Clone)]
pub struct Recorded {
    pub request: HttpRequest,
    pub at: Instant,
}

pub struct MockTransport {
    handler: Box<Handler>,
    latency: Box<Latency>,
    requests: Mutex<Vec<Recorded>>,
}

impl MockTransport {
    pub fn new(
        handler: impl Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            latency: Box::new(|_| Duration::ZERO),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: impl Fn(&HttpRequest) -> Duration + Send + Sync + 'static) -> Self {
        self.latency = Box::new(latency);
        self
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Non-token requests, in arrival order
    pub fn api_requests(&self) -> Vec<HttpRequest> {
        self.recorded()
            .into_iter()
            .map(|r| r.request)
            .filter(|r| !is_token_request(r))
            .collect()
    }

    pub fn token_requests(&self) -> usize {
        self.recorded()
            .iter()
            .filter(|r| is_token_request(&r.request))
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(Recorded {
            request: request.clone(),
            at: Instant::now(),
        });
        let latency = (self.latency)(&request);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        (self.handler)(&request)
    }
}

pub fn is_token_request(request: &HttpRequest) -> bool {
    request.method == Method::POST && request.url.ends_with("/token")
}

pub fn json_response(status: u16, body: Value) -> HttpResponse {
    HttpResponse {
        status,
        body: serde_json::to_vec(&body).unwrap(),
    }
}

pub fn token_response() -> HttpResponse {
    json_response(200, json!({"access_token": "TOKEN", "expires_in": 3600}))
}

pub fn entities_response(entities: Vec<Value>) -> HttpResponse {
    json_response(200, json!({ "entities": entities }))
}

/// Value of a query-string parameter, undecoded
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Last path segment before the query string
pub fn last_segment(url: &str) -> String {
    let path = url.split('?').next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or_default().to_string()
}

pub fn test_client(transport: Arc<MockTransport>) -> BaasClient {
    BaasClient::builder()
        .endpoint(Endpoint::from_base_url("https://baas.test", "acme", "sandbox"))
        .credentials(ClientCredentials::new("id", "secret"))
        .transport(transport)
        .rate_limit(RateLimitConfig::disabled())
        .build()
        .unwrap()
}
