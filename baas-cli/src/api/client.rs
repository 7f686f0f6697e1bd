//! Entity-store API client
//!
//! [`BaasClient`] is the explicitly constructed orchestration object: it owns
//! the endpoint, the transport, the cached credential and the rate limiter.
//! Independently configured clients never share a limiter or a token.
//! Cloning is cheap and shares all of the above.

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info};
use serde_json::Value;

use super::attachments;
use super::auth::{ClientCredentials, TokenManager};
use super::constants::DEFAULT_PAGE_LIMIT;
use super::error::ApiError;
use super::models::{ApiResponse, Endpoint};
use super::operations::{BatchJobResult, BatchOptions, BatchWriter, EntityUpsertResolver, WriteOperation};
use super::query::{Filter, QueryPaginator};
use super::resilience::{RateLimitConfig, RateLimiter};
use super::transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};
use crate::config::Config;

struct ClientInner {
    endpoint: Endpoint,
    transport: Arc<dyn Transport>,
    tokens: TokenManager,
    limiter: RateLimiter,
    page_limit: usize,
}

#[derive(Clone)]
pub struct BaasClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for BaasClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaasClient")
            .field("endpoint", &self.inner.endpoint)
            .field("rate_limit", self.inner.limiter.config())
            .field("page_limit", &self.inner.page_limit)
            .finish()
    }
}

impl BaasClient {
    pub fn builder() -> BaasClientBuilder {
        BaasClientBuilder::new()
    }

    /// Build a client from loaded configuration, using the reqwest transport
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let settings = config.validate()?;
        Self::builder()
            .endpoint(Endpoint::new(&settings.scheme, &settings.host, settings.org, settings.app))
            .credentials(ClientCredentials::new(settings.client_id, settings.client_secret))
            .rate_limit(RateLimitConfig::per_minute(settings.throttle_per_minute))
            .page_limit(settings.page_limit)
            .build()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.inner.tokens
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    pub fn page_limit(&self) -> usize {
        self.inner.page_limit
    }

    pub fn paginator(&self) -> QueryPaginator<'_> {
        QueryPaginator::new(self)
    }

    pub fn batch_writer(&self) -> BatchWriter<'_> {
        BatchWriter::new(self)
    }

    pub fn upsert_resolver(&self) -> EntityUpsertResolver<'_> {
        EntityUpsertResolver::new(self)
    }

    /// Issue one request through the rate limiter, with a valid token.
    /// `build` receives the access token and assembles the request.
    pub(crate) async fn send_gated<F>(&self, build: F) -> Result<HttpResponse, ApiError>
    where
        F: FnOnce(&str) -> Result<HttpRequest, ApiError>,
    {
        self.inner
            .limiter
            .schedule(|| async move {
                let token = self.inner.tokens.ensure_token().await?;
                let request = build(&token)?;
                Ok(self.inner.transport.send(request).await?)
            })
            .await
    }

    /// [`send_gated`](Self::send_gated) followed by response decoding
    pub(crate) async fn request_json<F>(&self, build: F) -> Result<ApiResponse, ApiError>
    where
        F: FnOnce(&str) -> Result<HttpRequest, ApiError>,
    {
        let response = self.send_gated(build).await?;
        decode_response(&response)
    }

    /// Collection names: `"*"` lists every collection of the application,
    /// anything else is read as a comma separated list without a network call
    pub async fn collections(&self, which: &str) -> Result<Vec<String>, ApiError> {
        if which.trim() != "*" {
            return Ok(which
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect());
        }

        let response = self
            .request_json(|token| Ok(HttpRequest::new(Method::GET, self.endpoint().app_url(token))))
            .await?;

        let names = response
            .entities
            .first()
            .and_then(|app| app.pointer("/metadata/collections"))
            .and_then(Value::as_object)
            .map(|collections| collections.keys().cloned().collect())
            .unwrap_or_default();
        debug!("Application has collections: {:?}", names);
        Ok(names)
    }

    pub async fn fetch_all(&self, collection: &str, filter: impl Into<Filter>) -> Result<Vec<Value>, ApiError> {
        self.paginator().fetch_all(collection, filter).await
    }

    pub async fn fetch_first(&self, collection: &str, filter: impl Into<Filter>) -> Result<Option<Value>, ApiError> {
        self.paginator().fetch_first(collection, filter).await
    }

    pub async fn write(
        &self,
        operation: WriteOperation,
        collection: &str,
        items: Vec<Value>,
        options: &BatchOptions,
    ) -> Result<BatchJobResult, ApiError> {
        self.batch_writer().run(operation, collection, items, options).await
    }

    pub async fn create(&self, collection: &str, items: Vec<Value>) -> Result<Vec<Value>, ApiError> {
        Ok(self
            .write(WriteOperation::Create, collection, items, &BatchOptions::default())
            .await?
            .entities)
    }

    pub async fn update(&self, collection: &str, items: Vec<Value>) -> Result<Vec<Value>, ApiError> {
        Ok(self
            .write(WriteOperation::Update, collection, items, &BatchOptions::default())
            .await?
            .entities)
    }

    pub async fn delete(&self, collection: &str, items: Vec<Value>) -> Result<Vec<Value>, ApiError> {
        Ok(self
            .write(WriteOperation::Delete, collection, items, &BatchOptions::default())
            .await?
            .entities)
    }

    pub async fn upsert_by<S: AsRef<str>>(
        &self,
        collection: &str,
        items: Vec<Value>,
        key_props: &[S],
        options: &BatchOptions,
    ) -> Result<BatchJobResult, ApiError> {
        self.upsert_resolver().upsert_by(collection, items, key_props, options).await
    }

    pub async fn delete_by<S: AsRef<str>>(
        &self,
        collection: &str,
        items: Vec<Value>,
        key_props: &[S],
        options: &BatchOptions,
    ) -> Result<BatchJobResult, ApiError> {
        self.upsert_resolver().delete_by(collection, items, key_props, options).await
    }

    /// Raw bytes of an entity's attachment
    pub async fn get_file(&self, collection: &str, entity: &Value) -> Result<Vec<u8>, ApiError> {
        attachments::download(self, collection, entity).await
    }

    /// Export a collection to a JSON file, downloading attachments next to it
    pub async fn get_and_save(
        &self,
        collection: &str,
        filter: impl Into<Filter>,
        file: Option<PathBuf>,
        folder: Option<PathBuf>,
    ) -> Result<Vec<Value>, ApiError> {
        let export = attachments::ExportTarget::new(collection, file, folder);
        let entities = attachments::export(self, collection, filter.into(), &export).await?;
        info!(
            "Exported {} entities from '{}' to {}",
            entities.len(),
            collection,
            export.file.display()
        );
        Ok(entities)
    }
}

/// Map a raw response onto the API contract: non-2xx statuses and 2xx bodies
/// carrying `error` both become [`ApiError::Remote`]
pub(crate) fn decode_response(response: &HttpResponse) -> Result<ApiResponse, ApiError> {
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return if response.is_success() {
            Ok(ApiResponse::default())
        } else {
            Err(ApiError::Remote {
                status: response.status,
                message: format!("HTTP {}", response.status),
            })
        };
    }

    let body: ApiResponse = match response.json() {
        Ok(body) => body,
        Err(e) if response.is_success() => {
            return Err(ApiError::Decode(format!("invalid JSON body: {}", e)));
        }
        Err(_) => {
            let text = String::from_utf8_lossy(&response.body);
            return Err(ApiError::Remote {
                status: response.status,
                message: text.chars().take(200).collect(),
            });
        }
    };

    if let Some(message) = body.error_message() {
        return Err(ApiError::Remote {
            status: response.status,
            message,
        });
    }
    if !response.is_success() {
        return Err(ApiError::Remote {
            status: response.status,
            message: format!("HTTP {}", response.status),
        });
    }
    Ok(body)
}

/// Builder for [`BaasClient`]
pub struct BaasClientBuilder {
    endpoint: Option<Endpoint>,
    credentials: Option<ClientCredentials>,
    transport: Option<Arc<dyn Transport>>,
    rate_limit: RateLimitConfig,
    page_limit: usize,
}

impl BaasClientBuilder {
    pub fn new() -> Self {
        Self {
            endpoint: None,
            credentials: None,
            transport: None,
            rate_limit: RateLimitConfig::default(),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }

    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn credentials(mut self, credentials: ClientCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Replace the default reqwest transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Entities requested per page
    pub fn page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit;
        self
    }

    pub fn build(self) -> Result<BaasClient, ApiError> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| ApiError::Validation("client endpoint is not set".to_string()))?;
        let credentials = self
            .credentials
            .ok_or_else(|| ApiError::Validation("client credentials are not set".to_string()))?;
        self.rate_limit.validate().map_err(ApiError::Validation)?;
        if self.page_limit == 0 {
            return Err(ApiError::Validation("page limit must be greater than 0".to_string()));
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        Ok(BaasClient {
            inner: Arc::new(ClientInner {
                tokens: TokenManager::new(endpoint.clone(), credentials, transport.clone()),
                limiter: RateLimiter::new(self.rate_limit),
                endpoint,
                transport,
                page_limit: self.page_limit,
            }),
        })
    }
}

impl Default for BaasClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{MockTransport, json_response, test_client, token_response, is_token_request};
    use crate::api::transport::{TransportError, TransportErrorKind};
    use serde_json::json;

    #[test]
    fn test_decode_error_payload_on_success_status() {
        let response = json_response(200, json!({"error": "unauthorized", "entities": []}));
        match decode_response(&response) {
            Err(ApiError::Remote { status, message }) => {
                assert_eq!(status, 200);
                assert_eq!(message, "unauthorized");
            }
            other => panic!("expected Remote error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_non_json_failure() {
        let response = HttpResponse {
            status: 502,
            body: b"<html>Bad Gateway</html>".to_vec(),
        };
        assert!(matches!(
            decode_response(&response),
            Err(ApiError::Remote { status: 502, .. })
        ));
    }

    #[test]
    fn test_decode_empty_success_body() {
        let response = HttpResponse {
            status: 204,
            body: Vec::new(),
        };
        assert!(decode_response(&response).unwrap().entities.is_empty());
    }

    #[test]
    fn test_builder_requires_endpoint_and_credentials() {
        assert!(matches!(
            BaasClient::builder().build(),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            BaasClient::builder()
                .endpoint(Endpoint::from_base_url("https://x", "o", "a"))
                .build(),
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_collections_wildcard_lists_metadata_keys() {
        let transport = Arc::new(MockTransport::new(|request| {
            if is_token_request(request) {
                return Ok(token_response());
            }
            Ok(json_response(
                200,
                json!({"entities": [{"metadata": {"collections": {"users": {}, "devices": {}}}}]}),
            ))
        }));
        let client = test_client(transport.clone());

        let mut names = client.collections("*").await.unwrap();
        names.sort();
        assert_eq!(names, vec!["devices", "users"]);
        assert_eq!(
            transport.api_requests()[0].url,
            "https://baas.test/acme/sandbox?access_token=TOKEN"
        );
    }

    #[tokio::test]
    async fn test_collections_list_needs_no_network() {
        let transport = Arc::new(MockTransport::new(|_| {
            Err(TransportError::new(TransportErrorKind::Other, "unreachable"))
        }));
        let client = test_client(transport.clone());

        let names = client.collections(" users, devices ,").await.unwrap();
        assert_eq!(names, vec!["users", "devices"]);
        assert!(transport.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_token_refresh_is_not_rate_limited() {
        let transport = Arc::new(MockTransport::new(|request| {
            if is_token_request(request) {
                return Ok(token_response());
            }
            Ok(json_response(200, json!({"entities": []})))
        }));
        let client = test_client(transport.clone());

        client.fetch_all("users", Filter::All).await.unwrap();
        assert_eq!(transport.token_requests(), 1);
        assert_eq!(client.rate_limiter().stats().started, 1);
    }
}
