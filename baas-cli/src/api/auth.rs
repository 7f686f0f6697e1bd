//! Client-credentials token management
//!
//! A single bearer token is cached per client. The record is swapped
//! atomically with [`ArcSwapOption`]; concurrent callers that find it expired
//! may both refresh, and whichever stores last wins. Both tokens are valid.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use log::{debug, info};
use tokio::time::Instant;

use super::constants::TOKEN_EXPIRY_MARGIN_MS;
use super::error::ApiError;
use super::models::{AccessToken, Endpoint, TokenResponse};
use super::transport::{HttpRequest, Method, RequestBody, Transport};

/// OAuth2 client credentials
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

/// Owns the cached access token and refreshes it on demand
pub struct TokenManager {
    endpoint: Endpoint,
    credentials: ClientCredentials,
    transport: Arc<dyn Transport>,
    cached: ArcSwapOption<AccessToken>,
}

impl TokenManager {
    pub fn new(endpoint: Endpoint, credentials: ClientCredentials, transport: Arc<dyn Transport>) -> Self {
        Self {
            endpoint,
            credentials,
            transport,
            cached: ArcSwapOption::empty(),
        }
    }

    /// Return the cached token if still valid, otherwise exchange credentials for a new one.
    /// Does not retry; a failed exchange surfaces as [`ApiError::Auth`].
    pub async fn ensure_token(&self) -> Result<String, ApiError> {
        if let Some(token) = &*self.cached.load() {
            if token.is_valid() {
                return Ok(token.value.clone());
            }
            debug!("Cached access token expired, refreshing");
        }
        self.refresh().await
    }

    /// Unconditionally exchange credentials and replace the cached token
    pub async fn refresh(&self) -> Result<String, ApiError> {
        let request = HttpRequest::new(Method::POST, self.endpoint.token_url()).body(RequestBody::Form(vec![
            ("grant_type".to_string(), "client_credentials".to_string()),
            ("client_id".to_string(), self.credentials.client_id.clone()),
            ("client_secret".to_string(), self.credentials.client_secret.clone()),
        ]));

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ApiError::Auth(format!("token request failed: {}", e)))?;

        let body: TokenResponse = response.json().map_err(|e| {
            ApiError::Auth(format!(
                "token endpoint returned HTTP {} with an unreadable body: {}",
                response.status, e
            ))
        })?;

        if let Some(error) = body.error {
            let message = match body.error_description {
                Some(description) => format!("{}: {}", error, description),
                None => error,
            };
            return Err(ApiError::Auth(message));
        }
        if !response.is_success() {
            return Err(ApiError::Auth(format!(
                "token endpoint returned HTTP {}",
                response.status
            )));
        }

        let value = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Auth("token response has no access_token".to_string()))?;

        let ttl = Duration::from_secs(body.expires_in.unwrap_or(0));
        let expires_at = Instant::now() + ttl.saturating_sub(Duration::from_millis(TOKEN_EXPIRY_MARGIN_MS));

        self.cached.store(Some(Arc::new(AccessToken {
            value: value.clone(),
            expires_at,
        })));
        info!("Obtained access token valid for {}s", ttl.as_secs());

        Ok(value)
    }

    /// Currently cached token, valid or not
    pub fn cached(&self) -> Option<Arc<AccessToken>> {
        self.cached.load_full()
    }

    /// Drop the cached token so the next call refreshes
    pub fn invalidate(&self) {
        self.cached.store(None);
    }
}
