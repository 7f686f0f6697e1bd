//! Wire models and addressing for the entity-store API

use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;

use super::constants::{NAME_FIELD, UUID_FIELD};

/// Cached bearer credential. Replaced wholesale on refresh, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    /// Already includes the safety margin
    pub expires_at: Instant,
}

impl AccessToken {
    pub fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Body of `POST /{org}/{app}/token`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    /// Lifetime in seconds, as OAuth2 defines it. Older Usergrid SDKs added
    /// this value to a millisecond clock; here it is never read as milliseconds.
    pub expires_in: Option<u64>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Body of every collection/entity endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub entities: Vec<Value>,
    pub cursor: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl ApiResponse {
    /// Human readable error carried by the payload, if any
    pub fn error_message(&self) -> Option<String> {
        match (&self.error_description, &self.error) {
            (Some(description), _) => Some(description.clone()),
            (None, Some(error)) => Some(error.clone()),
            (None, None) => None,
        }
    }
}

/// One page of a paginated read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub entities: Vec<Value>,
    /// Continuation token; `None` ends the stream
    pub cursor: Option<String>,
}

impl From<ApiResponse> for QueryPage {
    fn from(response: ApiResponse) -> Self {
        Self {
            entities: response.entities,
            cursor: response.cursor.filter(|c| !c.is_empty()),
        }
    }
}

/// Where an application lives: `{scheme}://{host}/{org}/{app}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: String,
    org: String,
    app: String,
}

impl Endpoint {
    pub fn new(scheme: &str, host: &str, org: impl Into<String>, app: impl Into<String>) -> Self {
        Self::from_base_url(format!("{}://{}", scheme, host), org, app)
    }

    /// Build from a full base URL such as `http://127.0.0.1:8080`
    pub fn from_base_url(base_url: impl Into<String>, org: impl Into<String>, app: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            org: org.into(),
            app: app.into(),
        }
    }

    pub fn app_root(&self) -> String {
        format!("{}/{}/{}", self.base_url, self.org, self.app)
    }

    pub fn token_url(&self) -> String {
        format!("{}/token", self.app_root())
    }

    pub fn app_url(&self, token: &str) -> String {
        format!("{}?access_token={}", self.app_root(), token)
    }

    pub fn collection_url(&self, collection: &str, token: &str) -> String {
        format!(
            "{}/{}?access_token={}",
            self.app_root(),
            urlencoding::encode(collection),
            token
        )
    }

    pub fn entity_url(&self, collection: &str, key: &str, token: &str) -> String {
        format!(
            "{}/{}/{}?access_token={}",
            self.app_root(),
            urlencoding::encode(collection),
            urlencoding::encode(key),
            token
        )
    }
}

/// The address of an entity: its uuid, falling back to its name
pub fn entity_key(entity: &Value) -> Option<&str> {
    [UUID_FIELD, NAME_FIELD]
        .iter()
        .filter_map(|field| entity.get(*field).and_then(Value::as_str))
        .find(|key| !key.is_empty())
}
