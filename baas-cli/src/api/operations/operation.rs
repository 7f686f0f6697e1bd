//! Write operation kinds and their per-kind rules

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::attachments::encode_body;
use crate::api::error::ApiError;
use crate::api::models::{Endpoint, entity_key};
use crate::api::transport::{HttpRequest, Method};

/// A write against a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOperation {
    /// POST a new entity. Never retried: a repeated create may duplicate it.
    Create,
    /// PUT onto an existing entity addressed by uuid or name
    Update,
    /// DELETE an entity addressed by uuid or name
    Delete,
}

/// Static behaviour of an operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationRules {
    /// Safe to re-issue after a transient network failure
    pub retryable: bool,
    /// Target URL includes the entity's uuid or name
    pub addresses_entity: bool,
    pub sends_body: bool,
}

impl WriteOperation {
    pub const ALL: [WriteOperation; 3] = [Self::Create, Self::Update, Self::Delete];

    pub const fn rules(self) -> OperationRules {
        match self {
            Self::Create => OperationRules {
                retryable: false,
                addresses_entity: false,
                sends_body: true,
            },
            Self::Update => OperationRules {
                retryable: true,
                addresses_entity: true,
                sends_body: true,
            },
            Self::Delete => OperationRules {
                retryable: true,
                addresses_entity: true,
                sends_body: false,
            },
        }
    }

    /// Get the HTTP method for this operation
    pub fn http_method(self) -> Method {
        match self {
            Self::Create => Method::POST,
            Self::Update => Method::PUT,
            Self::Delete => Method::DELETE,
        }
    }

    pub fn allows_retry(self) -> bool {
        self.rules().retryable
    }

    /// Get the operation type as a string
    pub fn operation_type(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// The operation actually issued for `item`. An update of an entity with
    /// neither uuid nor name cannot be addressed, so it becomes a create.
    pub fn effective_for(self, item: &Value) -> Self {
        match self {
            Self::Update if entity_key(item).is_none() => Self::Create,
            other => other,
        }
    }

    /// Assemble the request for one item
    pub fn build_request(
        self,
        endpoint: &Endpoint,
        collection: &str,
        item: &Value,
        token: &str,
    ) -> Result<HttpRequest, ApiError> {
        let rules = self.rules();
        let url = if rules.addresses_entity {
            let key = entity_key(item).ok_or_else(|| {
                ApiError::Validation(format!(
                    "cannot {} an entity of '{}' without uuid or name",
                    self.operation_type(),
                    collection
                ))
            })?;
            endpoint.entity_url(collection, key, token)
        } else {
            endpoint.collection_url(collection, token)
        };

        let request = HttpRequest::new(self.http_method(), url);
        if rules.sends_body {
            Ok(request.body(encode_body(item)?))
        } else {
            Ok(request)
        }
    }
}

impl std::fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.operation_type())
    }
}

impl FromStr for WriteOperation {
    type Err = String;

    /// Accepts operation names and their HTTP verbs
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" | "post" => Ok(Self::Create),
            "update" | "put" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!(
                "unknown operation '{}' (expected create, update or delete)",
                other
            )),
        }
    }
}
