//! Natural-key writes
//!
//! The remote store only addresses entities by uuid or name. To update or
//! delete by any other key, each item is first looked up by its key
//! properties; a unique match lends the item its uuid. All lookups finish
//! before a single batched write is issued for the whole list.

use futures::future::try_join_all;
use log::{debug, info, warn};
use serde_json::Value;

use super::batch::{BatchJobResult, BatchOptions};
use super::operation::WriteOperation;
use crate::api::client::BaasClient;
use crate::api::constants::UUID_FIELD;
use crate::api::error::ApiError;
use crate::api::models::entity_key;
use crate::api::query::Filter;

pub struct EntityUpsertResolver<'a> {
    client: &'a BaasClient,
}

impl<'a> EntityUpsertResolver<'a> {
    pub fn new(client: &'a BaasClient) -> Self {
        Self { client }
    }

    /// Update items matched by `key_props`, creating those without a unique match
    pub async fn upsert_by<S: AsRef<str>>(
        &self,
        collection: &str,
        items: Vec<Value>,
        key_props: &[S],
        options: &BatchOptions,
    ) -> Result<BatchJobResult, ApiError> {
        if items.is_empty() {
            return Ok(BatchJobResult::default());
        }
        let items = self.resolve_identifiers(collection, items, key_props).await?;
        self.client
            .write(WriteOperation::Update, collection, items, options)
            .await
    }

    /// Delete items matched by `key_props`. Every item must end up addressable.
    pub async fn delete_by<S: AsRef<str>>(
        &self,
        collection: &str,
        items: Vec<Value>,
        key_props: &[S],
        options: &BatchOptions,
    ) -> Result<BatchJobResult, ApiError> {
        if items.is_empty() {
            return Ok(BatchJobResult::default());
        }
        let items = self.resolve_identifiers(collection, items, key_props).await?;
        let unresolved = items.iter().filter(|item| entity_key(item).is_none()).count();
        if unresolved > 0 {
            return Err(ApiError::Validation(format!(
                "{} item(s) of '{}' matched no single entity and have no uuid or name",
                unresolved, collection
            )));
        }
        self.client
            .write(WriteOperation::Delete, collection, items, options)
            .await
    }

    /// Copy the uuid of each item's unique match onto the item.
    /// Lookups run concurrently; the first failing lookup fails the call.
    pub async fn resolve_identifiers<S: AsRef<str>>(
        &self,
        collection: &str,
        mut items: Vec<Value>,
        key_props: &[S],
    ) -> Result<Vec<Value>, ApiError> {
        if key_props.is_empty() {
            return Err(ApiError::Validation("at least one key property is required".to_string()));
        }

        let lookups = items.iter().map(|item| self.lookup(collection, item, key_props));
        let matches = try_join_all(lookups).await?;

        let mut resolved = 0;
        for (item, uuid) in items.iter_mut().zip(matches) {
            if let (Some(uuid), Value::Object(fields)) = (uuid, item) {
                fields.insert(UUID_FIELD.to_string(), Value::String(uuid));
                resolved += 1;
            }
        }
        info!(
            "Resolved {}/{} item(s) of '{}' by {}",
            resolved,
            items.len(),
            collection,
            key_props.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
        );
        Ok(items)
    }

    /// uuid of the single entity whose key properties equal the item's
    async fn lookup<S: AsRef<str>>(
        &self,
        collection: &str,
        item: &Value,
        key_props: &[S],
    ) -> Result<Option<String>, ApiError> {
        let mut pairs = Vec::with_capacity(key_props.len());
        for prop in key_props {
            let prop = prop.as_ref();
            match item.get(prop) {
                Some(value) if !value.is_null() => pairs.push((prop.to_string(), value.clone())),
                _ => {
                    warn!("Item in '{}' has no '{}'; skipping lookup", collection, prop);
                    return Ok(None);
                }
            }
        }

        let found = self.client.fetch_all(collection, Filter::Match(pairs)).await?;
        match found.as_slice() {
            [only] => Ok(only.get(UUID_FIELD).and_then(Value::as_str).map(str::to_string)),
            other => {
                debug!("Lookup in '{}' matched {} entities; left unresolved", collection, other.len());
                Ok(None)
            }
        }
    }
}
