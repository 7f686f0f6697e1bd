//! Entity attachments: multipart upload encoding, download and collection export
//!
//! An entity has at most one attachment. On writes it is referenced by the
//! `$file` marker holding a local path; on reads the server flags it with a
//! `file-metadata` block.

use std::path::PathBuf;

use futures::future::try_join_all;
use log::debug;
use serde_json::{Map, Value};

use super::client::{BaasClient, decode_response};
use super::constants::{
    ATTACHMENT_FILE_EXTENSION, ATTACHMENT_MARKER, DEFAULT_ATTACHMENT_CONTENT_TYPE, FILE_METADATA_FIELD, UUID_FIELD,
};
use super::error::ApiError;
use super::models::entity_key;
use super::query::Filter;
use super::transport::{FormField, HttpRequest, Method, RequestBody};
use crate::files;

/// Multipart field carrying the attachment bytes
const ATTACHMENT_FORM_FIELD: &str = "file";

/// Request body for a create or update.
///
/// With a non-empty `$file` path the entity is sent as multipart: string
/// fields as-is, every other field JSON-encoded, and the file streamed from
/// disk. A null or empty marker is dropped and the rest sent as JSON.
pub fn encode_body(item: &Value) -> Result<RequestBody, ApiError> {
    let Some(fields) = item.as_object() else {
        return Ok(RequestBody::Json(item.clone()));
    };

    match fields.get(ATTACHMENT_MARKER) {
        None => Ok(RequestBody::Json(item.clone())),
        Some(Value::Null) => Ok(RequestBody::Json(Value::Object(without_marker(fields)))),
        Some(Value::String(path)) if path.is_empty() => Ok(RequestBody::Json(Value::Object(without_marker(fields)))),
        Some(Value::String(path)) => {
            let mut form: Vec<FormField> = fields
                .iter()
                .filter(|(name, _)| name.as_str() != ATTACHMENT_MARKER)
                .map(|(name, value)| FormField::Text {
                    name: name.clone(),
                    value: match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    },
                })
                .collect();
            form.push(FormField::File {
                name: ATTACHMENT_FORM_FIELD.to_string(),
                path: PathBuf::from(path),
            });
            Ok(RequestBody::Multipart(form))
        }
        Some(other) => Err(ApiError::Validation(format!(
            "'{}' must be a file path, got {}",
            ATTACHMENT_MARKER, other
        ))),
    }
}

fn without_marker(fields: &Map<String, Value>) -> Map<String, Value> {
    let mut fields = fields.clone();
    fields.remove(ATTACHMENT_MARKER);
    fields
}

fn has_attachment(entity: &Value) -> bool {
    entity.get(FILE_METADATA_FIELD).is_some_and(|m| !m.is_null())
}

/// Fetch the raw attachment bytes of `entity`, asking for its recorded content type
pub async fn download(client: &BaasClient, collection: &str, entity: &Value) -> Result<Vec<u8>, ApiError> {
    let key = entity_key(entity).ok_or_else(|| {
        ApiError::Validation(format!(
            "cannot download an attachment from '{}' without uuid or name",
            collection
        ))
    })?;
    let accept = entity
        .get(FILE_METADATA_FIELD)
        .and_then(|m| m.get("content-type"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_ATTACHMENT_CONTENT_TYPE);

    let endpoint = client.endpoint();
    let response = client
        .send_gated(|token| {
            Ok(HttpRequest::new(Method::GET, endpoint.entity_url(collection, key, token)).header("Accept", accept))
        })
        .await?;

    if !response.is_success() {
        decode_response(&response)?;
        return Err(ApiError::Remote {
            status: response.status,
            message: format!("HTTP {}", response.status),
        });
    }
    debug!("Downloaded {} byte attachment of {}/{}", response.body.len(), collection, key);
    Ok(response.body)
}

/// Where an export lands on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    /// Pretty-printed JSON array of the exported entities
    pub file: PathBuf,
    /// Directory receiving `{uuid}.data` attachment files
    pub folder: PathBuf,
}

impl ExportTarget {
    /// Defaults: `{collection}.json`, and the file path without its extension plus `_data`
    pub fn new(collection: &str, file: Option<PathBuf>, folder: Option<PathBuf>) -> Self {
        let file = file.unwrap_or_else(|| PathBuf::from(format!("{}.json", collection)));
        let folder = folder.unwrap_or_else(|| {
            let mut folder = file.with_extension("").into_os_string();
            folder.push("_data");
            PathBuf::from(folder)
        });
        Self { file, folder }
    }

    fn attachment_path(&self, uuid: &str) -> PathBuf {
        self.folder.join(format!("{}.{}", uuid, ATTACHMENT_FILE_EXTENSION))
    }
}

/// Read every matching entity, save attachments into the target folder and
/// write the entities to the target file. Downloaded entities get `$file`
/// pointing at the saved attachment in place of their `file-metadata`.
pub async fn export(
    client: &BaasClient,
    collection: &str,
    filter: Filter,
    target: &ExportTarget,
) -> Result<Vec<Value>, ApiError> {
    let mut entities = client.fetch_all(collection, filter).await?;

    if entities.iter().any(has_attachment) {
        files::mkdirp(&target.folder).await?;
    }

    let downloads = entities
        .iter()
        .enumerate()
        .filter(|(_, entity)| has_attachment(entity))
        .map(|(index, entity)| save_attachment(client, collection, entity, target, index));
    let saved = try_join_all(downloads).await?;

    for (index, path) in saved {
        if let Value::Object(fields) = &mut entities[index] {
            fields.remove(FILE_METADATA_FIELD);
            fields.insert(
                ATTACHMENT_MARKER.to_string(),
                Value::String(path.to_string_lossy().into_owned()),
            );
        }
    }

    files::save(&target.file, &Value::Array(entities.clone())).await?;
    Ok(entities)
}

async fn save_attachment(
    client: &BaasClient,
    collection: &str,
    entity: &Value,
    target: &ExportTarget,
    index: usize,
) -> Result<(usize, PathBuf), ApiError> {
    let uuid = entity.get(UUID_FIELD).and_then(Value::as_str).ok_or_else(|| {
        ApiError::Validation(format!("entity of '{}' with an attachment has no uuid", collection))
    })?;
    let bytes = download(client, collection, entity).await?;
    let path = target.attachment_path(uuid);
    files::write(&path, &bytes).await?;
    Ok((index, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{MockTransport, entities_response, is_token_request, test_client, token_response};
    use crate::api::transport::HttpResponse;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_plain_entity_is_json() {
        let item = json!({"name": "jane", "file": "not-an-attachment"});
        assert_eq!(encode_body(&item).unwrap(), RequestBody::Json(item));
    }

    #[test]
    fn test_marker_becomes_multipart_with_stringified_fields() {
        let item = json!({"name": "logo", "size": 12, "tags": ["a"], "$file": "logo.png"});
        let RequestBody::Multipart(fields) = encode_body(&item).unwrap() else {
            panic!("expected multipart body");
        };

        assert!(fields.contains(&FormField::Text {
            name: "name".to_string(),
            value: "logo".to_string()
        }));
        assert!(fields.contains(&FormField::Text {
            name: "size".to_string(),
            value: "12".to_string()
        }));
        assert!(fields.contains(&FormField::Text {
            name: "tags".to_string(),
            value: "[\"a\"]".to_string()
        }));
        assert!(fields.contains(&FormField::File {
            name: "file".to_string(),
            path: PathBuf::from("logo.png")
        }));
        assert_eq!(fields.len(), 4);
    }

    #[test]
    fn test_empty_marker_is_dropped() {
        assert_eq!(
            encode_body(&json!({"name": "x", "$file": ""})).unwrap(),
            RequestBody::Json(json!({"name": "x"}))
        );
        assert_eq!(
            encode_body(&json!({"name": "x", "$file": null})).unwrap(),
            RequestBody::Json(json!({"name": "x"}))
        );
    }

    #[test]
    fn test_non_string_marker_is_rejected() {
        assert!(matches!(
            encode_body(&json!({"$file": 42})),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_export_target_defaults() {
        let target = ExportTarget::new("users", None, None);
        assert_eq!(target.file, PathBuf::from("users.json"));
        assert_eq!(target.folder, PathBuf::from("users_data"));

        let target = ExportTarget::new("users", Some(PathBuf::from("out/all.json")), None);
        assert_eq!(target.folder, PathBuf::from("out/all_data"));
        assert_eq!(target.attachment_path("U1"), PathBuf::from("out/all_data/U1.data"));
    }

    #[tokio::test]
    async fn test_download_uses_recorded_content_type() {
        let transport = Arc::new(MockTransport::new(|request| {
            if is_token_request(request) {
                return Ok(token_response());
            }
            Ok(HttpResponse {
                status: 200,
                body: b"PNGDATA".to_vec(),
            })
        }));
        let client = test_client(transport.clone());

        let entity = json!({"uuid": "U1", "file-metadata": {"content-type": "image/png"}});
        let bytes = client.get_file("assets", &entity).await.unwrap();
        assert_eq!(bytes, b"PNGDATA");

        let plain = client.get_file("assets", &json!({"name": "readme"})).await.unwrap();
        assert_eq!(plain, b"PNGDATA");

        let requests = transport.api_requests();
        assert_eq!(requests[0].headers, vec![("Accept".to_string(), "image/png".to_string())]);
        assert!(requests[0].url.contains("/assets/U1?"));
        assert_eq!(requests[1].headers, vec![("Accept".to_string(), "text/plain".to_string())]);
    }

    #[tokio::test]
    async fn test_export_saves_attachments_and_json() {
        let transport = Arc::new(MockTransport::new(|request| {
            if is_token_request(request) {
                return Ok(token_response());
            }
            if request.url.contains("/assets/A1?") {
                return Ok(HttpResponse {
                    status: 200,
                    body: b"attachment".to_vec(),
                });
            }
            Ok(entities_response(vec![
                json!({"uuid": "P1", "name": "plain"}),
                json!({"uuid": "A1", "file-metadata": {"content-type": "text/csv"}}),
            ]))
        }));
        let client = test_client(transport);
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("assets.json");

        let entities = client
            .get_and_save("assets", Filter::All, Some(file.clone()), None)
            .await
            .unwrap();

        let saved = dir.path().join("assets_data").join("A1.data");
        assert_eq!(std::fs::read(&saved).unwrap(), b"attachment");
        assert_eq!(entities[0], json!({"uuid": "P1", "name": "plain"}));
        assert_eq!(entities[1]["$file"], json!(saved.to_string_lossy()));
        assert!(entities[1].get("file-metadata").is_none());

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
        assert_eq!(written, Value::Array(entities));
    }

    #[tokio::test]
    async fn test_export_without_attachments_creates_no_folder() {
        let transport = Arc::new(MockTransport::new(|request| {
            if is_token_request(request) {
                return Ok(token_response());
            }
            Ok(entities_response(vec![json!({"uuid": "P1"})]))
        }));
        let client = test_client(transport);
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("users.json");

        client.get_and_save("users", Filter::All, Some(file.clone()), None).await.unwrap();

        assert!(file.exists());
        assert!(!dir.path().join("users_data").exists());
    }
}
