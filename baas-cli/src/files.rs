//! Local file helpers
//!
//! Paths ending in `.json` are treated as JSON documents; anything else is
//! plain text.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::api::error::ApiError;

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Parsed JSON for `.json` files, otherwise the text as a JSON string
pub async fn read(path: impl AsRef<Path>) -> Result<Value, ApiError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ApiError::local_io(path, e))?;
    if is_json(path) {
        serde_json::from_str(&text)
            .map_err(|e| ApiError::Decode(format!("invalid JSON in '{}': {}", path.display(), e)))
    } else {
        Ok(Value::String(text))
    }
}

/// Write raw bytes, replacing the file
pub async fn write(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<(), ApiError> {
    let path = path.as_ref();
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| ApiError::local_io(path, e))
}

/// Write `value` as pretty-printed JSON
pub async fn write_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<(), ApiError> {
    let path = path.as_ref();
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::Decode(format!("cannot serialize '{}': {}", path.display(), e)))?;
    write(path, text).await
}

/// Pretty JSON for `.json` paths; otherwise strings are written verbatim and
/// other values as compact JSON
pub async fn save(path: impl AsRef<Path>, value: &Value) -> Result<(), ApiError> {
    let path = path.as_ref();
    if is_json(path) {
        return write_json(path, value).await;
    }
    match value {
        Value::String(text) => write(path, text).await,
        other => write(path, other.to_string()).await,
    }
}

/// Create `dir` and all missing parents
pub async fn mkdirp(dir: impl AsRef<Path>) -> Result<(), ApiError> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ApiError::local_io(dir, e))
}
