//! Query-language fragment construction
//!
//! Only builds text; the fragment is evaluated by the remote store.

use serde_json::{Map, Value};

/// Which entities of a collection a read selects
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// No `ql` parameter
    #[default]
    All,
    /// Caller-supplied fragment, passed through untouched
    Ql(String),
    /// Equality on every pair, conjoined with `and`
    Match(Vec<(String, Value)>),
}

impl Filter {
    pub fn ql(fragment: impl Into<String>) -> Self {
        Self::Ql(fragment.into())
    }

    pub fn matching<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Match(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// The `ql` text, or `None` when nothing is filtered
    pub fn to_ql(&self) -> Option<String> {
        match self {
            Filter::All => None,
            Filter::Ql(fragment) if fragment.trim().is_empty() => None,
            Filter::Ql(fragment) => Some(fragment.clone()),
            Filter::Match(pairs) if pairs.is_empty() => None,
            Filter::Match(pairs) => Some(
                pairs
                    .iter()
                    .map(|(key, value)| format!("{}={}", key, format_value(value)))
                    .collect::<Vec<_>>()
                    .join(" and "),
            ),
        }
    }
}

/// Strings are single-quoted, everything else is emitted verbatim
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s),
        other => other.to_string(),
    }
}

impl From<&str> for Filter {
    fn from(fragment: &str) -> Self {
        Filter::Ql(fragment.to_string())
    }
}

impl From<String> for Filter {
    fn from(fragment: String) -> Self {
        Filter::Ql(fragment)
    }
}

impl From<Option<String>> for Filter {
    fn from(fragment: Option<String>) -> Self {
        fragment.map(Filter::Ql).unwrap_or_default()
    }
}

impl From<Map<String, Value>> for Filter {
    fn from(map: Map<String, Value>) -> Self {
        Filter::Match(map.into_iter().collect())
    }
}

impl From<Vec<(String, Value)>> for Filter {
    fn from(pairs: Vec<(String, Value)>) -> Self {
        Filter::Match(pairs)
    }
}
