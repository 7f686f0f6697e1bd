//! Error taxonomy for the orchestration layer

use std::path::PathBuf;

use super::transport::{TransportError, TransportErrorKind};

/// Terminal failure of an API call
#[derive(Debug)]
pub enum ApiError {
    /// Credential exchange failed or returned an error payload. Never retried.
    Auth(String),
    /// Network-layer failure, see [`TransportErrorKind`] for retry eligibility
    Transport(TransportError),
    /// Non-2xx status or explicit `error` payload from the remote API
    Remote { status: u16, message: String },
    /// Request could not be assembled from the given input
    Validation(String),
    /// Reading or writing a local file failed
    LocalIo {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Response body was not what the API contract promises
    Decode(String),
}

impl ApiError {
    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// Transport classification, if this is a transport failure
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            Self::Transport(err) => Some(err.kind),
            _ => None,
        }
    }

    /// Network-layer fault that a retry policy may choose to retry
    pub fn is_transient(&self) -> bool {
        self.transport_kind().is_some_and(TransportErrorKind::is_transient)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Auth(message) => write!(f, "authentication failed: {}", message),
            ApiError::Transport(err) => write!(f, "{}", err),
            ApiError::Remote { status, message } => {
                write!(f, "remote API error (HTTP {}): {}", status, message)
            }
            ApiError::Validation(message) => write!(f, "invalid request: {}", message),
            ApiError::LocalIo { path, source } => {
                write!(f, "I/O error on '{}': {}", path.display(), source)
            }
            ApiError::Decode(message) => write!(f, "unexpected response: {}", message),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Transport(err) => Some(err),
            ApiError::LocalIo { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err.kind {
            // A file the request references is a local problem, not a network one
            TransportErrorKind::LocalIo => {
                let (path, io_kind) = match err.file {
                    Some(file) => (file.path, file.io_kind),
                    None => (PathBuf::new(), std::io::ErrorKind::Other),
                };
                ApiError::LocalIo {
                    path,
                    source: std::io::Error::new(io_kind, err.message),
                }
            }
            _ => ApiError::Transport(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let err = ApiError::from(TransportError::new(TransportErrorKind::ConnectionReset, "reset"));
        assert!(err.is_transient());
        assert_eq!(err.transport_kind(), Some(TransportErrorKind::ConnectionReset));

        let err = ApiError::Remote {
            status: 400,
            message: "duplicate_unique_property_exists".to_string(),
        };
        assert!(!err.is_transient());
        assert!(!ApiError::Auth("invalid_grant".to_string()).is_transient());
    }

    #[test]
    fn test_local_io_transport_error_becomes_local_io() {
        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = ApiError::from(TransportError::local_io("scans/2024: q1.pdf", &source));
        match err {
            ApiError::LocalIo { path, source } => {
                assert_eq!(path, PathBuf::from("scans/2024: q1.pdf"));
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
                assert_eq!(source.to_string(), "access denied");
            }
            other => panic!("expected LocalIo, got {:?}", other),
        }
    }
}
