//! HTTP transport boundary
//!
//! Every network call made by the orchestration layer goes through the
//! [`Transport`] trait: one request in, one response (or one classified
//! [`TransportError`]) out. [`ReqwestTransport`] is the production
//! implementation; tests plug in scripted doubles.

use std::error::Error as StdError;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
pub use reqwest::Method;
use serde::de::DeserializeOwned;

use super::constants::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};

/// Machine code of a transport failure, used for retry classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Host name could not be resolved
    DnsNotFound,
    /// Connection could not be established in time
    ConnectTimeout,
    /// Connection was established but the response did not arrive in time
    SocketTimeout,
    /// Peer reset or aborted the connection
    ConnectionReset,
    /// A local file referenced by the request could not be read
    LocalIo,
    /// Anything else (TLS, protocol, body decoding, ...)
    Other,
}

impl TransportErrorKind {
    /// Network-layer faults that are expected to resolve themselves on retry
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::DnsNotFound | Self::ConnectTimeout | Self::SocketTimeout | Self::ConnectionReset
        )
    }

    /// Conventional socket error code, as written to trace files
    pub fn code(self) -> &'static str {
        match self {
            Self::DnsNotFound => "ENOTFOUND",
            Self::ConnectTimeout => "ETIMEDOUT",
            Self::SocketTimeout => "ESOCKETTIMEDOUT",
            Self::ConnectionReset => "ECONNRESET",
            Self::LocalIo => "EIO",
            Self::Other => "EOTHER",
        }
    }

    /// Best-effort classification from an error message
    fn from_message(message: &str) -> Option<Self> {
        let lower = message.to_lowercase();
        if lower.contains("dns error")
            || lower.contains("failed to lookup address")
            || lower.contains("name or service not known")
            || lower.contains("no such host")
        {
            Some(Self::DnsNotFound)
        } else if lower.contains("connection reset") || lower.contains("connection aborted") {
            Some(Self::ConnectionReset)
        } else {
            None
        }
    }
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::DnsNotFound => "DNS lookup failed",
            Self::ConnectTimeout => "connect timeout",
            Self::SocketTimeout => "socket timeout",
            Self::ConnectionReset => "connection reset",
            Self::LocalIo => "local I/O error",
            Self::Other => "transport error",
        };
        f.write_str(label)
    }
}

/// The local file behind a [`TransportErrorKind::LocalIo`] failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileFault {
    pub path: PathBuf,
    pub io_kind: std::io::ErrorKind,
}

/// A failed HTTP exchange, classified by [`TransportErrorKind`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    /// Set only for [`TransportErrorKind::LocalIo`]
    pub file: Option<LocalFileFault>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            file: None,
        }
    }

    /// A file referenced by the request could not be read
    pub fn local_io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self {
            kind: TransportErrorKind::LocalIo,
            message: err.to_string(),
            file: Some(LocalFileFault {
                path: path.into(),
                io_kind: err.kind(),
            }),
        }
    }

    /// Classify a reqwest failure by walking its source chain
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = classify_reqwest(&err);
        Self::new(kind, err.to_string())
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.file {
            Some(file) => write!(
                f,
                "{} ({}): {}: {}",
                self.kind,
                self.kind.code(),
                file.path.display(),
                self.message
            ),
            None => write!(f, "{} ({}): {}", self.kind, self.kind.code(), self.message),
        }
    }
}

impl std::error::Error for TransportError {}

fn classify_reqwest(err: &reqwest::Error) -> TransportErrorKind {
    if err.is_timeout() {
        return if err.is_connect() {
            TransportErrorKind::ConnectTimeout
        } else {
            TransportErrorKind::SocketTimeout
        };
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe => return TransportErrorKind::ConnectionReset,
                std::io::ErrorKind::TimedOut if err.is_connect() => {
                    return TransportErrorKind::ConnectTimeout;
                }
                std::io::ErrorKind::TimedOut => return TransportErrorKind::SocketTimeout,
                _ => {}
            }
        }
        if let Some(kind) = TransportErrorKind::from_message(&cause.to_string()) {
            return kind;
        }
        source = cause.source();
    }

    TransportErrorKind::from_message(&err.to_string()).unwrap_or(TransportErrorKind::Other)
}

/// A single multipart form field
#[derive(Debug, Clone, PartialEq)]
pub enum FormField {
    Text { name: String, value: String },
    /// Streamed from disk when the request is sent
    File { name: String, path: PathBuf },
}

/// Request payload
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    Multipart(Vec<FormField>),
}

/// One outbound HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }
}

/// Raw response: status plus the full body
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// Issues one HTTP request
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport with fixed per-request and connect timeouts
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeouts(
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    pub fn with_timeouts(timeout: Duration, connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(concat!("baas-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TransportError::from_reqwest)?;
        Ok(Self { client })
    }
}

async fn build_multipart(fields: Vec<FormField>) -> Result<reqwest::multipart::Form, TransportError> {
    let mut form = reqwest::multipart::Form::new();
    for field in fields {
        form = match field {
            FormField::Text { name, value } => form.text(name, value),
            FormField::File { name, path } => {
                let file = tokio::fs::File::open(&path)
                    .await
                    .map_err(|e| TransportError::local_io(&path, &e))?;
                let mut part = reqwest::multipart::Part::stream(reqwest::Body::from(file));
                if let Some(file_name) = path.file_name() {
                    part = part.file_name(file_name.to_string_lossy().into_owned());
                }
                form.part(name, part)
            }
        };
    }
    Ok(form)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!("{} {}", request.method, redact_token(&request.url));

        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart(fields) => builder.multipart(build_multipart(fields).await?),
        };

        let response = builder.send().await.map_err(TransportError::from_reqwest)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(TransportError::from_reqwest)?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Strip the access token from a URL before it reaches the logs
pub(crate) fn redact_token(url: &str) -> String {
    match url.find("access_token=") {
        Some(start) => {
            let value_start = start + "access_token=".len();
            let value_end = url[value_start..]
                .find('&')
                .map(|i| value_start + i)
                .unwrap_or(url.len());
            format!("{}***{}", &url[..value_start], &url[value_end..])
        }
        None => url.to_string(),
    }
}
