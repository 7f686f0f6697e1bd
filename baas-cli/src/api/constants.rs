//! Field names and defaults shared by the API modules

/// Stable server-assigned identifier of an entity
pub const UUID_FIELD: &str = "uuid";

/// Caller-assigned natural name of an entity (addressable like a uuid)
pub const NAME_FIELD: &str = "name";

/// Reserved marker referencing a local file to upload as the entity's attachment.
/// Only this exact key is treated as an attachment; a plain `file` property is data.
pub const ATTACHMENT_MARKER: &str = "$file";

/// Metadata block the server attaches to entities that carry an attachment
pub const FILE_METADATA_FIELD: &str = "file-metadata";

/// Accept header used for attachment downloads when the entity has no content type
pub const DEFAULT_ATTACHMENT_CONTENT_TYPE: &str = "text/plain";

/// Default number of entities requested per page
pub const DEFAULT_PAGE_LIMIT: usize = 1000;

/// Default outbound request ceiling per minute
pub const DEFAULT_THROTTLE_PER_MINUTE: u32 = 120;

/// Window over which the throttle is measured
pub const THROTTLE_WINDOW_MS: u64 = 60_000;

/// Tokens are treated as expired this long before the server says they are
pub const TOKEN_EXPIRY_MARGIN_MS: u64 = 1_000;

/// Per-request ceiling enforced by the HTTP transport
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Connect ceiling enforced by the HTTP transport
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;

/// Extension given to downloaded attachments
pub const ATTACHMENT_FILE_EXTENSION: &str = "data";
