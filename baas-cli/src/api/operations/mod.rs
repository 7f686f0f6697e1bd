//! Write operations
//!
//! Entity writes (create, update, delete) dispatched in batches, plus
//! natural-key resolution for updates and deletes by arbitrary fields.

pub mod batch;
pub mod operation;
pub mod upsert;

pub use batch::{BatchJobResult, BatchOptions, BatchWriter, normalize_items};
pub use operation::{OperationRules, WriteOperation};
pub use upsert::EntityUpsertResolver;
