pub mod collections;
pub mod query;
pub mod write;
