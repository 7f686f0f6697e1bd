//! Query Module
//!
//! Builds query-language fragments from caller input and reads collections
//! page by page, following the server's continuation cursor.

pub mod filters;
pub mod paginator;

pub use filters::Filter;
pub use paginator::QueryPaginator;
