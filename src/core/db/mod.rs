/// Database Module
///
/// This module provides the database access layer, organized into focused
/// submodules.
///
/// ## Architecture
///
/// - **Connection** (`connection.rs`): the `Driver`/`Session` seam and the SQLite driver
/// - **Values and results** (`query.rs`): `Value`, `Row`, `QueryResult`, statement classification
/// - **Sanitization** (`sanitize.rs`): session-aware escaping of untrusted input
/// - **Statement builders** (`statement.rs`): INSERT/UPDATE text generation
/// - **Query handle** (`handle.rs`): the lazily-connecting stateful handle
///
/// ## Error Handling
///
/// All database operations use the crate-wide `DbError` type.
pub mod connection;
pub mod handle;
pub mod query;
pub mod sanitize;
pub mod statement;

pub use connection::*;
pub use handle::*;
pub use query::*;
pub use sanitize::*;
pub use statement::*;
