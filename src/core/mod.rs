/// Core Module
///
/// This module contains the pieces the rest of the crate is built from:
/// the error taxonomy and the database layer (drivers, values, statement
/// builders and the stateful query handle).

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{DbError, Result};
