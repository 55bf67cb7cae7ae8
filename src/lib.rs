// Core infrastructure modules
pub mod core;

// Configuration file support
pub mod config;

pub use crate::core::db::{
    ConnectionConfig, Driver, Joiner, Predicate, QueryHandle, QueryResult, Row, Sanitize, Session,
    SqliteDriver, Value,
};
pub use crate::core::{DbError, Result};

#[cfg(test)]
mod test_utils;
