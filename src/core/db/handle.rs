/// Query Handle Module
///
/// `QueryHandle` owns at most one session, the result of the most recent
/// successful statement, and the statement bookkeeping. No connection is
/// opened until an operation needs one.
///
/// A handle is single-owner state: every operation takes `&mut self`, and
/// the last-result slot is shared by all calls made through it. Callers that
/// need to share a handle across threads must wrap it in a lock themselves.

use crate::core::{DbError, Result};
use tracing::{debug, error, warn};

use super::connection::{ConnectionConfig, Driver, Session, SqliteDriver, SESSION_CHARSET};
use super::query::{QueryResult, Row, Value};
use super::sanitize::Sanitize;
use super::statement::{build_count, build_insert, build_update, fields, Joiner, Predicate};

/// Lazily-connecting handle for running statements against one database.
pub struct QueryHandle<D: Driver = SqliteDriver> {
    driver: D,
    config: ConnectionConfig,
    connection: Option<D::Session>,
    last_result: Option<QueryResult>,
    last_statement: Option<String>,
    last_error: Option<String>,
    statement_count: u64,
}

impl QueryHandle<SqliteDriver> {
    /// Creates a handle for a SQLite database. Does not open anything.
    pub fn new(config: ConnectionConfig) -> Self {
        QueryHandle::with_driver(SqliteDriver, config)
    }
}

impl<D: Driver> QueryHandle<D> {
    /// Creates a handle that opens sessions through `driver`.
    pub fn with_driver(driver: D, config: ConnectionConfig) -> Self {
        QueryHandle {
            driver,
            config,
            connection: None,
            last_result: None,
            last_statement: None,
            last_error: None,
            statement_count: 0,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Whether a session is currently held.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Opens a session if none is held.
    ///
    /// On failure the slot stays empty, so calling again retries.
    pub fn ensure_connected(&mut self) -> Result<&mut D::Session> {
        let session = match self.connection.take() {
            Some(session) => session,
            None => {
                let mut session = self.driver.open(&self.config)?;
                session.set_charset(SESSION_CHARSET)?;
                debug!("Connected to {:?}", self.config.database);
                session
            }
        };
        Ok(self.connection.insert(session))
    }

    /// Releases the session and the last result. Safe to call repeatedly.
    ///
    /// The statement count survives; reconnecting does not reset it.
    pub fn close(&mut self) {
        self.last_result = None;
        if let Some(session) = self.connection.take() {
            match session.close() {
                Ok(()) => debug!("Closed connection to {:?}", self.config.database),
                Err(e) => warn!("Error while closing connection to {:?}: {}", self.config.database, e),
            }
        }
    }

    /// Runs one statement and records its outcome.
    ///
    /// A failed statement leaves the previous result and the statement count
    /// untouched; only the last statement text and last error change.
    pub fn execute(&mut self, sql: &str) -> Result<&QueryResult> {
        if sql.trim().is_empty() {
            return Err(DbError::InvalidArgument("statement text must not be empty".to_string()));
        }

        let outcome = self.ensure_connected()?.run(sql);
        self.last_statement = Some(sql.to_string());

        match outcome {
            Ok(result) => {
                debug!("Executed: {}", sql);
                self.statement_count += 1;
                self.last_error = None;
                let stored: &QueryResult = self.last_result.insert(result);
                Ok(stored)
            }
            Err(message) => {
                error!("Failed query {:?}: {}", sql, message);
                self.last_error = Some(message.clone());
                Err(DbError::Query {
                    statement: sql.to_string(),
                    message,
                })
            }
        }
    }

    /// Escapes untrusted input with the session's escape routine.
    ///
    /// Opens a connection if needed: escaping depends on the session.
    pub fn sanitize<T: Sanitize>(&mut self, input: T) -> Result<T> {
        let session = self.ensure_connected()?;
        Ok(input.sanitize_with(&*session))
    }

    /// Inserts one row built from `pairs`.
    pub fn insert<I, K, V>(&mut self, table: &str, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let session = self.ensure_connected()?;
        let sql = build_insert(&*session, table, fields(pairs))?;
        self.execute(&sql)?;
        Ok(())
    }

    /// Updates the rows whose columns equal every pair in `filter`.
    ///
    /// An empty `filter` updates every row in the table.
    pub fn update<I, K, V, W, WK, WV>(&mut self, table: &str, pairs: I, filter: W) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
        W: IntoIterator<Item = (WK, WV)>,
        WK: Into<String>,
        WV: Into<Value>,
    {
        self.update_joined(table, pairs, filter, Joiner::And)
    }

    /// Like `update`, with the conditions joined by `joiner` instead of AND.
    pub fn update_joined<I, K, V, W, WK, WV>(
        &mut self,
        table: &str,
        pairs: I,
        filter: W,
        joiner: Joiner,
    ) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
        W: IntoIterator<Item = (WK, WV)>,
        WK: Into<String>,
        WV: Into<Value>,
    {
        self.run_update(table, fields(pairs), Predicate::Fields(fields(filter)), joiner)
    }

    /// Updates every row in `table`.
    pub fn update_all<I, K, V>(&mut self, table: &str, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.run_update(table, fields(pairs), Predicate::All, Joiner::And)
    }

    /// Updates the rows matched by a caller-written WHERE clause.
    ///
    /// `clause` is inserted verbatim after `WHERE` and is NOT sanitized. Never
    /// pass text that contains untrusted input. A blank clause updates every
    /// row.
    pub fn update_where_raw<I, K, V>(&mut self, table: &str, pairs: I, clause: &str) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.run_update(table, fields(pairs), Predicate::Raw(clause.to_string()), Joiner::And)
    }

    fn run_update(
        &mut self,
        table: &str,
        pairs: Vec<(String, Value)>,
        predicate: Predicate,
        joiner: Joiner,
    ) -> Result<()> {
        let unrestricted = predicate.is_unrestricted();
        let session = self.ensure_connected()?;
        let sql = build_update(&*session, table, pairs, predicate, joiner)?;
        if unrestricted {
            warn!("Updating every row of {:?}", table);
        }
        self.execute(&sql)?;
        Ok(())
    }

    fn require_result(&self) -> Result<&QueryResult> {
        self.last_result.as_ref().ok_or_else(DbError::no_query)
    }

    /// All rows of the last result set, in server order.
    pub fn rows(&self) -> Result<Vec<Row>> {
        match self.require_result()? {
            QueryResult::Rows(set) => Ok(set.to_rows()),
            QueryResult::Ack(_) => Err(DbError::State(
                "the last statement did not produce a result set".to_string(),
            )),
        }
    }

    /// Runs `sql` and returns the first column of the first row.
    ///
    /// `None` means there was no row at all; a SQL NULL is `Some(Value::Null)`.
    pub fn scalar(&mut self, sql: &str) -> Result<Option<Value>> {
        let result = self.execute(sql)?;
        Ok(result.as_rows().and_then(|set| set.first_value()).cloned())
    }

    /// Number of rows in `table`. An empty name returns 0 without a statement.
    pub fn count(&mut self, table: &str) -> Result<i64> {
        if table.trim().is_empty() {
            return Ok(0);
        }
        let value = self.scalar(&build_count(table))?;
        Ok(value.map(|v| v.to_i64()).unwrap_or(0))
    }

    /// Identifier generated by the last statement, if it was an insert.
    pub fn last_insert_id(&self) -> Result<i64> {
        self.require_result()?
            .last_insert_id()
            .ok_or_else(|| DbError::State("the last statement did not generate an id".to_string()))
    }

    /// Rows in the last result set (0 after a statement without one).
    pub fn row_count(&self) -> Result<usize> {
        Ok(self.require_result()?.row_count())
    }

    /// Rows changed by the last statement, or returned by it for a query.
    pub fn affected_rows(&self) -> Result<u64> {
        Ok(self.require_result()?.affected_rows())
    }

    pub fn last_result(&self) -> Option<&QueryResult> {
        self.last_result.as_ref()
    }

    /// Successful statements since construction.
    pub fn statement_count(&self) -> u64 {
        self.statement_count
    }

    /// The most recently attempted statement, successful or not.
    pub fn last_statement_text(&self) -> Option<&str> {
        self.last_statement.as_deref()
    }

    /// The backend message of the last statement, if it failed.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl<D: Driver> Drop for QueryHandle<D> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<D: Driver> std::fmt::Debug for QueryHandle<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryHandle")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .field("statement_count", &self.statement_count)
            .field("last_statement", &self.last_statement)
            .finish()
    }
}
