/// Connection Management Module
///
/// This module provides the connection configuration, the `Driver`/`Session`
/// seam the query handle talks through, and the SQLite driver.

use crate::core::{DbError, Result};
use rusqlite::{Batch, Connection, OpenFlags};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use super::query::{Acknowledgement, QueryResult, ResultSet, StatementType, Value};
use super::sanitize::{Escape, EscapeStyle};

/// Character encoding every session is switched to right after opening.
pub const SESSION_CHARSET: &str = "utf8";

/// Backend message for text that holds no statement at all.
const EMPTY_QUERY: &str = "query was empty";
/// Backend message for text that holds more than one statement.
const MULTIPLE_STATEMENTS: &str = "multiple statements are not supported";

/// Fallbacks used when neither explicit values nor environment variables are set.
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_USER: &str = "user";
const DEFAULT_PASSWORD: &str = "pass";
const DEFAULT_DATABASE: &str = "database";

/// Everything needed to open a session. Fixed once a handle is built.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    /// Database name; for SQLite this is the file path or `:memory:`
    pub database: String,
    /// Busy/socket timeout; `None` leaves the backend default
    pub timeout: Option<Duration>,
}

impl ConnectionConfig {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        ConnectionConfig {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
            timeout: None,
        }
    }

    /// Sets the busy/socket timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reads `DB_HOST`, `DB_USER`, `DB_PASS`, `DB_NAME` and `DB_TIMEOUT_SECS`,
    /// falling back to built-in defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str, default: &str| std::env::var(name).unwrap_or_else(|_| default.to_string());

        let mut config = ConnectionConfig::new(
            var("DB_HOST", DEFAULT_HOST),
            var("DB_USER", DEFAULT_USER),
            var("DB_PASS", DEFAULT_PASSWORD),
            var("DB_NAME", DEFAULT_DATABASE),
        );

        if let Ok(secs) = std::env::var("DB_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|_| DbError::Config(format!("DB_TIMEOUT_SECS is not a number: {}", secs)))?;
            config.timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Builds a config from optional parts: all four given, or none.
    ///
    /// With none given the environment defaults apply. Partial overrides are
    /// rejected rather than silently mixed with defaults.
    pub fn resolve(
        host: Option<&str>,
        user: Option<&str>,
        password: Option<&str>,
        database: Option<&str>,
    ) -> Result<Self> {
        match (host, user, password, database) {
            (Some(host), Some(user), Some(password), Some(database)) => {
                Ok(ConnectionConfig::new(host, user, password, database))
            }
            (None, None, None, None) => ConnectionConfig::from_env(),
            _ => Err(DbError::InvalidArgument(
                "host, user, password and database must be given together or not at all".to_string(),
            )),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Opens sessions against one kind of backend.
pub trait Driver {
    type Session: Session;

    /// Opens a new session. Failures are reported as `DbError::Connection`.
    fn open(&self, config: &ConnectionConfig) -> Result<Self::Session>;
}

/// A live connection to the backend.
///
/// Escaping lives on the session because it depends on the session's
/// character set.
pub trait Session: Escape + Sized {
    /// Switches the session's character encoding.
    fn set_charset(&mut self, charset: &str) -> Result<()>;

    /// Runs one statement, returning the backend's message on failure.
    fn run(&mut self, sql: &str) -> std::result::Result<QueryResult, String>;

    /// Releases the session.
    fn close(self) -> std::result::Result<(), String>;
}

/// Driver for SQLite databases via rusqlite.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    type Session = SqliteSession;

    fn open(&self, config: &ConnectionConfig) -> Result<SqliteSession> {
        debug!(
            "Opening SQLite database {:?} (host {:?}, user {:?})",
            config.database, config.host, config.user
        );

        let connection_error = |e: rusqlite::Error| DbError::Connection {
            database: config.database.clone(),
            message: e.to_string(),
        };

        let conn = Connection::open_with_flags(
            &config.database,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_URI,
        )
        .map_err(connection_error)?;

        if let Some(timeout) = config.timeout {
            conn.busy_timeout(timeout).map_err(connection_error)?;
        }

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(connection_error)?;

        // Reading the schema forces the file header to be read, so a file that
        // is not a database fails here instead of on the first statement.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(()))
            .map_err(connection_error)?;

        Ok(SqliteSession {
            conn,
            database: config.database.clone(),
        })
    }
}

/// An open SQLite connection.
#[derive(Debug)]
pub struct SqliteSession {
    conn: Connection,
    database: String,
}

impl SqliteSession {
    /// Collects every row of a prepared, row-producing statement.
    fn collect_rows(stmt: &mut rusqlite::Statement<'_>) -> rusqlite::Result<ResultSet> {
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let column_count = columns.len();

        let rows = stmt
            .query_map([], |row| {
                let mut values = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    values.push(Value::from(row.get_ref(i)?));
                }
                Ok(values)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(ResultSet::new(columns, rows))
    }
}

impl Escape for SqliteSession {
    fn escape(&self, input: &str) -> String {
        EscapeStyle::DoubledQuote.escape_literal(input)
    }
}

impl Session for SqliteSession {
    fn set_charset(&mut self, charset: &str) -> Result<()> {
        let encoding = match charset.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" | "utf8mb4" => "UTF-8",
            "utf16" | "utf-16" => "UTF-16",
            other => {
                return Err(DbError::Connection {
                    database: self.database.clone(),
                    message: format!("unsupported character set: {}", other),
                })
            }
        };

        // Only takes effect before the database file has content; harmless afterwards.
        self.conn
            .execute_batch(&format!("PRAGMA encoding = '{}';", encoding))
            .map_err(|e| DbError::Connection {
                database: self.database.clone(),
                message: e.to_string(),
            })
    }

    fn run(&mut self, sql: &str) -> std::result::Result<QueryResult, String> {
        let kind = StatementType::from_sql(sql);

        let mut batch = Batch::new(&self.conn, sql);
        let mut stmt = match batch.next().map_err(|e| e.to_string())? {
            Some(stmt) => stmt,
            None => return Err(EMPTY_QUERY.to_string()),
        };
        // Any further statement is rejected before the first one runs, even one
        // that fails to prepare.
        if !matches!(batch.next(), Ok(None)) {
            return Err(MULTIPLE_STATEMENTS.to_string());
        }

        let generated_id =
            |changed: u64| (kind.generates_id() && changed > 0).then(|| self.conn.last_insert_rowid());

        if stmt.column_count() > 0 {
            let set = Self::collect_rows(&mut stmt).map_err(|e| e.to_string())?;
            let last_insert_id = generated_id(self.conn.changes());
            return Ok(QueryResult::Rows(set.with_insert_id(last_insert_id)));
        }

        let affected_rows = stmt.execute([]).map_err(|e| e.to_string())? as u64;
        Ok(QueryResult::Ack(Acknowledgement {
            affected_rows,
            last_insert_id: generated_id(affected_rows),
        }))
    }

    fn close(self) -> std::result::Result<(), String> {
        self.conn.close().map_err(|(_, e)| e.to_string())
    }
}
