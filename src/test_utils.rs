/// # Test Utilities Module
///
/// A scripted driver for exercising `QueryHandle` without a real backend.
///
/// The driver and every session it opens share one `Script`, so a test can
/// keep a clone of the driver and inspect what the handle did: how often it
/// connected and closed, which statements it sent, which charset it set.
/// Sessions escape with the backslash style so generated SQL looks the way
/// a MySQL-dialect backend would see it.

use crate::core::db::{
    Acknowledgement, ConnectionConfig, Driver, Escape, EscapeStyle, QueryHandle, QueryResult,
    ResultSet, Session, StatementType, Value,
};
use crate::core::{DbError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub type ScriptedHandle = QueryHandle<ScriptedDriver>;

#[derive(Debug, Default)]
struct Script {
    responses: HashMap<String, std::result::Result<QueryResult, String>>,
    failing_opens: usize,
    opens: usize,
    closes: usize,
    charsets: Vec<String>,
    statements: Vec<String>,
    next_id: i64,
}

/// Driver whose sessions answer from a table of canned responses.
///
/// Statements without a canned response succeed with an acknowledgement;
/// inserts among them get increasing ids starting at 1.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    script: Arc<Mutex<Script>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` connection attempts fail.
    pub fn fail_opens(self, n: usize) -> Self {
        self.script.lock().unwrap().failing_opens = n;
        self
    }

    /// Answers `sql` with a result set.
    pub fn respond(&self, sql: &str, columns: Vec<&str>, rows: Vec<Vec<Value>>) {
        let set = ResultSet::new(columns.into_iter().map(String::from).collect(), rows);
        self.script
            .lock()
            .unwrap()
            .responses
            .insert(sql.to_string(), Ok(QueryResult::Rows(set)));
    }

    /// Makes `sql` fail with `message`.
    pub fn reject(&self, sql: &str, message: &str) {
        self.script
            .lock()
            .unwrap()
            .responses
            .insert(sql.to_string(), Err(message.to_string()));
    }

    pub fn open_count(&self) -> usize {
        self.script.lock().unwrap().opens
    }

    pub fn close_count(&self) -> usize {
        self.script.lock().unwrap().closes
    }

    pub fn charsets(&self) -> Vec<String> {
        self.script.lock().unwrap().charsets.clone()
    }

    /// Every statement sent to a session, in order.
    pub fn statements(&self) -> Vec<String> {
        self.script.lock().unwrap().statements.clone()
    }
}

impl Driver for ScriptedDriver {
    type Session = ScriptedSession;

    fn open(&self, config: &ConnectionConfig) -> Result<ScriptedSession> {
        let mut script = self.script.lock().unwrap();
        script.opens += 1;
        if script.failing_opens > 0 {
            script.failing_opens -= 1;
            return Err(DbError::Connection {
                database: config.database.clone(),
                message: format!("Access denied for user '{}'@'{}'", config.user, config.host),
            });
        }
        Ok(ScriptedSession {
            script: Arc::clone(&self.script),
        })
    }
}

#[derive(Debug)]
pub struct ScriptedSession {
    script: Arc<Mutex<Script>>,
}

impl Escape for ScriptedSession {
    fn escape(&self, input: &str) -> String {
        EscapeStyle::Backslash.escape_literal(input)
    }
}

impl Session for ScriptedSession {
    fn set_charset(&mut self, charset: &str) -> Result<()> {
        self.script.lock().unwrap().charsets.push(charset.to_string());
        Ok(())
    }

    fn run(&mut self, sql: &str) -> std::result::Result<QueryResult, String> {
        let mut script = self.script.lock().unwrap();
        script.statements.push(sql.to_string());

        if let Some(response) = script.responses.get(sql) {
            return response.clone();
        }

        let last_insert_id = if StatementType::from_sql(sql).generates_id() {
            script.next_id += 1;
            Some(script.next_id)
        } else {
            None
        };

        Ok(QueryResult::Ack(Acknowledgement {
            affected_rows: 1,
            last_insert_id,
        }))
    }

    fn close(self) -> std::result::Result<(), String> {
        self.script.lock().unwrap().closes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_responses() {
        let driver = ScriptedDriver::new();
        driver.respond("SELECT 1", vec!["1"], vec![vec![Value::Integer(1)]]);
        driver.reject("BROKEN", "syntax error");

        let config = ConnectionConfig::new("h", "u", "p", "d");
        let mut session = driver.open(&config).unwrap();

        assert_eq!(session.run("SELECT 1").unwrap().row_count(), 1);
        assert_eq!(session.run("BROKEN").unwrap_err(), "syntax error");

        let first = session.run("INSERT INTO t VALUES (1)").unwrap();
        let second = session.run("INSERT INTO t VALUES (2)").unwrap();
        assert_eq!(first, QueryResult::Ack(Acknowledgement { affected_rows: 1, last_insert_id: Some(1) }));
        assert_eq!(second, QueryResult::Ack(Acknowledgement { affected_rows: 1, last_insert_id: Some(2) }));
        assert_eq!(driver.statements().len(), 4);
    }

    #[test]
    fn test_failing_opens_run_out() {
        let driver = ScriptedDriver::new().fail_opens(2);
        let config = ConnectionConfig::new("h", "u", "p", "d");
        assert!(driver.open(&config).is_err());
        assert!(driver.open(&config).is_err());
        assert!(driver.open(&config).is_ok());
        assert_eq!(driver.open_count(), 3);
    }
}
