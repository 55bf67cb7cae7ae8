/// Values and Results Module
///
/// This module defines the scalar value model, materialized rows, and the
/// result of a single statement as recorded by the query handle.

use rusqlite::types::ValueRef;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// A single scalar as stored in, or destined for, a column.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Returns `true` for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the text if this is a `Text` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Coerces the value to an integer the way `count()` needs it.
    ///
    /// Integers are returned as-is, reals are truncated, text is parsed from
    /// its leading numeric part. Everything else is 0.
    pub fn to_i64(&self) -> i64 {
        match self {
            Value::Integer(i) => *i,
            Value::Real(f) => *f as i64,
            Value::Text(s) => leading_integer(s),
            Value::Null | Value::Blob(_) => 0,
        }
    }
}

/// Parses the leading `[+-]?\d+` of `s`, ignoring leading whitespace.
fn leading_integer(s: &str) -> i64 {
    let trimmed = s.trim_start();
    let end = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().unwrap_or(0)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(t) => write!(f, "{}", t),
            Value::Blob(b) => write!(f, "<BLOB: {} bytes>", b.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Real(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Integer(i64::from(b))
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Blob(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

/// One materialized row: column names paired with values, in the order the
/// backend returned the columns.
///
/// Duplicate column names (e.g. from a join) are all kept; `get` returns the
/// first match.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    fields: Vec<(String, Value)>,
}

impl Row {
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        Row { fields }
    }

    /// Looks up a column by name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Iterates over `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_fields(self) -> Vec<(String, Value)> {
        self.fields
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Rows returned by a row-producing statement, fully materialized.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    /// Column names in server order
    pub columns: Vec<String>,
    /// Row values, each in the same order as `columns`
    pub rows: Vec<Vec<Value>>,
    /// Identifier generated by an `INSERT ... RETURNING`, if any
    pub last_insert_id: Option<i64>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        ResultSet {
            columns,
            rows,
            last_insert_id: None,
        }
    }

    pub fn with_insert_id(mut self, id: Option<i64>) -> Self {
        self.last_insert_id = id;
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of the first row, if there is one.
    pub fn first_value(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Pairs each row with the column names.
    pub fn to_rows(&self) -> Vec<Row> {
        self.rows
            .iter()
            .map(|values| {
                Row::new(
                    self.columns
                        .iter()
                        .cloned()
                        .zip(values.iter().cloned())
                        .collect(),
                )
            })
            .collect()
    }
}

/// Outcome of a statement that produced no row set (DML/DDL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Acknowledgement {
    /// Rows changed by the statement
    pub affected_rows: u64,
    /// Identifier generated by an INSERT/REPLACE, if any
    pub last_insert_id: Option<i64>,
}

/// The recorded outcome of one successful statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Rows(ResultSet),
    Ack(Acknowledgement),
}

impl QueryResult {
    /// Rows in the result set; acknowledgements have none.
    pub fn row_count(&self) -> usize {
        match self {
            QueryResult::Rows(set) => set.len(),
            QueryResult::Ack(_) => 0,
        }
    }

    /// Rows changed, or rows returned for a row set.
    pub fn affected_rows(&self) -> u64 {
        match self {
            QueryResult::Rows(set) => set.len() as u64,
            QueryResult::Ack(ack) => ack.affected_rows,
        }
    }

    /// Identifier generated by the statement, whichever shape it returned.
    pub fn last_insert_id(&self) -> Option<i64> {
        match self {
            QueryResult::Rows(set) => set.last_insert_id,
            QueryResult::Ack(ack) => ack.last_insert_id,
        }
    }

    pub fn as_rows(&self) -> Option<&ResultSet> {
        match self {
            QueryResult::Rows(set) => Some(set),
            QueryResult::Ack(_) => None,
        }
    }
}

/// Represents different SQL statement types for introspection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatementType {
    /// SELECT statement
    Select,
    /// INSERT or REPLACE statement
    Insert,
    /// UPDATE statement
    Update,
    /// DELETE statement
    Delete,
    /// CREATE/DROP/ALTER statement
    Ddl,
    /// Other statement types
    Other,
}

impl StatementType {
    /// Determines the statement type from its leading keyword, ignoring any
    /// comments in front of it.
    pub fn from_sql(sql: &str) -> Self {
        let keyword = skip_leading_comments(sql)
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or("")
            .to_uppercase();

        match keyword.as_str() {
            "SELECT" | "WITH" => StatementType::Select,
            "INSERT" | "REPLACE" => StatementType::Insert,
            "UPDATE" => StatementType::Update,
            "DELETE" => StatementType::Delete,
            "CREATE" | "DROP" | "ALTER" => StatementType::Ddl,
            _ => StatementType::Other,
        }
    }

    /// Whether a statement of this type can generate a row identifier.
    pub fn generates_id(self) -> bool {
        self == StatementType::Insert
    }
}

/// Drops leading whitespace, `-- line` and `/* block */` comments.
///
/// An unterminated comment swallows the rest of the text.
fn skip_leading_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.find('\n').map_or("", |end| &after[end + 1..]);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |end| &after[end + 2..]);
        } else {
            return rest;
        }
        rest = rest.trim_start();
    }
}
