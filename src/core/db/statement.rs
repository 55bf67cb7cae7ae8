/// Statement Builders Module
///
/// Generates INSERT and UPDATE text from field maps. Every key and value is
/// sanitized through the session's escaper before it is spliced in; the only
/// exception is `Predicate::Raw`, which is the caller's responsibility.

use crate::core::{DbError, Result};
use std::fmt::Write;
use std::str::FromStr;

use super::query::Value;
use super::sanitize::{Escape, Sanitize};

/// Column/value pairs in the order the caller supplied them.
pub type Fields = Vec<(String, Value)>;

/// Collects any iterator of key/value pairs into `Fields`.
pub fn fields<I, K, V>(pairs: I) -> Fields
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// Which rows an UPDATE touches.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Predicate {
    /// No WHERE clause: every row.
    #[default]
    All,
    /// `key = 'value'` conditions, sanitized, joined by a `Joiner`.
    Fields(Fields),
    /// Inserted verbatim after `WHERE`. Not sanitized.
    Raw(String),
}

impl Predicate {
    /// Empty field lists and blank raw text mean "no WHERE clause".
    pub fn is_unrestricted(&self) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Fields(fields) => fields.is_empty(),
            Predicate::Raw(text) => text.trim().is_empty(),
        }
    }
}

/// Boolean operator placed between predicate conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Joiner {
    #[default]
    And,
    Or,
}

impl Joiner {
    pub fn as_sql(self) -> &'static str {
        match self {
            Joiner::And => "AND",
            Joiner::Or => "OR",
        }
    }
}

impl FromStr for Joiner {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Joiner::And),
            "OR" => Ok(Joiner::Or),
            _ => Err(DbError::InvalidArgument(format!("unsupported predicate joiner: {:?}", s))),
        }
    }
}

/// Quotes an identifier with backticks, doubling any embedded backtick.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Renders an already-sanitized value as a SQL literal.
///
/// Text and numbers are single-quoted alike; NULL stays bare and blobs use
/// hex literal syntax.
fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => format!("'{}'", i),
        Value::Real(f) => format!("'{}'", f),
        Value::Text(t) => format!("'{}'", t),
        Value::Blob(bytes) => {
            let mut hex = String::with_capacity(bytes.len() * 2 + 3);
            hex.push_str("X'");
            for b in bytes {
                let _ = write!(hex, "{:02X}", b);
            }
            hex.push('\'');
            hex
        }
    }
}

fn require_table(table: &str) -> Result<()> {
    if table.trim().is_empty() {
        return Err(DbError::InvalidArgument("table name must not be empty".to_string()));
    }
    Ok(())
}

/// NaN and infinities have no SQL literal; quoted, they would be stored as text.
fn require_finite(table: &str, fields: &Fields) -> Result<()> {
    match fields.iter().find(|(_, value)| matches!(value, Value::Real(f) if !f.is_finite())) {
        Some((key, value)) => Err(DbError::InvalidArgument(format!(
            "{}.{} cannot be stored: {} is not a finite number",
            table, key, value
        ))),
        None => Ok(()),
    }
}

/// Renders `` `key` = 'value' `` for each pair.
fn render_assignments<E: Escape + ?Sized>(escaper: &E, fields: Fields) -> Vec<String> {
    fields
        .sanitize_with(escaper)
        .iter()
        .map(|(key, value)| format!("{} = {}", quote_identifier(key), render_literal(value)))
        .collect()
}

/// Builds `INSERT INTO `table` (`k1`, `k2`) VALUES ('v1', 'v2')`.
pub fn build_insert<E: Escape + ?Sized>(escaper: &E, table: &str, fields: Fields) -> Result<String> {
    require_table(table)?;
    if fields.is_empty() {
        return Err(DbError::InvalidArgument(format!(
            "insert into {} needs at least one field",
            table
        )));
    }
    require_finite(table, &fields)?;

    let (keys, values): (Vec<String>, Vec<String>) = fields
        .sanitize_with(escaper)
        .iter()
        .map(|(key, value)| (quote_identifier(key), render_literal(value)))
        .unzip();

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table),
        keys.join(", "),
        values.join(", ")
    ))
}

/// Builds `UPDATE `table` SET `k` = 'v', ...` with an optional WHERE clause.
pub fn build_update<E: Escape + ?Sized>(
    escaper: &E,
    table: &str,
    fields: Fields,
    predicate: Predicate,
    joiner: Joiner,
) -> Result<String> {
    require_table(table)?;
    if fields.is_empty() {
        return Err(DbError::InvalidArgument(format!(
            "update of {} needs at least one field",
            table
        )));
    }
    require_finite(table, &fields)?;
    if let Predicate::Fields(conditions) = &predicate {
        require_finite(table, conditions)?;
    }

    let mut sql = format!(
        "UPDATE {} SET {}",
        quote_identifier(table),
        render_assignments(escaper, fields).join(", ")
    );

    if predicate.is_unrestricted() {
        return Ok(sql);
    }

    match predicate {
        Predicate::Fields(conditions) => {
            let separator = format!(" {} ", joiner.as_sql());
            sql.push_str(" WHERE ");
            sql.push_str(&render_assignments(escaper, conditions).join(&separator));
        }
        Predicate::Raw(clause) => {
            sql.push_str(" WHERE ");
            sql.push_str(clause.trim());
        }
        Predicate::All => {}
    }

    Ok(sql)
}

/// Builds `SELECT count(*) FROM `table``.
pub fn build_count(table: &str) -> String {
    format!("SELECT count(*) FROM {}", quote_identifier(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::sanitize::EscapeStyle;
    use insta::assert_snapshot;

    const MYSQL: EscapeStyle = EscapeStyle::Backslash;
    const SQLITE: EscapeStyle = EscapeStyle::DoubledQuote;

    #[test]
    fn test_insert_escapes_and_quotes() {
        let sql = build_insert(
            &MYSQL,
            "users",
            fields([("name", Value::from("O'Brien")), ("age", Value::from(30))]),
        )
        .unwrap();
        assert_snapshot!(sql, @r"INSERT INTO `users` (`name`, `age`) VALUES ('O\'Brien', '30')");

        let sql = build_insert(
            &SQLITE,
            "users",
            fields([("name", Value::from("O'Brien")), ("age", Value::from(30))]),
        )
        .unwrap();
        assert_snapshot!(sql, @"INSERT INTO `users` (`name`, `age`) VALUES ('O''Brien', '30')");
    }

    #[test]
    fn test_insert_null_and_blob_literals() {
        let sql = build_insert(
            &SQLITE,
            "files",
            fields([("note", Value::Null), ("data", Value::Blob(vec![0x48, 0x69]))]),
        )
        .unwrap();
        assert_snapshot!(sql, @"INSERT INTO `files` (`note`, `data`) VALUES (NULL, X'4869')");
    }

    #[test]
    fn test_insert_rejects_empty_input() {
        let err = build_insert(&SQLITE, "users", Vec::new()).unwrap_err();
        assert!(matches!(err, DbError::InvalidArgument(_)));

        let err = build_insert(&SQLITE, " ", fields([("a", 1)])).unwrap_err();
        assert!(matches!(err, DbError::InvalidArgument(_)));
    }

    #[test]
    fn test_update_with_field_predicate() {
        let sql = build_update(
            &MYSQL,
            "users",
            fields([("age", 31)]),
            Predicate::Fields(fields([("id", 5)])),
            Joiner::And,
        )
        .unwrap();
        assert_eq!(sql, "UPDATE `users` SET `age` = '31' WHERE `id` = '5'");
    }

    #[test]
    fn test_update_joins_conditions() {
        let sql = build_update(
            &MYSQL,
            "users",
            fields([("active", Value::from(0)), ("note", Value::from("it's gone"))]),
            Predicate::Fields(fields([("id", Value::from(5)), ("name", Value::from("O'Brien"))])),
            Joiner::Or,
        )
        .unwrap();
        assert_snapshot!(sql, @r"UPDATE `users` SET `active` = '0', `note` = 'it\'s gone' WHERE `id` = '5' OR `name` = 'O\'Brien'");
    }

    #[test]
    fn test_update_without_predicate_has_no_where() {
        for predicate in [Predicate::All, Predicate::Fields(Vec::new()), Predicate::Raw("  ".to_string())] {
            let sql = build_update(&SQLITE, "users", fields([("age", 31)]), predicate, Joiner::And).unwrap();
            assert_eq!(sql, "UPDATE `users` SET `age` = '31'");
        }
    }

    #[test]
    fn test_update_raw_predicate_is_verbatim() {
        let sql = build_update(
            &MYSQL,
            "users",
            fields([("age", 31)]),
            Predicate::Raw("id > 5 AND name LIKE 'O''%'".to_string()),
            Joiner::And,
        )
        .unwrap();
        assert_eq!(sql, "UPDATE `users` SET `age` = '31' WHERE id > 5 AND name LIKE 'O''%'");
    }

    #[test]
    fn test_update_rejects_empty_fields() {
        let err = build_update(&SQLITE, "users", Vec::new(), Predicate::All, Joiner::And).unwrap_err();
        assert!(matches!(err, DbError::InvalidArgument(_)));
    }

    #[test]
    fn test_non_finite_reals_are_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = build_insert(&SQLITE, "t", fields([("x", Value::Real(bad))])).unwrap_err();
            assert!(matches!(err, DbError::InvalidArgument(_)), "{:?}", err);

            let err = build_update(&SQLITE, "t", fields([("x", Value::Real(bad))]), Predicate::All, Joiner::And)
                .unwrap_err();
            assert!(matches!(err, DbError::InvalidArgument(_)), "{:?}", err);

            let err = build_update(
                &SQLITE,
                "t",
                fields([("x", 1.5)]),
                Predicate::Fields(fields([("x", Value::Real(bad))])),
                Joiner::And,
            )
            .unwrap_err();
            assert!(matches!(err, DbError::InvalidArgument(_)), "{:?}", err);
        }

        let sql = build_insert(&SQLITE, "t", fields([("x", -0.25)])).unwrap();
        assert_snapshot!(sql, @"INSERT INTO `t` (`x`) VALUES ('-0.25')");
    }

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(quote_identifier("users"), "`users`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
        assert_eq!(build_count("users"), "SELECT count(*) FROM `users`");
    }

    #[test]
    fn test_joiner_parsing() {
        assert_eq!("and".parse::<Joiner>().unwrap(), Joiner::And);
        assert_eq!(" OR ".parse::<Joiner>().unwrap(), Joiner::Or);
        assert!(matches!("; DROP".parse::<Joiner>(), Err(DbError::InvalidArgument(_))));
        assert_eq!(Joiner::default(), Joiner::And);
    }
}
