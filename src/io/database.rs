//! SQLite tables and queries through `rusqlite`.

use crate::core::context::NodeConfig;
use crate::core::dataset::Dataset;
use crate::core::error::{IoError, IoResult};
use crate::core::types::Value;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;

/// What a sink does when the target table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IfExists {
    Replace,
    Append,
    Fail,
}

impl IfExists {
    pub(crate) fn parse(text: &str) -> Option<Self> {
        match text {
            "replace" => Some(IfExists::Replace),
            "append" => Some(IfExists::Append),
            "fail" => Some(IfExists::Fail),
            _ => None,
        }
    }
}

/// Open the database named by a connection string.
///
/// Accepts `sqlite://path`, `sqlite:path`, a plain path or `:memory:`.
fn open(connection: &str) -> IoResult<Connection> {
    let path = connection
        .strip_prefix("sqlite://")
        .or_else(|| connection.strip_prefix("sqlite:"))
        .unwrap_or(connection);
    if path.is_empty() || path.contains("://") {
        return Err(IoError::InvalidLocation {
            location: connection.to_string(),
            reason: "only SQLite connection strings are supported".to_string(),
        });
    }
    if path == ":memory:" {
        return Ok(Connection::open_in_memory()?);
    }
    Ok(Connection::open(path)?)
}

/// Check a table name is a plain identifier.
fn table_identifier(table: &str) -> IoResult<&str> {
    let mut chars = table.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(table)
    } else {
        Err(IoError::InvalidLocation {
            location: table.to_string(),
            reason: "table names may only contain letters, digits and underscores".to_string(),
        })
    }
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Integer(i),
        SqlValue::Real(f) => Value::Float(f),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Boolean(b) => SqlValue::Integer(*b as i64),
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_text()),
    }
}

/// Run `query`, or select the whole of `table_name` when no query is given.
pub(crate) fn read(connection: &str, options: &NodeConfig) -> IoResult<Dataset> {
    let sql = match (options.str("query").filter(|q| !q.trim().is_empty()), options.str("table_name")) {
        (Some(query), _) => query.to_string(),
        (None, Some(table)) => format!("SELECT * FROM {}", quote(table_identifier(table)?)),
        (None, None) => {
            return Err(IoError::InvalidLocation {
                location: connection.to_string(),
                reason: "a 'query' or 'table_name' is required".to_string(),
            })
        }
    };

    let conn = open(connection)?;
    let mut stmt = conn.prepare(&sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = names.len();
    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|i| row.get::<_, SqlValue>(i).map(from_sql))
                .collect::<Result<Vec<_>, _>>()
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Dataset::new(names, rows)?)
}

/// Write a dataset into `table_name`, returning `database://{table}`.
pub(crate) fn write(data: &Dataset, connection: &str, options: &NodeConfig) -> IoResult<String> {
    let table = options.str("table_name").unwrap_or_default();
    let table = table_identifier(table)?;
    let mode_text = options.str("if_exists").unwrap_or("replace");
    let mode = IfExists::parse(mode_text).ok_or_else(|| IoError::InvalidLocation {
        location: table.to_string(),
        reason: format!("unknown if_exists mode '{}'", mode_text),
    })?;
    if data.column_count() == 0 {
        return Err(IoError::InvalidLocation {
            location: table.to_string(),
            reason: "cannot create a table without columns".to_string(),
        });
    }

    let mut conn = open(connection)?;
    let exists: bool = conn.query_row(
        "SELECT count(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    if exists && mode == IfExists::Fail {
        return Err(IoError::TableExists(table.to_string()));
    }

    let tx = conn.transaction()?;
    if mode == IfExists::Replace {
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote(table)))?;
    }
    let definitions: Vec<String> = data
        .columns()
        .iter()
        .map(|c| format!("{} {}", quote(&c.name), c.dtype.sql_type()))
        .collect();
    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote(table),
        definitions.join(", ")
    ))?;

    let columns: Vec<String> = data.columns().iter().map(|c| quote(&c.name)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    {
        let mut insert = tx.prepare(&format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(table),
            columns.join(", "),
            placeholders.join(", ")
        ))?;
        for row in data.rows() {
            insert.execute(rusqlite::params_from_iter(row.iter().map(to_sql)))?;
        }
    }
    tx.commit()?;

    log::debug!("wrote {} rows to table '{}'", data.row_count(), table);
    Ok(format!("database://{}", table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Dataset {
        Dataset::from_json_records(&[
            json!({"id": 1, "name": "Ada", "score": 9.5}),
            json!({"id": 2, "name": null, "score": 7.0}),
        ])
        .unwrap()
    }

    #[test]
    fn test_write_read_table() {
        let dir = tempfile::tempdir().unwrap();
        let db = format!("sqlite://{}", dir.path().join("t.db").display());
        let options = NodeConfig::new().with("table_name", "people");

        assert_eq!(write(&sample(), &db, &options).unwrap(), "database://people");
        let data = read(&db, &options).unwrap();
        assert_eq!(data, sample());

        let query = NodeConfig::new()
            .with("table_name", "ignored")
            .with("query", "SELECT name FROM people WHERE id = 1");
        let picked = read(&db, &query).unwrap();
        assert_eq!(picked.column_names(), vec!["name"]);
        assert_eq!(picked.rows()[0][0], Value::from("Ada"));
    }

    #[test]
    fn test_if_exists_modes() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("t.db").display().to_string();
        let replace = NodeConfig::new().with("table_name", "t");
        write(&sample(), &db, &replace).unwrap();
        write(&sample(), &db, &replace).unwrap();
        assert_eq!(read(&db, &replace).unwrap().row_count(), 2);

        let append = replace.clone().with("if_exists", "append");
        write(&sample(), &db, &append).unwrap();
        assert_eq!(read(&db, &replace).unwrap().row_count(), 4);

        let fail = replace.clone().with("if_exists", "fail");
        assert!(matches!(write(&sample(), &db, &fail), Err(IoError::TableExists(_))));
    }

    #[test]
    fn test_rejects_bad_locations() {
        let options = NodeConfig::new().with("table_name", "people; DROP TABLE x");
        assert!(matches!(read(":memory:", &options), Err(IoError::InvalidLocation { .. })));

        let options = NodeConfig::new().with("table_name", "people");
        assert!(matches!(
            read("postgresql://localhost/db", &options),
            Err(IoError::InvalidLocation { .. })
        ));
        assert!(matches!(read(":memory:", &options), Err(IoError::Database(_))));
    }
}
