use std::path::{Path, PathBuf};

use log::info;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;

use crate::error::StoreError;
use crate::models::PredictionRecord;

mod migrations;

use migrations::run_migrations;

/// Append-only sink for prediction rows, plus the report query.
pub trait PredictionStore: Send + Sync {
    fn insert(&self, record: &PredictionRecord) -> Result<(), StoreError>;
    fn fetch_all(&self) -> Result<ResultTable, StoreError>;
}

/// Read access to login credentials and the one write the bootstrap needs.
pub trait CredentialStore: Send + Sync {
    fn password_hash_for(&self, username: &str) -> Result<Option<String>, StoreError>;
    fn user_count(&self) -> Result<i64, StoreError>;
    fn insert_user(&self, username: &str, password_hash: &str) -> Result<(), StoreError>;
}

/// Column names and stringified cells of `prediction_results`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

const INSERT_PREDICTION: &str = "INSERT INTO prediction_results (
    CreditScore, Geography, Gender, Age, Tenure, Balance, NumOfProducts, HasCrCard, IsActiveMember, EstimatedSalary,
    prediction_code, status_text
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)";

/// SQLite-backed store. A connection is opened per operation and closed when
/// the operation returns, whatever the outcome.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let store = Self { path };
        let mut conn = store.connect()?;
        run_migrations(&mut conn)?;
        info!("Opened prediction database at {}", store.path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        Ok(Connection::open(&self.path)?)
    }
}

impl PredictionStore for SqliteStore {
    fn insert(&self, record: &PredictionRecord) -> Result<(), StoreError> {
        let conn = self.connect()?;
        let values = record
            .input
            .features()
            .iter()
            .map(to_sql_value)
            .chain([
                SqlValue::Integer(i64::from(record.outcome.code())),
                SqlValue::Text(record.outcome.status().to_string()),
            ]);
        conn.execute(INSERT_PREDICTION, params_from_iter(values))?;
        Ok(())
    }

    fn fetch_all(&self) -> Result<ResultTable, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM prediction_results ORDER BY id")?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(display_cell))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(ResultTable { columns, rows })
    }
}

impl CredentialStore for SqliteStore {
    fn password_hash_for(&self, username: &str) -> Result<Option<String>, StoreError> {
        let conn = self.connect()?;
        let hash = conn
            .query_row(
                "SELECT password FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hash)
    }

    fn user_count(&self) -> Result<i64, StoreError> {
        let conn = self.connect()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }

    fn insert_user(&self, username: &str, password_hash: &str) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO users (username, password) VALUES (?1, ?2)",
            params![username, password_hash],
        )?;
        Ok(())
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => SqlValue::Integer(i),
            (None, Some(f)) => SqlValue::Real(f),
            (None, None) => SqlValue::Text(n.to_string()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn display_cell(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "null".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PredictionInput, PredictionOutcome};
    use serde_json::json;

    fn temp_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("nested/prediction.db")).unwrap();
        (dir, store)
    }

    fn record(body: Value, code: u8) -> PredictionRecord {
        let Value::Object(map) = body else {
            panic!("expected object")
        };
        PredictionRecord::new(PredictionInput::from_body(map), PredictionOutcome::new(code))
    }

    #[test]
    fn empty_store_has_columns_and_no_rows() {
        let (_dir, store) = temp_store();
        let table = store.fetch_all().unwrap();

        assert!(table.rows.is_empty());
        assert_eq!(table.columns.first().map(String::as_str), Some("id"));
        assert!(table.columns.iter().any(|c| c == "status_text"));
    }

    #[test]
    fn inserted_rows_keep_twelve_positional_values() {
        let (_dir, store) = temp_store();
        store
            .insert(&record(
                json!({
                    "CreditScore": 619, "Geography": "France", "Gender": "Female",
                    "Age": 42, "Tenure": 2, "Balance": 0.5, "NumOfProducts": 1,
                    "HasCrCard": true, "IsActiveMember": 1, "EstimatedSalary": 101348.88
                }),
                1,
            ))
            .unwrap();
        store.insert(&record(json!({ "Age": "forty" }), 0)).unwrap();

        let table = store.fetch_all().unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(
            &table.rows[0][1..13],
            &["619", "France", "Female", "42", "2", "0.5", "1", "1", "1", "101348.88", "1", "Leave"]
        );
        assert_eq!(table.rows[1][1], "null");
        assert_eq!(table.rows[1][4], "forty");
        assert_eq!(table.rows[1][12], "Stay");
    }

    #[test]
    fn credentials_round_trip_and_reopen_keeps_schema() {
        let (dir, store) = temp_store();
        assert_eq!(store.user_count().unwrap(), 0);
        store.insert_user("admin", "$2b$04$hash").unwrap();

        let reopened = SqliteStore::open(store.path().to_path_buf()).unwrap();
        assert_eq!(reopened.user_count().unwrap(), 1);
        assert_eq!(
            reopened.password_hash_for("admin").unwrap().as_deref(),
            Some("$2b$04$hash")
        );
        assert_eq!(reopened.password_hash_for("nobody").unwrap(), None);
        drop(dir);
    }

    #[test]
    fn unreachable_database_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore {
            path: dir.path().join("missing-dir/prediction.db"),
        };
        assert!(store.insert(&record(json!({}), 0)).is_err());
    }
}
