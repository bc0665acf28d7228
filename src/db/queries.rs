pub const CREATE_ENTRIES: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
  key        TEXT PRIMARY KEY,
  value      TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);
"#;

pub const SELECT_VALUE: &str = "SELECT value FROM entries WHERE key = ?1";

pub const UPSERT_VALUE: &str = "INSERT INTO entries (key, value, updated_at)
 VALUES (?1, ?2, ?3)
 ON CONFLICT(key)
 DO UPDATE SET value=excluded.value, updated_at=excluded.updated_at";

pub const DELETE_VALUE: &str = "DELETE FROM entries WHERE key = ?1";

pub const SELECT_KEYS: &str = "SELECT key FROM entries ORDER BY key ASC";

pub fn schema_statements() -> Vec<&'static str> {
    vec![CREATE_ENTRIES]
}
