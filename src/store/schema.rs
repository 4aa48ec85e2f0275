//! SQLite schema definition

/// Bumped whenever the table layout changes. A database carrying any other
/// version is dropped and recreated.
pub const SCHEMA_VERSION: i32 = 2;

/// SQL schema for the TPH cache
pub const SCHEMA_SQL: &str = r#"
-- TPH collection points, replaced wholesale on every sync
CREATE TABLE IF NOT EXISTS data_tph (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    company TEXT NOT NULL DEFAULT '',
    location TEXT NOT NULL DEFAULT '',
    kodeBlok TEXT NOT NULL DEFAULT '',
    noTPH TEXT NOT NULL DEFAULT '',
    coordinate TEXT NOT NULL DEFAULT '',
    UNIQUE(kodeBlok, noTPH)
);
"#;

/// Drops everything created by `SCHEMA_SQL`
pub const DROP_SQL: &str = "DROP TABLE IF EXISTS data_tph";
