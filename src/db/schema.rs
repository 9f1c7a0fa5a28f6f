//! SQLite schema initialization for the modgraph backend store.
//!
//! The backend database is the stand-in for the remote catalog/relation
//! service: two tables, `entities` and `relations`, plus the indexes the
//! traversal layer leans on.

use rusqlite::Connection;

// ---------------------------------------------------------------------------
// DDL constants — kept as separate strings so each statement can be executed
// individually and errors point at the statement that failed.
// ---------------------------------------------------------------------------

const CREATE_ENTITIES: &str = "\
CREATE TABLE IF NOT EXISTS entities (
  id INTEGER PRIMARY KEY,
  label TEXT NOT NULL,
  kind TEXT NOT NULL,
  state TEXT,
  category_id INTEGER,
  category TEXT,
  description TEXT,
  application INTEGER,
  custom INTEGER,
  extra TEXT
)";

const CREATE_RELATIONS: &str = "\
CREATE TABLE IF NOT EXISTS relations (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  from_id INTEGER NOT NULL,
  to_id INTEGER NOT NULL,
  kind TEXT NOT NULL,
  label TEXT
)";

const CREATE_INDEXES: &[&str] = &[
    // Relation identity is the ordered pair; the unique index makes
    // INSERT OR IGNORE implement first-seen-wins dedup at the store level.
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_relations_pair ON relations(from_id, to_id)",
    "CREATE INDEX IF NOT EXISTS idx_relations_from ON relations(from_id)",
    "CREATE INDEX IF NOT EXISTS idx_relations_to ON relations(to_id)",
    "CREATE INDEX IF NOT EXISTS idx_entities_label ON entities(label)",
    "CREATE INDEX IF NOT EXISTS idx_entities_state ON entities(state)",
    "CREATE INDEX IF NOT EXISTS idx_entities_category ON entities(category_id)",
];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Open (or create) the SQLite database at `db_path` and apply the schema.
///
/// The returned connection has WAL mode and synchronous NORMAL configured.
/// Foreign keys stay off: relation rows may reference entities that were
/// dropped from a later catalog dump, and the traversal layer tolerates
/// those as dangling rows.
///
/// # Errors
///
/// Returns a `rusqlite::Error` if the database cannot be opened or any DDL
/// statement fails.
pub fn initialize_database(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "OFF")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    conn.execute_batch(CREATE_ENTITIES)?;
    conn.execute_batch(CREATE_RELATIONS)?;

    for ddl in CREATE_INDEXES {
        conn.execute_batch(ddl)?;
    }

    Ok(conn)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        initialize_database(":memory:").expect("schema creation should succeed on :memory:")
    }

    fn object_exists(conn: &Connection, obj_type: &str, obj_name: &str) -> bool {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
                rusqlite::params![obj_type, obj_name],
                |row| row.get(0),
            )
            .unwrap();
        count > 0
    }

    #[test]
    fn core_tables_exist() {
        let conn = setup();
        for table in &["entities", "relations"] {
            assert!(
                object_exists(&conn, "table", table),
                "table '{table}' should exist"
            );
        }
    }

    #[test]
    fn indexes_exist() {
        let conn = setup();
        for idx in &[
            "idx_relations_pair",
            "idx_relations_from",
            "idx_relations_to",
            "idx_entities_label",
            "idx_entities_state",
            "idx_entities_category",
        ] {
            assert!(
                object_exists(&conn, "index", idx),
                "index '{idx}' should exist"
            );
        }
    }

    #[test]
    fn pair_index_rejects_duplicate_relations() {
        let conn = setup();
        conn.execute(
            "INSERT INTO relations (from_id, to_id, kind) VALUES (1, 2, 'depends_on')",
            [],
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO relations (from_id, to_id, kind) VALUES (1, 2, 'exclusion')",
            [],
        );
        assert!(dup.is_err(), "duplicate (from, to) pair should fail");

        // INSERT OR IGNORE keeps the first-seen kind.
        conn.execute(
            "INSERT OR IGNORE INTO relations (from_id, to_id, kind) VALUES (1, 2, 'exclusion')",
            [],
        )
        .unwrap();
        let kind: String = conn
            .query_row(
                "SELECT kind FROM relations WHERE from_id = 1 AND to_id = 2",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(kind, "depends_on");
    }

    #[test]
    fn opposite_direction_pair_is_distinct() {
        let conn = setup();
        conn.execute(
            "INSERT INTO relations (from_id, to_id, kind) VALUES (1, 2, 'depends_on')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO relations (from_id, to_id, kind) VALUES (2, 1, 'depends_on')",
            [],
        )
        .unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM relations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn entities_accept_null_optional_columns() {
        let conn = setup();
        conn.execute(
            "INSERT INTO entities (id, label, kind) VALUES (1, 'base', 'module')",
            [],
        )
        .unwrap();

        let (state, category, extra): (Option<String>, Option<i64>, Option<String>) = conn
            .query_row(
                "SELECT state, category_id, extra FROM entities WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert!(state.is_none());
        assert!(category.is_none());
        assert!(extra.is_none());
    }

    #[test]
    fn entities_primary_key_prevents_duplicates() {
        let conn = setup();
        conn.execute(
            "INSERT INTO entities (id, label, kind) VALUES (1, 'base', 'module')",
            [],
        )
        .unwrap();
        let result = conn.execute(
            "INSERT INTO entities (id, label, kind) VALUES (1, 'other', 'module')",
            [],
        );
        assert!(result.is_err(), "duplicate primary key should fail");
    }

    #[test]
    fn pragmas_are_set() {
        let conn = setup();

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        // In-memory databases report "memory" instead of "wal".
        assert!(
            journal_mode == "wal" || journal_mode == "memory",
            "journal_mode should be 'wal' or 'memory', got '{journal_mode}'"
        );

        let fk: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 0, "foreign_keys should be OFF");
    }
}
