use rusqlite::Connection;
use tiltpair_core::db::migrations::latest_version;
use tiltpair_core::db::{open_db, open_db_in_memory, open_existing_db, DbError};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "md_blocks");
    assert_table_exists(&conn, "md_objects");
    assert_table_exists(&conn, "md_values");
}

#[test]
fn opening_same_file_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mic1.pos");

    let conn_first = open_db(&path).unwrap();
    conn_first
        .execute("INSERT INTO md_blocks (name) VALUES ('DefaultFamily');", [])
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let blocks: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM md_blocks;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(blocks, 1);
}

#[test]
fn open_existing_db_does_not_create_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.pos");

    assert!(open_existing_db(&path).is_err());
    assert!(!path.exists());
}

#[test]
fn deleting_a_block_cascades_to_its_records() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO md_blocks (name) VALUES ('f');
         INSERT INTO md_objects (block, obj_id, position) VALUES ('f', 1, 0);
         INSERT INTO md_values (block, obj_id, label, value) VALUES ('f', 1, 'xcoor', 10);
         DELETE FROM md_blocks WHERE name = 'f';",
    )
    .unwrap();

    let values: i64 = conn
        .query_row("SELECT COUNT(*) FROM md_values;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(values, 0);
}

#[test]
fn opening_file_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.pos");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
