use rusqlite::{params, Connection, ErrorCode};
use timecapsule_core::db::{open_db, open_db_in_memory, schema_version, DbError};
use timecapsule_core::{RepoError, SqliteCapsuleRepository};

const NOW: i64 = 1_700_000_000_000_000_000;

fn insert_capsule_row(
    conn: &Connection,
    id: &str,
    creator: &str,
    open_date: i64,
    is_opened: i64,
) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO capsules (id, creator, open_date, is_opened, created_date)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![id, creator, open_date, is_opened, NOW],
    )
}

fn insert_content_row(
    conn: &Connection,
    capsule_id: &str,
    position: i64,
) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO capsule_contents (capsule_id, position, body) VALUES (?1, ?2, 'body');",
        params![capsule_id, position],
    )
}

fn assert_constraint_violation(result: rusqlite::Result<usize>) {
    match result {
        Err(rusqlite::Error::SqliteFailure(err, _)) => {
            assert_eq!(err.code, ErrorCode::ConstraintViolation)
        }
        other => panic!("expected constraint violation, got {other:?}"),
    }
}

fn key(seed: char) -> String {
    seed.to_string().repeat(64)
}

#[test]
fn fresh_store_accepts_a_well_formed_capsule() {
    let conn = open_db_in_memory().unwrap();
    let version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, schema_version());

    insert_capsule_row(&conn, &key('a'), "alice", NOW + 1, 0).unwrap();
    insert_content_row(&conn, &key('a'), 0).unwrap();
    insert_content_row(&conn, &key('a'), 1).unwrap();
}

#[test]
fn open_date_must_follow_creation() {
    let conn = open_db_in_memory().unwrap();
    assert_constraint_violation(insert_capsule_row(&conn, &key('a'), "alice", NOW, 0));
    assert_constraint_violation(insert_capsule_row(&conn, &key('b'), "alice", NOW - 1, 0));
}

#[test]
fn creator_and_opened_flag_are_constrained() {
    let conn = open_db_in_memory().unwrap();
    assert_constraint_violation(insert_capsule_row(&conn, &key('a'), "", NOW + 1, 0));
    assert_constraint_violation(insert_capsule_row(&conn, &key('b'), "alice", NOW + 1, 2));
}

#[test]
fn contents_must_belong_to_a_stored_capsule() {
    let conn = open_db_in_memory().unwrap();
    assert_constraint_violation(insert_content_row(&conn, &key('f'), 0));
}

#[test]
fn content_positions_are_unique_per_capsule() {
    let conn = open_db_in_memory().unwrap();
    insert_capsule_row(&conn, &key('a'), "alice", NOW + 1, 0).unwrap();
    insert_content_row(&conn, &key('a'), 0).unwrap();
    assert_constraint_violation(insert_content_row(&conn, &key('a'), 0));
    assert_constraint_violation(insert_content_row(&conn, &key('a'), -1));
}

#[test]
fn reopening_a_store_keeps_rows_without_reapplying_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capsules.db");

    {
        let conn = open_db(&path).unwrap();
        insert_capsule_row(&conn, &key('a'), "alice", NOW + 1, 1).unwrap();
        insert_content_row(&conn, &key('a'), 0).unwrap();
    }

    let conn = open_db(&path).unwrap();
    let (creator, is_opened): (String, i64) = conn
        .query_row(
            "SELECT creator, is_opened FROM capsules WHERE id = ?1;",
            [key('a')],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(creator, "alice");
    assert_eq!(is_opened, 1);
}

#[test]
fn store_written_by_newer_build_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, schema_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn store_with_orphaned_contents_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orphans.db");
    drop(open_db(&path).unwrap());

    // A plain connection leaves foreign key enforcement off.
    let raw = Connection::open(&path).unwrap();
    insert_content_row(&raw, &key('e'), 0).unwrap();
    insert_content_row(&raw, &key('e'), 1).unwrap();
    drop(raw);

    let err = open_db(&path).unwrap_err();
    assert!(matches!(err, DbError::OrphanedContents { rows: 2 }));
    assert_eq!(
        err.to_string(),
        "capsule store holds 2 content rows without a capsule"
    );
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let mut conn = Connection::open_in_memory().unwrap();
    let err = SqliteCapsuleRepository::try_new(&mut conn)
        .err()
        .expect("unmigrated connection must be rejected");
    assert!(matches!(err, RepoError::MissingRequiredTable("capsules")));
}

#[test]
fn repository_rejects_table_missing_columns() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE capsules (id TEXT PRIMARY KEY, creator TEXT);
         CREATE TABLE capsule_contents (capsule_id TEXT, position INTEGER, body TEXT);",
    )
    .unwrap();

    let err = SqliteCapsuleRepository::try_new(&mut conn)
        .err()
        .expect("incomplete schema must be rejected");
    assert!(matches!(
        err,
        RepoError::MissingRequiredColumn {
            table: "capsules",
            column: "open_date"
        }
    ));
}
