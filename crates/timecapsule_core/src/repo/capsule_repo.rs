//! Capsule repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist capsule records and their ordered contents.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `Capsule::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - The opened flag is only ever set through a conditional update, so two
//!   connections racing on one capsule cannot both observe a transition.
//! - Listing order is store key order (`id ASC`), independent of insertion.

use crate::db::DbError;
use crate::model::capsule::{Capsule, CapsuleValidationError, Principal, Timestamp};
use crate::model::id::CapsuleId;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const CAPSULE_WITH_CONTENTS_SQL: &str = "SELECT
    c.id AS id,
    c.creator AS creator,
    c.open_date AS open_date,
    c.is_opened AS is_opened,
    c.created_date AS created_date,
    cc.position AS position,
    cc.body AS body
FROM capsules c
LEFT JOIN capsule_contents cc ON cc.capsule_id = c.id";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for capsule persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(CapsuleValidationError),
    Db(DbError),
    NotFound(CapsuleId),
    DuplicateId(CapsuleId),
    InvalidData(String),
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "capsule not found: {id}"),
            Self::DuplicateId(id) => write!(f, "capsule id already exists: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted capsule data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CapsuleValidationError> for RepoError {
    fn from(value: CapsuleValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for the capsule store.
pub trait CapsuleRepository {
    /// Persists a new capsule. Fails with `DuplicateId` if the key is taken.
    fn insert_capsule(&mut self, capsule: &Capsule) -> RepoResult<()>;
    /// Loads one capsule with its contents.
    fn get_capsule(&self, id: &CapsuleId) -> RepoResult<Option<Capsule>>;
    fn contains_capsule(&self, id: &CapsuleId) -> RepoResult<bool>;
    /// Sets `is_opened` if it is still unset.
    ///
    /// Returns `Ok(false)` when another caller already opened the capsule.
    fn mark_opened(&mut self, id: &CapsuleId) -> RepoResult<bool>;
    /// Returns every capsule ordered by id.
    fn list_capsules(&self) -> RepoResult<Vec<Capsule>>;
}

/// SQLite-backed capsule repository.
pub struct SqliteCapsuleRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteCapsuleRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_capsule_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl CapsuleRepository for SqliteCapsuleRepository<'_> {
    fn insert_capsule(&mut self, capsule: &Capsule) -> RepoResult<()> {
        capsule.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if capsule_exists(&tx, &capsule.id)? {
            return Err(RepoError::DuplicateId(capsule.id.clone()));
        }

        tx.execute(
            "INSERT INTO capsules (
                id,
                creator,
                open_date,
                is_opened,
                created_date
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                capsule.id.as_str(),
                capsule.creator.as_str(),
                timestamp_to_db(capsule.open_date)?,
                bool_to_int(capsule.is_opened),
                timestamp_to_db(capsule.created_date)?,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO capsule_contents (capsule_id, position, body)
                 VALUES (?1, ?2, ?3);",
            )?;
            for (position, body) in capsule.contents.iter().enumerate() {
                let position = i64::try_from(position).map_err(|_| {
                    RepoError::InvalidData(format!("content position {position} overflows"))
                })?;
                stmt.execute(params![capsule.id.as_str(), position, body.as_str()])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn get_capsule(&self, id: &CapsuleId) -> RepoResult<Option<Capsule>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CAPSULE_WITH_CONTENTS_SQL}
             WHERE c.id = ?1
             ORDER BY cc.position ASC;"
        ))?;
        let mut rows = stmt.query([id.as_str()])?;
        let mut capsules = collect_capsules(&mut rows)?;
        Ok(capsules.pop())
    }

    fn contains_capsule(&self, id: &CapsuleId) -> RepoResult<bool> {
        capsule_exists(&*self.conn, id)
    }

    fn mark_opened(&mut self, id: &CapsuleId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE capsules
             SET is_opened = 1
             WHERE id = ?1
               AND is_opened = 0;",
            [id.as_str()],
        )?;

        if changed == 1 {
            return Ok(true);
        }
        if capsule_exists(&*self.conn, id)? {
            Ok(false)
        } else {
            Err(RepoError::NotFound(id.clone()))
        }
    }

    fn list_capsules(&self) -> RepoResult<Vec<Capsule>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CAPSULE_WITH_CONTENTS_SQL}
             ORDER BY c.id ASC, cc.position ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        collect_capsules(&mut rows)
    }
}

/// Folds joined capsule/content rows into records.
///
/// Rows must arrive grouped by capsule and ordered by content position.
fn collect_capsules(rows: &mut rusqlite::Rows<'_>) -> RepoResult<Vec<Capsule>> {
    let mut capsules: Vec<Capsule> = Vec::new();

    while let Some(row) = rows.next()? {
        let id_text: String = row.get("id")?;
        let continues_previous = capsules
            .last()
            .is_some_and(|capsule| capsule.id.as_str() == id_text);
        if !continues_previous {
            capsules.push(parse_capsule_header(row, id_text)?);
        }

        let body: Option<String> = row.get("body")?;
        if let (Some(body), Some(current)) = (body, capsules.last_mut()) {
            current.contents.push(body);
        }
    }

    for capsule in &capsules {
        capsule.validate().map_err(|err| {
            RepoError::InvalidData(format!("capsule {} violates invariants: {err}", capsule.id))
        })?;
    }

    Ok(capsules)
}

fn parse_capsule_header(row: &Row<'_>, id_text: String) -> RepoResult<Capsule> {
    let id = CapsuleId::parse(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid capsule id `{id_text}` in capsules.id"))
    })?;

    let is_opened = match row.get::<_, i64>("is_opened")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_opened value `{other}` in capsules.is_opened"
            )));
        }
    };

    Ok(Capsule {
        id,
        creator: Principal::new(row.get::<_, String>("creator")?),
        contents: Vec::new(),
        open_date: timestamp_from_db(row.get("open_date")?, "capsules.open_date")?,
        is_opened,
        created_date: timestamp_from_db(row.get("created_date")?, "capsules.created_date")?,
    })
}

fn capsule_exists(conn: &Connection, id: &CapsuleId) -> RepoResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM capsules WHERE id = ?1;",
            [id.as_str()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn ensure_capsule_connection_ready(conn: &Connection) -> RepoResult<()> {
    const REQUIRED: &[(&str, &[&str])] = &[
        (
            "capsules",
            &["id", "creator", "open_date", "is_opened", "created_date"],
        ),
        ("capsule_contents", &["capsule_id", "position", "body"]),
    ];

    for &(table, columns) in REQUIRED {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn timestamp_to_db(value: Timestamp) -> RepoResult<i64> {
    i64::try_from(value).map_err(|_| CapsuleValidationError::TimestampOutOfRange(value).into())
}

fn timestamp_from_db(value: i64, column: &str) -> RepoResult<Timestamp> {
    Timestamp::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("negative timestamp `{value}` in {column}")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
