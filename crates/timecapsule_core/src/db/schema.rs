//! Capsule store schema steps and integrity checks.
//!
//! # Invariants
//! - Step versions strictly increase; `PRAGMA user_version` records the last
//!   applied step.
//! - A pending upgrade commits whole or not at all.
//! - After bootstrap every `capsule_contents` row belongs to a stored capsule.

use super::open::{DbError, DbResult};
use log::info;
use rusqlite::Connection;
use std::cmp::Ordering;

struct SchemaStep {
    version: u32,
    label: &'static str,
    ddl: &'static str,
}

const STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    label: "capsules",
    ddl: include_str!("sql/0001_capsules.sql"),
}];

/// Capsule schema version written by this build.
pub fn schema_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Brings the capsule tables up to `schema_version()`.
///
/// Files written by a newer build are refused rather than downgraded.
pub(super) fn upgrade(conn: &mut Connection) -> DbResult<()> {
    let found: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let target = schema_version();

    match found.cmp(&target) {
        Ordering::Greater => Err(DbError::UnsupportedSchemaVersion {
            db_version: found,
            latest_supported: target,
        }),
        Ordering::Equal => Ok(()),
        Ordering::Less => {
            let tx = conn.transaction()?;
            let pending = STEPS.iter().skip_while(|step| step.version <= found);
            let mut labels = Vec::new();
            for step in pending {
                tx.execute_batch(step.ddl)?;
                tx.pragma_update(None, "user_version", step.version)?;
                labels.push(step.label);
            }
            tx.commit()?;

            info!(
                "event=db_migrate module=db status=ok from_version={found} to_version={target} steps={}",
                labels.join(",")
            );
            Ok(())
        }
    }
}

/// Refuses stores whose content rows point at missing capsules.
///
/// Such rows can only come from writers that bypassed `foreign_keys=ON`.
pub(super) fn check_content_links(conn: &Connection) -> DbResult<()> {
    let rows: u64 = conn.query_row(
        "SELECT COUNT(*)
         FROM capsule_contents cc
         WHERE NOT EXISTS (SELECT 1 FROM capsules c WHERE c.id = cc.capsule_id);",
        [],
        |row| row.get(0),
    )?;
    if rows > 0 {
        return Err(DbError::OrphanedContents { rows });
    }
    Ok(())
}
