//! Capsule domain model.
//!
//! # Responsibility
//! - Define the canonical capsule record persisted by the store.
//! - Provide the single opened-state transition.
//!
//! # Invariants
//! - `contents` is never empty for a persisted capsule.
//! - `open_date` is strictly later than `created_date`.
//! - `is_opened` only moves from `false` to `true`.

use crate::model::id::CapsuleId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Nanoseconds since the Unix epoch.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type Timestamp = u64;

/// Largest timestamp SQLite can hold in a signed INTEGER column.
pub const MAX_STORABLE_TIMESTAMP: Timestamp = i64::MAX as Timestamp;

/// Separator used when rendering opened contents for the caller.
pub const CONTENTS_SEPARATOR: &str = ", ";

/// Identity of a caller as resolved by the hosting environment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Principal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical record of one time capsule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capsule {
    /// Store key, assigned once at creation.
    pub id: CapsuleId,
    /// Only this principal may open the capsule.
    pub creator: Principal,
    /// Ordered messages sealed in the capsule.
    pub contents: Vec<String>,
    /// Earliest instant at which the capsule may be opened.
    pub open_date: Timestamp,
    pub is_opened: bool,
    pub created_date: Timestamp,
}

/// Record-level validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapsuleValidationError {
    EmptyContents,
    EmptyCreator,
    OpenDateNotAfterCreation {
        created_date: Timestamp,
        open_date: Timestamp,
    },
    TimestampOutOfRange(Timestamp),
}

impl Display for CapsuleValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyContents => write!(f, "capsule contents cannot be empty"),
            Self::EmptyCreator => write!(f, "capsule creator cannot be empty"),
            Self::OpenDateNotAfterCreation {
                created_date,
                open_date,
            } => write!(
                f,
                "open_date ({open_date}) must be after created_date ({created_date})"
            ),
            Self::TimestampOutOfRange(value) => {
                write!(f, "timestamp {value} exceeds storable maximum {MAX_STORABLE_TIMESTAMP}")
            }
        }
    }
}

impl Error for CapsuleValidationError {}

impl Capsule {
    /// Builds a sealed capsule created at `created_date`.
    ///
    /// # Invariants
    /// - `is_opened` starts as `false`.
    /// - This constructor does not validate; call [`Capsule::validate`].
    pub fn new(
        id: CapsuleId,
        creator: Principal,
        contents: Vec<String>,
        open_date: Timestamp,
        created_date: Timestamp,
    ) -> Self {
        Self {
            id,
            creator,
            contents,
            open_date,
            is_opened: false,
            created_date,
        }
    }

    /// Checks record invariants required before persistence.
    pub fn validate(&self) -> Result<(), CapsuleValidationError> {
        if self.contents.is_empty() {
            return Err(CapsuleValidationError::EmptyContents);
        }
        if self.creator.as_str().is_empty() {
            return Err(CapsuleValidationError::EmptyCreator);
        }
        for value in [self.open_date, self.created_date] {
            if value > MAX_STORABLE_TIMESTAMP {
                return Err(CapsuleValidationError::TimestampOutOfRange(value));
            }
        }
        if self.open_date <= self.created_date {
            return Err(CapsuleValidationError::OpenDateNotAfterCreation {
                created_date: self.created_date,
                open_date: self.open_date,
            });
        }
        Ok(())
    }

    /// Whether the time gate has passed at `now`.
    pub fn is_unlockable_at(&self, now: Timestamp) -> bool {
        now >= self.open_date
    }

    /// Whether `caller` created this capsule.
    pub fn is_owned_by(&self, caller: &Principal) -> bool {
        &self.creator == caller
    }

    /// Flips the opened flag. Irreversible.
    pub fn mark_opened(&mut self) {
        self.is_opened = true;
    }

    /// Caller-visible rendering of the sealed contents.
    pub fn render_contents(&self) -> String {
        self.contents.join(CONTENTS_SEPARATOR)
    }
}
