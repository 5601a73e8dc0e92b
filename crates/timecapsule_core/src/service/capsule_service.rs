//! Capsule use-case service.
//!
//! # Responsibility
//! - Provide the create/open/list entry points of the capsule store.
//! - Apply open-path validation in a fixed precedence order.
//! - Generate fresh capsule ids from an injected random source.
//!
//! # Invariants
//! - Open checks run as: id shape, existence, already opened, time gate,
//!   ownership. The first failing check decides the error.
//! - Failed operations never mutate stored records.
//! - Diagnostic events carry ids and counts only, never capsule contents.

use crate::context::CallContext;
use crate::model::capsule::{
    Capsule, CapsuleValidationError, Timestamp, MAX_STORABLE_TIMESTAMP,
};
use crate::model::id::{CapsuleId, OsRandomSource, SecureRandomSource};
use crate::repo::capsule_repo::{CapsuleRepository, RepoError, RepoResult};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Fresh-id draws attempted before giving up on a colliding key space.
pub const MAX_ID_ATTEMPTS: usize = 4;

pub type CapsuleResult<T> = Result<T, CapsuleError>;

/// Caller-visible failures of capsule operations.
#[derive(Debug)]
pub enum CapsuleError {
    /// Creation request carried no contents.
    InvalidInput,
    /// Requested open date is not strictly after "now".
    InvalidSchedule,
    /// Open request id does not have the capsule id shape.
    MalformedId(String),
    NotFound(CapsuleId),
    AlreadyOpened(CapsuleId),
    /// Open requested before the capsule's open date.
    NotYetUnlockable {
        id: CapsuleId,
        open_date: Timestamp,
    },
    /// Caller is not the capsule creator.
    Forbidden(CapsuleId),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl CapsuleError {
    /// Stable machine-readable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::InvalidSchedule => "invalid_schedule",
            Self::MalformedId(_) => "malformed_id",
            Self::NotFound(_) => "not_found",
            Self::AlreadyOpened(_) => "already_opened",
            Self::NotYetUnlockable { .. } => "not_yet_unlockable",
            Self::Forbidden(_) => "forbidden",
            Self::Repo(_) => "storage",
        }
    }
}

impl Display for CapsuleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput => write!(f, "Contents cannot be empty"),
            Self::InvalidSchedule => write!(f, "Open date must be in the future"),
            Self::MalformedId(_) => write!(f, "Invalid capsule ID format"),
            Self::NotFound(id) => write!(f, "Time Capsule with ID {id} not found"),
            Self::AlreadyOpened(_) => write!(f, "Time Capsule has already been opened"),
            Self::NotYetUnlockable { .. } => {
                write!(f, "Time Capsule cannot be opened before the specified date")
            }
            Self::Forbidden(_) => write!(f, "Only the creator can open the Time Capsule"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CapsuleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CapsuleError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Capsule store facade over a repository and an id source.
pub struct CapsuleService<R: CapsuleRepository, S: SecureRandomSource = OsRandomSource> {
    repo: R,
    random: S,
}

impl<R: CapsuleRepository> CapsuleService<R> {
    /// Creates a service drawing ids from the operating system CSPRNG.
    pub fn new(repo: R) -> Self {
        Self::with_random_source(repo, OsRandomSource)
    }
}

impl<R: CapsuleRepository, S: SecureRandomSource> CapsuleService<R, S> {
    /// Creates a service with a caller-provided id source.
    pub fn with_random_source(repo: R, random: S) -> Self {
        Self { repo, random }
    }

    /// Seals `contents` until `open_date` on behalf of `ctx.caller`.
    ///
    /// # Contract
    /// - Empty `contents` fails with `InvalidInput`.
    /// - `open_date <= ctx.now` fails with `InvalidSchedule`.
    /// - An `open_date` past `MAX_STORABLE_TIMESTAMP` fails with a storage
    ///   validation error before any id is drawn.
    /// - Returns the new capsule id; no existing record is touched.
    pub fn create(
        &mut self,
        ctx: &CallContext,
        contents: Vec<String>,
        open_date: Timestamp,
    ) -> CapsuleResult<CapsuleId> {
        let result = self.create_inner(ctx, contents, open_date);
        match &result {
            Ok(id) => info!(
                "event=capsule_create module=service status=ok capsule_id={} open_date={}",
                id, open_date
            ),
            Err(err) => warn!(
                "event=capsule_create module=service status=error error_code={} open_date={} now={}",
                err.code(),
                open_date,
                ctx.now
            ),
        }
        result
    }

    /// Opens a capsule for its creator once its open date has passed.
    ///
    /// Returns the contents joined with `", "`. The transition is one-time:
    /// later calls fail with `AlreadyOpened`.
    pub fn open(&mut self, ctx: &CallContext, raw_id: &str) -> CapsuleResult<String> {
        let result = self.open_inner(ctx, raw_id);
        match &result {
            Ok(_) => info!("event=capsule_open module=service status=ok capsule_id={raw_id}"),
            Err(err @ CapsuleError::MalformedId(_)) => warn!(
                "event=capsule_open module=service status=error error_code={}",
                err.code()
            ),
            Err(err) => warn!(
                "event=capsule_open module=service status=error error_code={} capsule_id={raw_id}",
                err.code()
            ),
        }
        result
    }

    /// Returns every stored capsule regardless of state or caller.
    pub fn list_all(&self) -> RepoResult<Vec<Capsule>> {
        let capsules = self.repo.list_capsules()?;
        info!(
            "event=capsule_list module=service status=ok count={}",
            capsules.len()
        );
        Ok(capsules)
    }

    /// Gives read access to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    fn create_inner(
        &mut self,
        ctx: &CallContext,
        contents: Vec<String>,
        open_date: Timestamp,
    ) -> CapsuleResult<CapsuleId> {
        if contents.is_empty() {
            return Err(CapsuleError::InvalidInput);
        }
        if open_date <= ctx.now {
            return Err(CapsuleError::InvalidSchedule);
        }
        if open_date > MAX_STORABLE_TIMESTAMP {
            return Err(RepoError::Validation(CapsuleValidationError::TimestampOutOfRange(
                open_date,
            ))
            .into());
        }

        let id = self.fresh_id()?;
        let capsule = Capsule::new(id, ctx.caller.clone(), contents, open_date, ctx.now);
        self.repo.insert_capsule(&capsule)?;
        Ok(capsule.id)
    }

    fn fresh_id(&mut self) -> CapsuleResult<CapsuleId> {
        let mut attempt = 1;
        loop {
            let candidate = CapsuleId::generate(&mut self.random);
            if !self.repo.contains_capsule(&candidate)? {
                return Ok(candidate);
            }
            warn!("event=capsule_id_collision module=service attempt={attempt}");
            if attempt == MAX_ID_ATTEMPTS {
                return Err(CapsuleError::Repo(RepoError::DuplicateId(candidate)));
            }
            attempt += 1;
        }
    }

    fn open_inner(&mut self, ctx: &CallContext, raw_id: &str) -> CapsuleResult<String> {
        let id = CapsuleId::parse(raw_id).map_err(|err| CapsuleError::MalformedId(err.0))?;

        let mut capsule = self
            .repo
            .get_capsule(&id)?
            .ok_or_else(|| CapsuleError::NotFound(id.clone()))?;

        if capsule.is_opened {
            return Err(CapsuleError::AlreadyOpened(id));
        }
        if !capsule.is_unlockable_at(ctx.now) {
            return Err(CapsuleError::NotYetUnlockable {
                id,
                open_date: capsule.open_date,
            });
        }
        if !capsule.is_owned_by(&ctx.caller) {
            return Err(CapsuleError::Forbidden(id));
        }

        // A concurrent opener on another connection may win between the
        // read above and this update.
        if !self.repo.mark_opened(&id)? {
            return Err(CapsuleError::AlreadyOpened(id));
        }

        capsule.mark_opened();
        Ok(capsule.render_contents())
    }
}
