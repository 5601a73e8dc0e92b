//! Host-facing API for the time capsule store.
//!
//! # Responsibility
//! - Expose `createTimeCapsule`, `openTimeCapsule` and `getAllTimeCapsules`
//!   as plain-data calls for transports and hosts.
//! - Own one store connection per process and serialize every call on it.
//!
//! # Invariants
//! - Exported methods never panic; failures are returned as UTF-8 strings.
//! - Caller identity is supplied by the host on every call.
//! - Current time comes from the injected `Clock`, never from callers.
//! - Capsule ids come from the injected `SecureRandomSource`.

use log::error;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use timecapsule_core::db::{open_db, open_db_in_memory};
use timecapsule_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    CallContext, Capsule, CapsuleService, Clock, OsRandomSource, Principal, SecureRandomSource,
    SqliteCapsuleRepository, SystemClock,
};

/// Environment variable overriding the database file location.
pub const DB_PATH_ENV: &str = "TIMECAPSULE_DB_PATH";
const DEFAULT_DB_FILE_NAME: &str = "timecapsule.sqlite3";

/// Health-check passthrough. Never fails.
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Core crate version passthrough. Never fails.
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes core logging once per process.
///
/// Returns an empty string on success and the error message on failure.
pub fn init_logging(level: &str, log_dir: &str) -> String {
    match init_logging_inner(level, log_dir) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Resolves the database path from `TIMECAPSULE_DB_PATH`, falling back to
/// a file in the system temp directory.
pub fn resolve_db_path() -> PathBuf {
    if let Ok(raw) = std::env::var(DB_PATH_ENV) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)
}

/// Connection and id source, guarded together so one call owns both.
struct Store<S> {
    conn: Connection,
    random: S,
}

/// Process-level handle over one capsule store.
pub struct TimeCapsuleApi<C: Clock = SystemClock, S: SecureRandomSource = OsRandomSource> {
    store: Mutex<Store<S>>,
    clock: C,
}

impl TimeCapsuleApi {
    /// Opens (or creates) the store at `path` with the wall clock.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, String> {
        let conn = open_db(path).map_err(|err| format!("capsule store open failed: {err}"))?;
        Ok(Self::with_clock(conn, SystemClock))
    }

    /// Opens the store configured by the environment.
    pub fn from_env() -> Result<Self, String> {
        Self::open(resolve_db_path())
    }

    /// Opens a throwaway in-memory store with the wall clock.
    pub fn open_in_memory() -> Result<Self, String> {
        let conn =
            open_db_in_memory().map_err(|err| format!("capsule store open failed: {err}"))?;
        Ok(Self::with_clock(conn, SystemClock))
    }
}

impl<C: Clock> TimeCapsuleApi<C> {
    /// Wraps a migrated connection and a clock; ids come from the OS CSPRNG.
    pub fn with_clock(conn: Connection, clock: C) -> Self {
        Self::with_sources(conn, clock, OsRandomSource)
    }
}

impl<C: Clock, S: SecureRandomSource> TimeCapsuleApi<C, S> {
    /// Wraps a migrated connection with explicit time and id sources.
    pub fn with_sources(conn: Connection, clock: C, random: S) -> Self {
        Self {
            store: Mutex::new(Store { conn, random }),
            clock,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Seals `contents` for `caller` until `open_date` (ns since epoch).
    ///
    /// Returns the new capsule id.
    pub fn create_time_capsule(
        &self,
        caller: &str,
        contents: Vec<String>,
        open_date: u64,
    ) -> Result<String, String> {
        let ctx = self.context(caller);
        self.with_service(|service| {
            service
                .create(&ctx, contents, open_date)
                .map(String::from)
                .map_err(|err| err.to_string())
        })
    }

    /// Opens capsule `id` for `caller`, returning its joined contents.
    pub fn open_time_capsule(&self, caller: &str, id: &str) -> Result<String, String> {
        let ctx = self.context(caller);
        self.with_service(|service| service.open(&ctx, id).map_err(|err| err.to_string()))
    }

    /// Lists every capsule with all fields, regardless of state or caller.
    pub fn get_all_time_capsules(&self) -> Result<Vec<Capsule>, String> {
        self.with_service(|service| service.list_all().map_err(|err| err.to_string()))
    }

    fn context(&self, caller: &str) -> CallContext {
        CallContext::at(Principal::new(caller), &self.clock)
    }

    fn with_service<T>(
        &self,
        f: impl FnOnce(
            &mut CapsuleService<SqliteCapsuleRepository<'_>, &mut S>,
        ) -> Result<T, String>,
    ) -> Result<T, String> {
        let mut store = self.lock_store()?;
        let Store { conn, random } = &mut *store;
        let repo = SqliteCapsuleRepository::try_new(conn)
            .map_err(|err| format!("capsule repo init failed: {err}"))?;
        let mut service = CapsuleService::with_random_source(repo, random);
        f(&mut service)
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, Store<S>>, String> {
        self.store.lock().map_err(|_| {
            error!("event=store_lock module=api status=error error_code=lock_poisoned");
            "capsule store lock poisoned".to_string()
        })
    }
}
