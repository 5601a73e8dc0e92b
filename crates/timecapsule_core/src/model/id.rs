//! Capsule identifier shape and generation.
//!
//! # Responsibility
//! - Parse and validate the textual capsule id shape.
//! - Generate fresh ids from an injected random source.
//!
//! # Invariants
//! - A valid id is exactly `CAPSULE_ID_BYTES * 2` lowercase hex characters.
//! - Production ids come from the operating system CSPRNG.

use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Number of random bytes behind one capsule id (256 bits).
pub const CAPSULE_ID_BYTES: usize = 32;

static CAPSULE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{64}$").expect("valid capsule id regex"));

/// Store key of a capsule: lowercase hex rendering of random bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CapsuleId(String);

/// Returned when text does not have the capsule id shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedCapsuleId(pub String);

impl Display for MalformedCapsuleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed capsule id `{}`", self.0)
    }
}

impl Error for MalformedCapsuleId {}

impl CapsuleId {
    /// Parses caller-supplied text, accepting only the canonical shape.
    ///
    /// Uppercase hex is rejected rather than normalized so that one capsule
    /// has exactly one textual key.
    pub fn parse(value: &str) -> Result<Self, MalformedCapsuleId> {
        if CAPSULE_ID_RE.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(MalformedCapsuleId(value.to_string()))
        }
    }

    /// Renders raw id bytes as a capsule id.
    pub fn from_bytes(bytes: &[u8; CAPSULE_ID_BYTES]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Draws a fresh id from `source`.
    pub fn generate(source: &mut impl SecureRandomSource) -> Self {
        let mut bytes = [0u8; CAPSULE_ID_BYTES];
        source.fill_bytes(&mut bytes);
        Self::from_bytes(&bytes)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for CapsuleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CapsuleId {
    type Error = MalformedCapsuleId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<CapsuleId> for String {
    fn from(value: CapsuleId) -> Self {
        value.0
    }
}

/// Capability to produce unpredictable bytes for id generation.
///
/// Tests substitute a deterministic implementation; production uses
/// [`OsRandomSource`].
pub trait SecureRandomSource {
    fn fill_bytes(&mut self, dest: &mut [u8]);
}

/// A borrowed source draws from, and advances, the source it points to.
impl<S: SecureRandomSource + ?Sized> SecureRandomSource for &mut S {
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        (**self).fill_bytes(dest);
    }
}

/// Operating-system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandomSource;

impl SecureRandomSource for OsRandomSource {
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}
