//! Validated Wikidata identifiers.
//!
//! `Qid` (items, `Q\d+`) and `Pid` (properties, `P\d+`) are the only
//! identifier shapes the harvester touches. Everything arriving from the
//! CLI, the schema artifact, or a remote payload goes through [`Qid::parse`]
//! or [`Pid::parse`]; once constructed, an identifier is known-good and the
//! rest of the pipeline never re-validates.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::IdError;

static QID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^Q\d+$").unwrap());
static PID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^P\d+$").unwrap());

/// A validated Wikidata item identifier (e.g. `Q1048`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Qid(String);

impl Qid {
    /// Normalize (trim, uppercase) and validate an item identifier.
    pub fn parse(value: &str) -> Result<Self, IdError> {
        let normalized = value.trim().to_uppercase();
        if QID_RE.is_match(&normalized) {
            Ok(Qid(normalized))
        } else {
            Err(IdError::InvalidQid {
                value: value.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric part of the identifier, for stable numeric ordering.
    pub fn number(&self) -> u64 {
        self.0[1..].parse().unwrap_or(u64::MAX)
    }
}

impl fmt::Display for Qid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated Wikidata property identifier (e.g. `P1441`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(String);

impl Pid {
    /// Normalize (trim, uppercase) and validate a property identifier.
    pub fn parse(value: &str) -> Result<Self, IdError> {
        let normalized = value.trim().to_uppercase();
        if PID_RE.is_match(&normalized) {
            Ok(Pid(normalized))
        } else {
            Err(IdError::InvalidPid {
                value: value.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric part of the identifier, for stable numeric ordering.
    pub fn number(&self) -> u64 {
        self.0[1..].parse().unwrap_or(u64::MAX)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the trailing Q-identifier from an entity concept URI.
///
/// SPARQL bindings return full URIs like
/// `http://www.wikidata.org/entity/Q1048`; anything without a valid QID
/// tail yields `None`.
pub fn qid_from_uri(uri: &str) -> Option<Qid> {
    let tail = uri.rsplit('/').next()?;
    Qid::parse(tail).ok()
}

/// Extract the trailing P-identifier from a property URI.
///
/// Handles both entity URIs (`.../entity/P710`) and direct-claim URIs
/// (`.../prop/direct/P710`).
pub fn pid_from_uri(uri: &str) -> Option<Pid> {
    let tail = uri.rsplit('/').next()?;
    Pid::parse(tail).ok()
}
