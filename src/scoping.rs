//! Federation-aware scoping: how confidently does an entity belong to the
//! target domain?
//!
//! Evidence comes from external-authority identifiers attached to the
//! entity. Extraction keeps the best-ranked value per property (preferred >
//! normal > deprecated; deprecated-only values are kept rather than silently
//! dropped so downstream consumers can decide). Classification is an
//! ordered cascade — ancient-world authorities outrank everything else, so
//! an entity carrying both a Pleiades ID and a VIAF ID is temporally
//! scoped, never merely domain scoped.
//!
//! Accepted entities reached the run through a backlink to the seed, so
//! domain proximity holds for all of them by construction.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::ancestors::AncestorClosures;
use crate::claims::EntityDoc;
use crate::ident::{Pid, Qid};
use crate::schema::{Schema, ScopingClass};

/// Ancient-world federation authorities: Trismegistos, LGPN, Pleiades.
/// Presence of any one is the strongest temporal-scoping signal.
pub const ANCIENT_WORLD_AUTHORITY_PIDS: &[&str] = &["P1696", "P1047", "P1584"];

/// Digital Prosopography of the Roman Republic. Persons attested there are
/// by definition temporally scoped to the Republic.
pub const DPRR_PID: &str = "P6863";

/// VIAF, a general biographical authority. Domain proximity plus VIAF is
/// domain-scoping evidence, not temporal.
pub const VIAF_PID: &str = "P214";

/// Coarse scoping status emitted per accepted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopingStatus {
    TemporalScoped,
    DomainScoped,
    Unscoped,
}

impl ScopingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopingStatus::TemporalScoped => "temporal_scoped",
            ScopingStatus::DomainScoped => "domain_scoped",
            ScopingStatus::Unscoped => "unscoped",
        }
    }
}

/// Scoping decision for one entity.
#[derive(Debug, Clone, Serialize)]
pub struct ScopingOutcome {
    pub status: ScopingStatus,
    pub confidence: f64,
    /// True when no declared type (or ancestor) mapped to a known category.
    pub ambiguous_category: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoping_class: Option<ScopingClass>,
}

/// Extract the best-ranked value of every external-id-typed property.
pub fn extract_external_ids(doc: &EntityDoc) -> BTreeMap<Pid, String> {
    let mut out = BTreeMap::new();
    for (raw_pid, statements) in &doc.claims {
        let Ok(pid) = Pid::parse(raw_pid) else { continue };
        let best = statements
            .iter()
            .filter(|s| s.mainsnak.datatype == "external-id")
            .filter_map(|s| {
                let value = s.mainsnak.datavalue.as_ref()?.as_string()?.trim();
                if value.is_empty() {
                    None
                } else {
                    Some((s.rank(), value.to_string()))
                }
            })
            .min_by_key(|(rank, _)| *rank);
        if let Some((_, value)) = best {
            out.insert(pid, value);
        }
    }
    out
}

/// Map declared types (and their ancestors) to a schema category and its
/// scoping class. Declared types are checked before ancestors, in
/// identifier order, so the resolution is deterministic.
pub fn resolve_category(
    types: &BTreeSet<Qid>,
    ancestors: &AncestorClosures,
    schema: &Schema,
) -> (Option<String>, Option<ScopingClass>) {
    for declared in types {
        if let Some(category) = schema.category_of(declared) {
            let class = schema.scoping_class_of(category);
            return (Some(category.to_string()), class);
        }
    }
    for declared in types {
        for ancestor in ancestors.expand(declared) {
            if let Some(category) = schema.category_of(&ancestor) {
                let class = schema.scoping_class_of(category);
                return (Some(category.to_string()), class);
            }
        }
    }
    (None, None)
}

/// Run the scoping cascade for one accepted entity.
///
/// An unmappable category short-circuits to a conservative `unscoped` —
/// even strong federation evidence does not override the ambiguity flag.
pub fn scope_entity(
    external_ids: &BTreeMap<Pid, String>,
    types: &BTreeSet<Qid>,
    ancestors: &AncestorClosures,
    schema: &Schema,
) -> ScopingOutcome {
    let (category, scoping_class) = resolve_category(types, ancestors, schema);
    if category.is_none() {
        return ScopingOutcome {
            status: ScopingStatus::Unscoped,
            confidence: 0.40,
            ambiguous_category: true,
            category: None,
            scoping_class: None,
        };
    }

    let (status, confidence) = cascade(external_ids, scoping_class);
    ScopingOutcome {
        status,
        confidence,
        ambiguous_category: false,
        category,
        scoping_class,
    }
}

fn has_id(external_ids: &BTreeMap<Pid, String>, pid: &str) -> bool {
    Pid::parse(pid)
        .ok()
        .and_then(|p| external_ids.get(&p))
        .is_some_and(|v| !v.is_empty())
}

fn cascade(
    external_ids: &BTreeMap<Pid, String>,
    scoping_class: Option<ScopingClass>,
) -> (ScopingStatus, f64) {
    if ANCIENT_WORLD_AUTHORITY_PIDS
        .iter()
        .any(|pid| has_id(external_ids, pid))
    {
        return (ScopingStatus::TemporalScoped, 0.95);
    }
    if has_id(external_ids, DPRR_PID) {
        return (ScopingStatus::TemporalScoped, 0.85);
    }
    // Domain proximity always holds for accepted entities (backlink to seed).
    if has_id(external_ids, VIAF_PID) {
        return (ScopingStatus::DomainScoped, 0.85);
    }
    if scoping_class == Some(ScopingClass::Conceptual) {
        return (ScopingStatus::DomainScoped, 0.85);
    }
    (ScopingStatus::Unscoped, 0.40)
}
