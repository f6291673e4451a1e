//! Accept/reject decision per candidate.
//!
//! Order matters: untyped candidates first, then the type denylist, then the
//! class-allowlist gate (when enabled). A denylisted type always rejects,
//! even if another declared type would have matched the allowlist. Every
//! candidate ends up in exactly one partition, and every rejection carries
//! one reason from the closed enumeration — nothing is silently dropped.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::ancestors::AncestorClosures;
use crate::candidate::Candidate;
use crate::ident::{Pid, Qid};

/// Closed rejection reason enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No declared instance-of type at all.
    NoTypes,
    /// A declared type intersects the type denylist.
    DenylistedType,
    /// Class gate active and no declared type (or ancestor) is allowlisted.
    TypeNotAllowed,
    /// Ranked below the source budget cut, before classification.
    SourceBudgetExceeded,
    /// Ranked below the node budget cut, after classification.
    NodeBudgetExceeded,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::NoTypes => "no_types",
            RejectReason::DenylistedType => "denylisted_type",
            RejectReason::TypeNotAllowed => "type_not_allowed",
            RejectReason::SourceBudgetExceeded => "source_budget_exceeded",
            RejectReason::NodeBudgetExceeded => "node_budget_exceeded",
        }
    }

    /// Reasons that feed the unresolved-class gate rate.
    pub fn is_type_related(self) -> bool {
        matches!(self, RejectReason::NoTypes | RejectReason::TypeNotAllowed)
    }
}

/// A candidate that survived the gate, with its matching evidence.
#[derive(Debug, Clone)]
pub struct AcceptedCandidate {
    pub candidate: Candidate,
    /// Declared types that matched (directly or via an ancestor).
    pub matched_types: Vec<Qid>,
    /// Allowlist entries the match went through.
    pub matched_allowlist_ancestors: Vec<Qid>,
}

/// A rejected candidate as it appears in the report.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedEntity {
    pub qid: Qid,
    pub label: String,
    pub reason: RejectReason,
    pub properties: Vec<Pid>,
    pub types: Vec<Qid>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub denylist_hits: Vec<Qid>,
    pub backlink_hits: u64,
}

impl RejectedEntity {
    /// Build a rejection row from a frozen candidate.
    pub fn from_candidate(candidate: &Candidate, reason: RejectReason) -> Self {
        Self {
            qid: candidate.qid.clone(),
            label: candidate.label.clone(),
            reason,
            properties: candidate.properties.iter().cloned().collect(),
            types: candidate.types.iter().cloned().collect(),
            denylist_hits: Vec::new(),
            backlink_hits: candidate.backlink_hits,
        }
    }
}

/// Gate inputs, borrowed from the resolved run settings.
pub struct GateParams<'a> {
    pub class_allowlist: &'a BTreeSet<Qid>,
    pub type_denylist: &'a BTreeSet<Qid>,
    pub gate_enabled: bool,
}

/// Partition candidates into accepted and rejected.
///
/// Returns the two partitions plus a rejection-reason histogram. The
/// invariant `accepted.len() + rejected.len() == candidates.len()` always
/// holds.
pub fn classify_candidates(
    candidates: Vec<Candidate>,
    params: &GateParams<'_>,
    ancestors: &AncestorClosures,
) -> (
    Vec<AcceptedCandidate>,
    Vec<RejectedEntity>,
    BTreeMap<RejectReason, u64>,
) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    let mut reasons: BTreeMap<RejectReason, u64> = BTreeMap::new();

    for candidate in candidates {
        if candidate.types.is_empty() {
            *reasons.entry(RejectReason::NoTypes).or_default() += 1;
            rejected.push(RejectedEntity::from_candidate(
                &candidate,
                RejectReason::NoTypes,
            ));
            continue;
        }

        let denylist_hits: Vec<Qid> = candidate
            .types
            .intersection(params.type_denylist)
            .cloned()
            .collect();
        if !denylist_hits.is_empty() {
            *reasons.entry(RejectReason::DenylistedType).or_default() += 1;
            let mut row =
                RejectedEntity::from_candidate(&candidate, RejectReason::DenylistedType);
            row.denylist_hits = denylist_hits;
            rejected.push(row);
            continue;
        }

        if !params.gate_enabled {
            let matched_types: Vec<Qid> = candidate.types.iter().cloned().collect();
            accepted.push(AcceptedCandidate {
                candidate,
                matched_types,
                matched_allowlist_ancestors: Vec::new(),
            });
            continue;
        }

        let mut matched_types: BTreeSet<Qid> = BTreeSet::new();
        let mut matched_ancestors: BTreeSet<Qid> = BTreeSet::new();
        for declared in &candidate.types {
            if params.class_allowlist.contains(declared) {
                matched_types.insert(declared.clone());
                matched_ancestors.insert(declared.clone());
                continue;
            }
            if let Some(closure) = ancestors.closure_of(declared) {
                if let Some(hit) = closure
                    .iter()
                    .find(|anc| params.class_allowlist.contains(*anc))
                {
                    matched_types.insert(declared.clone());
                    matched_ancestors.insert(hit.clone());
                }
            }
        }

        if matched_types.is_empty() {
            *reasons.entry(RejectReason::TypeNotAllowed).or_default() += 1;
            rejected.push(RejectedEntity::from_candidate(
                &candidate,
                RejectReason::TypeNotAllowed,
            ));
            continue;
        }

        accepted.push(AcceptedCandidate {
            candidate,
            matched_types: matched_types.into_iter().collect(),
            matched_allowlist_ancestors: matched_ancestors.into_iter().collect(),
        });
    }

    (accepted, rejected, reasons)
}
