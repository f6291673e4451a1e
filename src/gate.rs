//! Run-level data-quality gates.
//!
//! Two rates guard against silent schema or allowlist drift: the
//! unresolved-class rate (type-related rejections over candidates
//! considered) and the unsupported-pair rate (quarantined-unsupported
//! statements over statements with a present value). A gate violation is
//! not an error — the run completes and reports `blocked_by_policy`, and
//! the halt decision belongs to the caller.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::classify::RejectReason;

/// Final status of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pass,
    BlockedByPolicy,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pass => "pass",
            RunStatus::BlockedByPolicy => "blocked_by_policy",
        }
    }
}

/// Gate rates, per-gate verdicts, and the overall status.
#[derive(Debug, Clone, Serialize)]
pub struct GateOutcome {
    pub unresolved_class_rate: f64,
    pub unresolved_class_gate_passed: bool,
    pub unsupported_pair_rate: f64,
    pub unsupported_pair_gate_passed: bool,
    pub overall_status: RunStatus,
}

/// Evaluate both gates. Empty denominators rate as 0.0, so a run with zero
/// candidates trivially passes.
pub fn evaluate(
    rejection_reasons: &BTreeMap<RejectReason, u64>,
    candidates_considered: usize,
    unsupported_pair_rate: f64,
    unresolved_class_threshold: f64,
    unsupported_pair_threshold: f64,
) -> GateOutcome {
    let unresolved: u64 = rejection_reasons
        .iter()
        .filter(|(reason, _)| reason.is_type_related())
        .map(|(_, count)| count)
        .sum();
    let unresolved_class_rate = if candidates_considered == 0 {
        0.0
    } else {
        unresolved as f64 / candidates_considered as f64
    };

    let unresolved_class_gate_passed = unresolved_class_rate <= unresolved_class_threshold;
    let unsupported_pair_gate_passed = unsupported_pair_rate <= unsupported_pair_threshold;
    let overall_status = if unresolved_class_gate_passed && unsupported_pair_gate_passed {
        RunStatus::Pass
    } else {
        RunStatus::BlockedByPolicy
    };

    GateOutcome {
        unresolved_class_rate,
        unresolved_class_gate_passed,
        unsupported_pair_rate,
        unsupported_pair_gate_passed,
        overall_status,
    }
}
