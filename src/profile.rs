//! Per-entity and run-level statement profiling.
//!
//! The profiler folds every dispatched statement into two views: an
//! [`EntityProfile`] per accepted entity (route histogram, qualifier and
//! reference rates, unsupported-pair rate, frontier eligibility) and one
//! [`RunProfile`] aggregating the whole run. Unsupported-pair rates divide
//! by statements with a present value — missing-value quarantines are
//! tracked separately and excluded from the denominator.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::claims::{EntityDoc, Rank};
use crate::dispatch::{dispatch_statement, StatementRoute};
use crate::ident::Qid;

/// Why an entity was excluded from the traversal frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrontierExclusion {
    /// Not one structural-edge statement to follow.
    NoStructuralEdges,
    /// Literal-heavy ratio above the configured threshold.
    LiteralHeavy,
}

/// Aggregated statement statistics for one accepted entity.
///
/// Frontier-ineligible entities remain valid data; they are just unsuitable
/// seeds for further traversal.
#[derive(Debug, Clone, Serialize)]
pub struct EntityProfile {
    pub statement_count: u64,
    pub with_qualifiers: u64,
    pub with_references: u64,
    pub qualifier_rate: f64,
    pub reference_rate: f64,
    pub route_counts: BTreeMap<StatementRoute, u64>,
    pub rank_counts: BTreeMap<Rank, u64>,
    pub missing_value_count: u64,
    pub unsupported_statement_count: u64,
    pub unsupported_pair_rate: f64,
    pub unsupported_pairs: BTreeMap<String, u64>,
    pub literal_heavy_ratio: f64,
    pub structural_edge_count: u64,
    pub frontier_eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontier_exclusion_reason: Option<FrontierExclusion>,
}

/// Run-level aggregate over all profiled entities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunProfile {
    pub statement_count: u64,
    pub missing_value_statement_count: u64,
    pub with_qualifiers: u64,
    pub with_references: u64,
    pub qualifier_rate: f64,
    pub reference_rate: f64,
    pub datatype_counts: BTreeMap<String, u64>,
    pub value_type_counts: BTreeMap<String, u64>,
    pub pair_counts: BTreeMap<String, u64>,
    pub route_counts: BTreeMap<StatementRoute, u64>,
    pub rank_counts: BTreeMap<Rank, u64>,
    pub unsupported_pairs: BTreeMap<String, u64>,
    pub unsupported_statement_count: u64,
    pub unsupported_pair_rate: f64,
    pub frontier_eligible_count: u64,
    pub frontier_excluded_count: u64,
}

fn rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Dispatch and profile every statement of every fetched entity.
pub fn profile_entities(
    entities: &BTreeMap<Qid, EntityDoc>,
    min_temporal_precision: u8,
    literal_heavy_threshold: f64,
) -> (RunProfile, BTreeMap<Qid, EntityProfile>) {
    let mut run = RunProfile::default();
    let mut per_entity = BTreeMap::new();

    for (qid, doc) in entities {
        let mut route_counts: BTreeMap<StatementRoute, u64> = BTreeMap::new();
        let mut rank_counts: BTreeMap<Rank, u64> = BTreeMap::new();
        let mut unsupported_pairs: BTreeMap<String, u64> = BTreeMap::new();
        let mut statement_count = 0u64;
        let mut with_qualifiers = 0u64;
        let mut with_references = 0u64;
        let mut missing_value_count = 0u64;
        let mut literal_heavy_count = 0u64;

        for statements in doc.claims.values() {
            for statement in statements {
                let routed = dispatch_statement(statement, min_temporal_precision);

                statement_count += 1;
                *route_counts.entry(routed.route).or_default() += 1;
                *rank_counts.entry(routed.rank).or_default() += 1;
                *run.route_counts.entry(routed.route).or_default() += 1;
                *run.rank_counts.entry(routed.rank).or_default() += 1;
                *run.datatype_counts
                    .entry(routed.datatype.clone())
                    .or_default() += 1;
                if !routed.value_type.is_empty() {
                    *run.value_type_counts
                        .entry(routed.value_type.clone())
                        .or_default() += 1;
                    *run.pair_counts.entry(routed.pair_key()).or_default() += 1;
                }

                if routed.has_qualifiers {
                    with_qualifiers += 1;
                    run.with_qualifiers += 1;
                }
                if routed.has_references {
                    with_references += 1;
                    run.with_references += 1;
                }

                match routed.route {
                    StatementRoute::QuarantinedMissingValue => {
                        missing_value_count += 1;
                        run.missing_value_statement_count += 1;
                    }
                    StatementRoute::QuarantinedUnsupported => {
                        *unsupported_pairs.entry(routed.pair_key()).or_default() += 1;
                        *run.unsupported_pairs.entry(routed.pair_key()).or_default() += 1;
                        run.unsupported_statement_count += 1;
                    }
                    _ => {}
                }
                if routed.route.is_literal_heavy() {
                    literal_heavy_count += 1;
                }
            }
        }
        run.statement_count += statement_count;

        let unsupported_statement_count: u64 = unsupported_pairs.values().sum();
        let present_value_count = statement_count - missing_value_count;
        let literal_heavy_ratio = rate(literal_heavy_count, statement_count);
        let structural_edge_count = route_counts
            .get(&StatementRoute::StructuralEdgeCandidate)
            .copied()
            .unwrap_or(0);

        let frontier_exclusion_reason = if structural_edge_count == 0 {
            Some(FrontierExclusion::NoStructuralEdges)
        } else if literal_heavy_ratio > literal_heavy_threshold {
            Some(FrontierExclusion::LiteralHeavy)
        } else {
            None
        };
        let frontier_eligible = frontier_exclusion_reason.is_none();
        if frontier_eligible {
            run.frontier_eligible_count += 1;
        } else {
            run.frontier_excluded_count += 1;
        }

        per_entity.insert(
            qid.clone(),
            EntityProfile {
                statement_count,
                with_qualifiers,
                with_references,
                qualifier_rate: rate(with_qualifiers, statement_count),
                reference_rate: rate(with_references, statement_count),
                route_counts,
                rank_counts,
                missing_value_count,
                unsupported_statement_count,
                unsupported_pair_rate: rate(unsupported_statement_count, present_value_count),
                unsupported_pairs,
                literal_heavy_ratio,
                structural_edge_count,
                frontier_eligible,
                frontier_exclusion_reason,
            },
        );
    }

    run.qualifier_rate = rate(run.with_qualifiers, run.statement_count);
    run.reference_rate = rate(run.with_references, run.statement_count);
    let present = run.statement_count - run.missing_value_statement_count;
    run.unsupported_pair_rate = rate(run.unsupported_statement_count, present);

    (run, per_entity)
}
