//! The harvest pipeline, end to end.
//!
//! One [`Harvester::run`] call drives the full sequence for a seed:
//! reverse-edge discovery, candidate aggregation, the source budget,
//! ancestor resolution, the class gate, the node budget, claim retrieval,
//! statement profiling, scoping, and the quality gates — and assembles the
//! single [`RunReport`]. Stages run strictly in order; nothing here is
//! concurrent, and every network call goes through the injected client.

use std::collections::BTreeSet;

use chrono::Utc;

use crate::ancestors::resolve_ancestors;
use crate::candidate::{aggregate, apply_budget, backlink_query, parse_backlink_rows};
use crate::claims::fetch_claims;
use crate::classify::{classify_candidates, GateParams, RejectReason, RejectedEntity};
use crate::client::WikidataClient;
use crate::config::{self, HarvestConfig};
use crate::error::HarvestResult;
use crate::gate;
use crate::ident::Qid;
use crate::profile::profile_entities;
use crate::report::{
    AcceptedEntity, AllowlistEcho, ConfigEcho, RunCounts, RunReport, ScopingSummary,
};
use crate::schema::Schema;
use crate::scoping::{extract_external_ids, scope_entity};

/// Drives one harvest run against a seed.
pub struct Harvester<'a> {
    client: &'a WikidataClient,
    schema: &'a Schema,
    config: &'a HarvestConfig,
}

impl<'a> Harvester<'a> {
    pub fn new(client: &'a WikidataClient, schema: &'a Schema, config: &'a HarvestConfig) -> Self {
        Self {
            client,
            schema,
            config,
        }
    }

    /// Run the full pipeline for one seed and assemble the report.
    pub fn run(&self, seed: &Qid) -> HarvestResult<RunReport> {
        let resolved = config::resolve(self.config, self.schema, seed)?;
        tracing::info!(
            seed = %seed,
            properties = resolved.property_allowlist.len(),
            row_cap = resolved.row_cap,
            class_gate = resolved.class_gate_enabled,
            "harvest run starting"
        );

        // Stage 1: reverse-edge discovery.
        let query = backlink_query(seed, &resolved.property_allowlist, resolved.row_cap);
        let rows = self.client.sparql_rows(&query)?;
        let backlink_rows = parse_backlink_rows(&rows);
        tracing::info!(rows = backlink_rows.len(), "reverse-edge rows fetched");

        // Stage 2: aggregation and the source budget.
        let by_source = aggregate(&backlink_rows);
        let before_budget = by_source.len();
        let (kept, source_overflow) = apply_budget(
            by_source.into_values().collect(),
            resolved.max_sources_per_seed,
        );
        let considered = kept.len();
        tracing::info!(
            sources = before_budget,
            considered,
            overflow = source_overflow.len(),
            "candidates aggregated"
        );

        // Stage 3: ancestor resolution over every declared type. The gate
        // and category resolution both read from the same closures.
        let declared_types: BTreeSet<Qid> = kept
            .iter()
            .flat_map(|c| c.types.iter().cloned())
            .collect();
        let ancestors = resolve_ancestors(
            self.client,
            &declared_types,
            self.config.max_ancestor_hops,
            self.config.batch_size,
            self.config.inter_batch_delay,
        )?;
        tracing::info!(origin_types = ancestors.len(), "ancestor closures resolved");

        // Stage 4: classification, then the node budget on the survivors.
        let params = GateParams {
            class_allowlist: &resolved.class_allowlist,
            type_denylist: &resolved.type_denylist,
            gate_enabled: resolved.class_gate_enabled,
        };
        let (mut accepted, mut rejected, mut reasons) =
            classify_candidates(kept, &params, &ancestors);
        let accepted_before_node_budget = accepted.len();
        // Classification preserves the budget ranking, so truncation is the
        // node-budget cut.
        let cut = resolved.max_new_nodes_per_seed.min(accepted.len());
        let node_overflow = accepted.split_off(cut);

        for candidate in &source_overflow {
            *reasons
                .entry(RejectReason::SourceBudgetExceeded)
                .or_default() += 1;
            rejected.push(RejectedEntity::from_candidate(
                candidate,
                RejectReason::SourceBudgetExceeded,
            ));
        }
        for entry in &node_overflow {
            *reasons.entry(RejectReason::NodeBudgetExceeded).or_default() += 1;
            rejected.push(RejectedEntity::from_candidate(
                &entry.candidate,
                RejectReason::NodeBudgetExceeded,
            ));
        }
        tracing::info!(
            accepted = accepted.len(),
            rejected = rejected.len(),
            node_overflow = node_overflow.len(),
            "classification complete"
        );

        // Stage 5: full statements for the accepted set.
        let accepted_qids: Vec<Qid> = accepted.iter().map(|a| a.candidate.qid.clone()).collect();
        let docs = fetch_claims(
            self.client,
            &accepted_qids,
            self.config.batch_size,
            self.config.inter_batch_delay,
        )?;
        tracing::info!(entities = docs.len(), "statements fetched");

        // Stage 6: profiling and scoping.
        let (run_profile, mut entity_profiles) = profile_entities(
            &docs,
            self.config.min_temporal_precision,
            self.config.literal_heavy_threshold,
        );

        let mut scoping_summary = ScopingSummary::default();
        let mut accepted_entities = Vec::with_capacity(accepted.len());
        for entry in accepted {
            let qid = entry.candidate.qid.clone();
            let external_ids = docs
                .get(&qid)
                .map(extract_external_ids)
                .unwrap_or_default();
            let scoping = scope_entity(
                &external_ids,
                &entry.candidate.types,
                &ancestors,
                self.schema,
            );
            scoping_summary.record(&scoping);

            let label = if entry.candidate.label.is_empty() {
                docs.get(&qid)
                    .map(|d| d.label_en().to_string())
                    .unwrap_or_default()
            } else {
                entry.candidate.label.clone()
            };
            accepted_entities.push(AcceptedEntity {
                qid: qid.clone(),
                label,
                properties: entry.candidate.properties.iter().cloned().collect(),
                types: entry.candidate.types.iter().cloned().collect(),
                type_labels: entry.candidate.type_labels.clone(),
                backlink_hits: entry.candidate.backlink_hits,
                matched_types: entry.matched_types,
                matched_allowlist_ancestors: entry.matched_allowlist_ancestors,
                external_ids,
                scoping,
                statement_profile: entity_profiles.remove(&qid),
            });
        }

        // Stage 7: quality gates over the whole run.
        let gates = gate::evaluate(
            &reasons,
            considered,
            run_profile.unsupported_pair_rate,
            self.config.unresolved_class_threshold,
            self.config.unsupported_pair_threshold,
        );
        tracing::info!(
            status = gates.overall_status.as_str(),
            unresolved_class_rate = gates.unresolved_class_rate,
            unsupported_pair_rate = gates.unsupported_pair_rate,
            "gates evaluated"
        );

        let counts = RunCounts {
            backlink_rows: backlink_rows.len(),
            candidate_sources_before_budget: before_budget,
            candidate_sources_considered: considered,
            accepted_before_node_budget,
            accepted: accepted_entities.len(),
            rejected: rejected.len(),
            entities_profiled: docs.len(),
            frontier_eligible: run_profile.frontier_eligible_count,
            frontier_excluded: run_profile.frontier_excluded_count,
        };

        Ok(RunReport {
            generated_at: Utc::now(),
            seed: seed.clone(),
            config: ConfigEcho::new(self.config, &resolved),
            allowlists: AllowlistEcho::new(&resolved),
            counts,
            gates,
            rejection_reasons: reasons,
            scoping: scoping_summary,
            statement_summary: run_profile,
            accepted: accepted_entities,
            rejected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::client::testing::ScriptedTransport;
    use crate::client::{RetryPolicy, Sleeper, TransportResponse, WikidataClient};
    use crate::config::GateMode;
    use crate::error::QueryError;
    use crate::gate::RunStatus;
    use crate::ident::Pid;
    use crate::schema::ScopingClass;
    use crate::scoping::ScopingStatus;

    struct NoopSleeper;
    impl Sleeper for NoopSleeper {
        fn sleep(&self, _: Duration) {}
    }

    fn client_with(responses: Vec<Result<TransportResponse, QueryError>>) -> WikidataClient {
        WikidataClient::with_transport(
            Box::new(ScriptedTransport::new(responses)),
            RetryPolicy::default(),
            Box::new(NoopSleeper),
        )
    }

    fn qid(s: &str) -> Qid {
        Qid::parse(s).unwrap()
    }

    fn fast_config() -> HarvestConfig {
        HarvestConfig {
            inter_batch_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn person_schema() -> Schema {
        let mut schema = Schema::default();
        schema.class_allowlist.insert(qid("Q5"));
        schema.type_categories.insert(qid("Q5"), "Person".into());
        schema
            .category_scoping
            .insert("Person".into(), ScopingClass::Temporal);
        schema
    }

    fn sparql_binding(fields: &[(&str, &str)]) -> String {
        let inner: Vec<String> = fields
            .iter()
            .map(|(k, v)| format!(r#""{k}": {{"value": "{v}"}}"#))
            .collect();
        format!("{{{}}}", inner.join(","))
    }

    fn sparql_body(bindings: &[String]) -> String {
        format!(
            r#"{{"results": {{"bindings": [{}]}}}}"#,
            bindings.join(",")
        )
    }

    const ENTITY_URI: &str = "http://www.wikidata.org/entity/";

    fn backlink_binding(source: &str, label: &str, prop: &str, decl: &str) -> String {
        sparql_binding(&[
            ("source", &format!("{ENTITY_URI}{source}")),
            ("sourceLabel", label),
            ("prop", &format!("http://www.wikidata.org/prop/direct/{prop}")),
            ("type", &format!("{ENTITY_URI}{decl}")),
        ])
    }

    #[test]
    fn empty_backlink_result_yields_a_passing_empty_report() {
        // One SPARQL request, nothing else: no typed candidates means no
        // ancestor or claim traffic.
        let client = client_with(vec![ScriptedTransport::ok(&sparql_body(&[]))]);
        let schema = person_schema();
        let config = fast_config();
        let harvester = Harvester::new(&client, &schema, &config);

        let report = harvester.run(&qid("Q1048")).unwrap();
        assert_eq!(report.counts.backlink_rows, 0);
        assert_eq!(report.counts.accepted, 0);
        assert_eq!(report.counts.rejected, 0);
        assert_eq!(report.gates.overall_status, RunStatus::Pass);
        assert!(report.rejection_reasons.is_empty());
    }

    #[test]
    fn accepted_candidate_flows_through_to_the_report() {
        let backlinks = sparql_body(&[backlink_binding(
            "Q42",
            "Marcus Tullius Cicero",
            "P1441",
            "Q5",
        )]);
        // Q5 has no superclasses in this script; the frontier empties after
        // one hop.
        let ancestors = sparql_body(&[]);
        let entity = r#"{
            "entities": {
                "Q42": {
                    "labels": {"en": {"language": "en", "value": "Marcus Tullius Cicero"}},
                    "claims": {
                        "P31": [{
                            "mainsnak": {
                                "datatype": "wikibase-item",
                                "datavalue": {"type": "wikibase-entityid",
                                              "value": {"id": "Q5"}}
                            },
                            "rank": "normal"
                        }],
                        "P214": [{
                            "mainsnak": {
                                "datatype": "external-id",
                                "datavalue": {"type": "string", "value": "113230702"}
                            },
                            "rank": "normal"
                        }]
                    }
                }
            }
        }"#;
        let client = client_with(vec![
            ScriptedTransport::ok(&backlinks),
            ScriptedTransport::ok(&ancestors),
            ScriptedTransport::ok(entity),
        ]);
        let schema = person_schema();
        let config = fast_config();
        let harvester = Harvester::new(&client, &schema, &config);

        let report = harvester.run(&qid("Q1048")).unwrap();
        assert_eq!(report.counts.accepted, 1);
        let accepted = &report.accepted[0];
        assert_eq!(accepted.qid, qid("Q42"));
        assert_eq!(accepted.matched_types, vec![qid("Q5")]);
        assert_eq!(accepted.external_ids[&Pid::parse("P214").unwrap()], "113230702");
        // VIAF plus a resolvable category scopes to the domain.
        assert_eq!(accepted.scoping.status, ScopingStatus::DomainScoped);
        let profile = accepted.statement_profile.as_ref().unwrap();
        assert_eq!(profile.statement_count, 2);
        assert_eq!(report.gates.overall_status, RunStatus::Pass);
        assert_eq!(report.scoping.domain_scoped, 1);
    }

    #[test]
    fn node_budget_overflow_lands_in_rejected_with_reason() {
        let backlinks = sparql_body(&[
            backlink_binding("Q1", "a", "P710", "Q5"),
            backlink_binding("Q1", "a", "P1441", "Q5"),
            backlink_binding("Q2", "b", "P710", "Q5"),
        ]);
        let ancestors = sparql_body(&[]);
        let entity = r#"{"entities": {}}"#;
        let client = client_with(vec![
            ScriptedTransport::ok(&backlinks),
            ScriptedTransport::ok(&ancestors),
            ScriptedTransport::ok(entity),
        ]);
        let schema = person_schema();
        let config = HarvestConfig {
            max_new_nodes_per_seed: Some(1),
            ..fast_config()
        };
        let harvester = Harvester::new(&client, &schema, &config);

        let report = harvester.run(&qid("Q1048")).unwrap();
        // Q1 outranks Q2 on backlink hits and survives the cut.
        assert_eq!(report.counts.accepted, 1);
        assert_eq!(report.accepted[0].qid, qid("Q1"));
        assert_eq!(report.counts.accepted_before_node_budget, 2);
        let budget_rejects: Vec<_> = report
            .rejected
            .iter()
            .filter(|r| r.reason == RejectReason::NodeBudgetExceeded)
            .collect();
        assert_eq!(budget_rejects.len(), 1);
        assert_eq!(budget_rejects[0].qid, qid("Q2"));
        assert_eq!(
            report.rejection_reasons[&RejectReason::NodeBudgetExceeded],
            1
        );
    }

    #[test]
    fn gate_disabled_run_accepts_unknown_types_as_ambiguous() {
        let backlinks = sparql_body(&[backlink_binding("Q7", "thing", "P710", "Q999")]);
        let ancestors = sparql_body(&[]);
        let entity = r#"{"entities": {}}"#;
        let client = client_with(vec![
            ScriptedTransport::ok(&backlinks),
            ScriptedTransport::ok(&ancestors),
            ScriptedTransport::ok(entity),
        ]);
        let schema = person_schema();
        let config = HarvestConfig {
            gate_mode: GateMode::Disabled,
            ..fast_config()
        };
        let harvester = Harvester::new(&client, &schema, &config);

        let report = harvester.run(&qid("Q1048")).unwrap();
        assert_eq!(report.counts.accepted, 1);
        assert!(report.accepted[0].scoping.ambiguous_category);
        assert_eq!(report.scoping.ambiguous_category_count, 1);
        assert_eq!(report.scoping.unscoped, 1);
    }
}
