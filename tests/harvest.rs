//! End-to-end tests for the harvest pipeline.
//!
//! These drive a full run — reverse-edge discovery through report
//! assembly — against a scripted transport, validating the partition
//! invariant, budget rejections, gate verdicts, and the written report.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use wikilink::classify::RejectReason;
use wikilink::client::{
    RetryPolicy, Sleeper, Transport, TransportResponse, WikidataClient,
};
use wikilink::config::HarvestConfig;
use wikilink::error::QueryError;
use wikilink::gate::RunStatus;
use wikilink::harvester::Harvester;
use wikilink::ident::{Pid, Qid};
use wikilink::report::RunReport;
use wikilink::schema::{Schema, ScopingClass};
use wikilink::scoping::ScopingStatus;

// ---------------------------------------------------------------------------
// Scripted client
// ---------------------------------------------------------------------------

struct ScriptedTransport {
    responses: RefCell<VecDeque<TransportResponse>>,
}

impl ScriptedTransport {
    fn new(bodies: Vec<String>) -> Self {
        Self {
            responses: RefCell::new(
                bodies
                    .into_iter()
                    .map(|body| TransportResponse {
                        status: 200,
                        retry_after: None,
                        body,
                    })
                    .collect(),
            ),
        }
    }
}

impl Transport for ScriptedTransport {
    fn get(
        &self,
        endpoint: &str,
        _params: &[(&str, &str)],
    ) -> Result<TransportResponse, QueryError> {
        let response = self
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected request to {endpoint}"));
        Ok(response)
    }
}

struct NoopSleeper;
impl Sleeper for NoopSleeper {
    fn sleep(&self, _: Duration) {}
}

fn scripted_client(bodies: Vec<String>) -> WikidataClient {
    WikidataClient::with_transport(
        Box::new(ScriptedTransport::new(bodies)),
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

// ---------------------------------------------------------------------------
// Wire-format builders
// ---------------------------------------------------------------------------

const ENTITY_URI: &str = "http://www.wikidata.org/entity/";
const PROP_URI: &str = "http://www.wikidata.org/prop/direct/";

fn backlink_binding(source: &str, label: &str, prop: &str, decl: Option<&str>) -> String {
    let mut fields = vec![
        format!(r#""source": {{"value": "{ENTITY_URI}{source}"}}"#),
        format!(r#""sourceLabel": {{"value": "{label}"}}"#),
        format!(r#""prop": {{"value": "{PROP_URI}{prop}"}}"#),
    ];
    if let Some(decl) = decl {
        fields.push(format!(r#""type": {{"value": "{ENTITY_URI}{decl}"}}"#));
    }
    format!("{{{}}}", fields.join(","))
}

fn sparql_body(bindings: &[String]) -> String {
    format!(r#"{{"results": {{"bindings": [{}]}}}}"#, bindings.join(","))
}

fn cicero_entity_body() -> String {
    r#"{
        "entities": {
            "Q10": {
                "labels": {"en": {"language": "en", "value": "Cicero"}},
                "claims": {
                    "P31": [{
                        "mainsnak": {
                            "datatype": "wikibase-item",
                            "datavalue": {"type": "wikibase-entityid",
                                          "value": {"id": "Q5"}}
                        },
                        "rank": "normal",
                        "references": [{"snaks": {}}]
                    }],
                    "P569": [{
                        "mainsnak": {
                            "datatype": "time",
                            "datavalue": {"type": "time",
                                          "value": {"time": "-0106-01-03T00:00:00Z",
                                                    "precision": 11}}
                        },
                        "rank": "preferred"
                    }],
                    "P1584": [{
                        "mainsnak": {
                            "datatype": "external-id",
                            "datavalue": {"type": "string", "value": "579885"}
                        },
                        "rank": "normal"
                    }],
                    "P3030": [{
                        "mainsnak": {
                            "datatype": "musical-notation",
                            "datavalue": {"type": "string", "value": "x"}
                        },
                        "rank": "normal"
                    }]
                }
            }
        }
    }"#
    .to_string()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn empty_run_produces_a_passing_report_with_one_request() {
    let client = scripted_client(vec![sparql_body(&[])]);
    let schema = person_schema();
    let config = fast_config();

    let report = Harvester::new(&client, &schema, &config)
        .run(&qid("Q1048"))
        .unwrap();

    assert_eq!(report.counts.backlink_rows, 0);
    assert_eq!(report.counts.candidate_sources_considered, 0);
    assert!(report.accepted.is_empty());
    assert!(report.rejected.is_empty());
    assert_eq!(report.gates.unresolved_class_rate, 0.0);
    assert_eq!(report.gates.overall_status, RunStatus::Pass);
}

#[test]
fn mixed_candidates_partition_and_breach_the_class_gate() {
    // Four candidates: one accepted, one untyped, one denylisted, one
    // with an unknown type. Type-related rejections are 2 of 4, breaching
    // the 0.20 unresolved-class threshold.
    let backlinks = sparql_body(&[
        backlink_binding("Q10", "Cicero", "P1441", Some("Q5")),
        backlink_binding("Q11", "untyped thing", "P710", None),
        backlink_binding("Q12", "some category", "P710", Some("Q4167836")),
        backlink_binding("Q13", "mystery", "P828", Some("Q999")),
    ]);
    let ancestors = sparql_body(&[]);
    let client = scripted_client(vec![backlinks, ancestors, cicero_entity_body()]);
    let schema = person_schema();
    let config = fast_config();

    let report = Harvester::new(&client, &schema, &config)
        .run(&qid("Q1048"))
        .unwrap();

    assert_eq!(report.counts.candidate_sources_considered, 4);
    assert_eq!(report.counts.accepted + report.counts.rejected, 4);
    assert_eq!(report.rejection_reasons[&RejectReason::NoTypes], 1);
    assert_eq!(report.rejection_reasons[&RejectReason::DenylistedType], 1);
    assert_eq!(report.rejection_reasons[&RejectReason::TypeNotAllowed], 1);

    assert!((report.gates.unresolved_class_rate - 0.5).abs() < 1e-9);
    assert!(!report.gates.unresolved_class_gate_passed);
    assert_eq!(report.gates.overall_status, RunStatus::BlockedByPolicy);

    // The accepted entity still carries its full evidence trail.
    let accepted = &report.accepted[0];
    assert_eq!(accepted.qid, qid("Q10"));
    assert_eq!(accepted.scoping.status, ScopingStatus::TemporalScoped);
    assert!((accepted.scoping.confidence - 0.95).abs() < 1e-9);
    assert_eq!(
        accepted.external_ids[&Pid::parse("P1584").unwrap()],
        "579885"
    );
    let profile = accepted.statement_profile.as_ref().unwrap();
    assert_eq!(profile.statement_count, 4);
    assert_eq!(profile.unsupported_statement_count, 1);
}

#[test]
fn source_budget_rejects_overflow_before_classification() {
    // Q20 has two backlink rows, Q21 one; with a source budget of one only
    // Q20 is considered and Q21 is rejected without type inspection.
    let backlinks = sparql_body(&[
        backlink_binding("Q20", "kept", "P710", Some("Q5")),
        backlink_binding("Q20", "kept", "P1441", Some("Q5")),
        backlink_binding("Q21", "overflow", "P710", Some("Q5")),
    ]);
    let ancestors = sparql_body(&[]);
    let entity = r#"{"entities": {}}"#.to_string();
    let client = scripted_client(vec![backlinks, ancestors, entity]);
    let schema = person_schema();
    let config = HarvestConfig {
        max_sources_per_seed: Some(1),
        ..fast_config()
    };

    let report = Harvester::new(&client, &schema, &config)
        .run(&qid("Q1048"))
        .unwrap();

    assert_eq!(report.counts.candidate_sources_before_budget, 2);
    assert_eq!(report.counts.candidate_sources_considered, 1);
    assert_eq!(report.counts.accepted, 1);
    assert_eq!(report.accepted[0].qid, qid("Q20"));
    assert_eq!(
        report.rejection_reasons[&RejectReason::SourceBudgetExceeded],
        1
    );
    let overflow = &report.rejected[0];
    assert_eq!(overflow.qid, qid("Q21"));
    assert_eq!(overflow.reason, RejectReason::SourceBudgetExceeded);

    // Budget rejections do not feed the unresolved-class gate.
    assert_eq!(report.gates.unresolved_class_rate, 0.0);
    assert_eq!(report.gates.overall_status, RunStatus::Pass);
}

#[test]
fn identical_inputs_produce_identical_reports() {
    let run = || {
        let backlinks = sparql_body(&[
            backlink_binding("Q10", "Cicero", "P1441", Some("Q5")),
            backlink_binding("Q13", "mystery", "P828", Some("Q999")),
        ]);
        let ancestors = sparql_body(&[]);
        let client = scripted_client(vec![backlinks, ancestors, cicero_entity_body()]);
        let schema = person_schema();
        let config = fast_config();
        Harvester::new(&client, &schema, &config)
            .run(&qid("Q1048"))
            .unwrap()
    };

    let mut first = serde_json::to_value(run()).unwrap();
    let mut second = serde_json::to_value(run()).unwrap();
    first.as_object_mut().unwrap().remove("generated_at");
    second.as_object_mut().unwrap().remove("generated_at");
    assert_eq!(first, second);
}

#[test]
fn report_written_to_disk_round_trips_as_json() {
    let client = scripted_client(vec![sparql_body(&[])]);
    let schema = person_schema();
    let config = fast_config();
    let report = Harvester::new(&client, &schema, &config)
        .run(&qid("Q1048"))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = RunReport::default_path(dir.path(), &qid("Q1048"));
    report.write(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["seed"], "Q1048");
    assert_eq!(value["gates"]["overall_status"], "pass");
    assert!(value["statement_summary"]["statement_count"].is_u64());
    assert!(value["accepted"].as_array().unwrap().is_empty());
}
