//! Run report: the engine's single output artifact.
//!
//! Everything a downstream loader or auditor needs lands in one JSON
//! document — configuration echo, resolved allowlists, counts, gate
//! verdicts, histograms, and the complete accepted/rejected lists. The
//! engine never writes anywhere else.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::{RejectReason, RejectedEntity};
use crate::config::{GateMode, HarvestConfig, ResolvedSettings, RunMode};
use crate::gate::GateOutcome;
use crate::error::ReportError;
use crate::ident::{Pid, Qid};
use crate::profile::{EntityProfile, RunProfile};
use crate::scoping::{ScopingOutcome, ScopingStatus};

/// Echo of the effective run configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigEcho {
    pub mode: RunMode,
    pub gate_mode: GateMode,
    pub max_depth: u32,
    pub row_cap: u32,
    pub max_sources_per_seed: usize,
    pub max_new_nodes_per_seed: usize,
    pub unresolved_class_threshold: f64,
    pub unsupported_pair_threshold: f64,
    pub min_temporal_precision: u8,
    pub literal_heavy_threshold: f64,
    pub max_ancestor_hops: u32,
    pub http_timeout_s: u64,
    pub retry_attempts: u32,
    pub batch_size: usize,
    pub inter_batch_delay_ms: u64,
}

impl ConfigEcho {
    pub fn new(config: &HarvestConfig, resolved: &ResolvedSettings) -> Self {
        Self {
            mode: config.mode,
            gate_mode: config.gate_mode,
            max_depth: 1,
            row_cap: resolved.row_cap,
            max_sources_per_seed: resolved.max_sources_per_seed,
            max_new_nodes_per_seed: resolved.max_new_nodes_per_seed,
            unresolved_class_threshold: config.unresolved_class_threshold,
            unsupported_pair_threshold: config.unsupported_pair_threshold,
            min_temporal_precision: config.min_temporal_precision,
            literal_heavy_threshold: config.literal_heavy_threshold,
            max_ancestor_hops: config.max_ancestor_hops,
            http_timeout_s: config.http_timeout.as_secs(),
            retry_attempts: config.retry.max_attempts,
            batch_size: config.batch_size,
            inter_batch_delay_ms: config.inter_batch_delay.as_millis() as u64,
        }
    }
}

/// Echo of the resolved allowlists and denylist.
#[derive(Debug, Clone, Serialize)]
pub struct AllowlistEcho {
    pub properties: Vec<Pid>,
    pub property_count: usize,
    pub seed_override_applied: bool,
    pub class_gate_enabled: bool,
    pub class_allowlist_count: usize,
    pub type_denylist: Vec<Qid>,
}

impl AllowlistEcho {
    pub fn new(resolved: &ResolvedSettings) -> Self {
        Self {
            properties: resolved.property_allowlist.clone(),
            property_count: resolved.property_allowlist.len(),
            seed_override_applied: resolved.seed_override_applied,
            class_gate_enabled: resolved.class_gate_enabled,
            class_allowlist_count: resolved.class_allowlist.len(),
            type_denylist: resolved.type_denylist.iter().cloned().collect(),
        }
    }
}

/// Stage-by-stage counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunCounts {
    pub backlink_rows: usize,
    pub candidate_sources_before_budget: usize,
    pub candidate_sources_considered: usize,
    pub accepted_before_node_budget: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub entities_profiled: usize,
    pub frontier_eligible: u64,
    pub frontier_excluded: u64,
}

/// Scoping-status histogram across accepted entities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScopingSummary {
    pub temporal_scoped: u64,
    pub domain_scoped: u64,
    pub unscoped: u64,
    pub ambiguous_category_count: u64,
}

impl ScopingSummary {
    pub fn record(&mut self, outcome: &ScopingOutcome) {
        match outcome.status {
            ScopingStatus::TemporalScoped => self.temporal_scoped += 1,
            ScopingStatus::DomainScoped => self.domain_scoped += 1,
            ScopingStatus::Unscoped => self.unscoped += 1,
        }
        if outcome.ambiguous_category {
            self.ambiguous_category_count += 1;
        }
    }
}

/// A fully processed accepted entity: candidate evidence, federation IDs,
/// scoping, and statement profile. Terminal — nothing mutates it after
/// assembly.
#[derive(Debug, Clone, Serialize)]
pub struct AcceptedEntity {
    pub qid: Qid,
    pub label: String,
    pub properties: Vec<Pid>,
    pub types: Vec<Qid>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub type_labels: BTreeMap<Qid, String>,
    pub backlink_hits: u64,
    pub matched_types: Vec<Qid>,
    pub matched_allowlist_ancestors: Vec<Qid>,
    pub external_ids: BTreeMap<Pid, String>,
    #[serde(flatten)]
    pub scoping: ScopingOutcome,
    /// Absent when the remote reported the entity missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement_profile: Option<EntityProfile>,
}

/// The complete run artifact.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub seed: Qid,
    pub config: ConfigEcho,
    pub allowlists: AllowlistEcho,
    pub counts: RunCounts,
    pub gates: GateOutcome,
    pub rejection_reasons: BTreeMap<RejectReason, u64>,
    pub scoping: ScopingSummary,
    pub statement_summary: RunProfile,
    pub accepted: Vec<AcceptedEntity>,
    pub rejected: Vec<RejectedEntity>,
}

impl RunReport {
    /// Default report location for a seed.
    pub fn default_path(output_dir: &Path, seed: &Qid) -> PathBuf {
        output_dir.join(format!("{seed}_backlink_harvest_report.json"))
    }

    /// Serialize to pretty JSON and write, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<(), ReportError> {
        let to_io = |source: std::io::Error| ReportError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(to_io)?;
        }
        let json = serde_json::to_string_pretty(self)
            .expect("run report is always serializable");
        std::fs::write(path, json).map_err(to_io)
    }

    /// Short per-run metrics summary for standard output.
    pub fn summary_lines(&self) -> Vec<String> {
        vec![
            format!("seed={}", self.seed),
            format!("backlink_rows={}", self.counts.backlink_rows),
            format!(
                "candidates_considered={}",
                self.counts.candidate_sources_considered
            ),
            format!("accepted={}", self.counts.accepted),
            format!("rejected={}", self.counts.rejected),
            format!(
                "scoping: temporal_scoped={} domain_scoped={} unscoped={} ambiguous_category={}",
                self.scoping.temporal_scoped,
                self.scoping.domain_scoped,
                self.scoping.unscoped,
                self.scoping.ambiguous_category_count
            ),
            format!(
                "frontier_eligible={} frontier_excluded={}",
                self.counts.frontier_eligible, self.counts.frontier_excluded
            ),
            format!(
                "unresolved_class_rate={:.4} gate_pass={}",
                self.gates.unresolved_class_rate, self.gates.unresolved_class_gate_passed
            ),
            format!(
                "unsupported_pair_rate={:.4} gate_pass={}",
                self.gates.unsupported_pair_rate, self.gates.unsupported_pair_gate_passed
            ),
            format!("overall_status={}", self.gates.overall_status.as_str()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::RunStatus;
    use crate::schema::Schema;

    fn minimal_report() -> RunReport {
        let config = HarvestConfig::default();
        let mut schema = Schema::default();
        schema
            .class_allowlist
            .insert(Qid::parse("Q5").unwrap());
        let seed = Qid::parse("Q1048").unwrap();
        let resolved = crate::config::resolve(&config, &schema, &seed).unwrap();
        RunReport {
            generated_at: Utc::now(),
            seed,
            config: ConfigEcho::new(&config, &resolved),
            allowlists: AllowlistEcho::new(&resolved),
            counts: RunCounts::default(),
            gates: crate::gate::evaluate(&BTreeMap::new(), 0, 0.0, 0.20, 0.10),
            rejection_reasons: BTreeMap::new(),
            scoping: ScopingSummary::default(),
            statement_summary: RunProfile::default(),
            accepted: Vec::new(),
            rejected: Vec::new(),
        }
    }

    #[test]
    fn default_path_embeds_seed() {
        let path = RunReport::default_path(
            Path::new("out/backlinks"),
            &Qid::parse("Q1048").unwrap(),
        );
        assert_eq!(
            path,
            Path::new("out/backlinks/Q1048_backlink_harvest_report.json")
        );
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/report.json");
        minimal_report().write(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["seed"], "Q1048");
        assert_eq!(value["gates"]["overall_status"], "pass");
        assert_eq!(value["config"]["mode"], "production");
    }

    #[test]
    fn summary_lines_cover_the_key_metrics() {
        let report = minimal_report();
        let lines = report.summary_lines();
        assert!(lines.iter().any(|l| l == "seed=Q1048"));
        assert!(lines.iter().any(|l| l == "overall_status=pass"));
        assert!(lines.iter().any(|l| l.starts_with("unresolved_class_rate=")));
    }

    #[test]
    fn empty_run_reports_pass() {
        let report = minimal_report();
        assert_eq!(report.gates.overall_status, RunStatus::Pass);
    }
}
