//! Run configuration: modes, budgets, thresholds, allowlist resolution.
//!
//! A [`HarvestConfig`] carries what the operator asked for; [`resolve`]
//! combines it with the schema artifact and the seed into the effective
//! [`ResolvedSettings`] the pipeline runs with. Resolution fails fast on
//! unusable configurations (empty allowlists) before any network call.

use std::collections::BTreeSet;
use std::time::Duration;

use clap::ValueEnum;
use serde::Serialize;

use crate::client::RetryPolicy;
use crate::error::ConfigError;
use crate::ident::{Pid, Qid};
use crate::schema::Schema;

/// Curated federation property set used by production runs.
pub const DEFAULT_PROPERTY_ALLOWLIST: &[&str] =
    &["P710", "P1441", "P138", "P112", "P737", "P828"];

/// Wider bootstrap set for discovery runs: the curated core plus
/// structural/hierarchy and contextual expansion signals.
pub const DISCOVERY_PROPERTY_BOOTSTRAP: &[&str] = &[
    "P710", "P1441", "P138", "P112", "P737", "P828", "P31", "P279", "P361",
    "P527", "P131", "P17", "P39", "P106", "P921", "P101", "P2578", "P2579",
];

/// Wikidata administrative metadata properties, stripped from every resolved
/// allowlist: maintained-by-WikiProject, on-focus-list, copyright status.
pub const ADMIN_PROPERTY_DENYLIST: &[&str] = &["P6104", "P5008", "P6216"];

/// Instance-of values rejected outright. Q4167836 is "Wikimedia category" —
/// Wikipedia's filing system, not domain entities.
pub const DEFAULT_TYPE_DENYLIST: &[&str] = &["Q4167836"];

/// Run mode, selecting default budgets and whether the class gate is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Tight budgets, class-allowlist gating on by default.
    Production,
    /// Expanded budgets and property surface for hierarchy learning;
    /// class gating off by default.
    Discovery,
}

/// Class-allowlist gate mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// Disabled in discovery, schema-gated in production.
    Auto,
    /// Always gate against the schema class allowlist.
    Schema,
    /// Accept every typed, non-denylisted candidate.
    Disabled,
}

struct ModeDefaults {
    row_cap: u32,
    max_sources_per_seed: usize,
    max_new_nodes_per_seed: usize,
}

impl RunMode {
    fn defaults(self) -> ModeDefaults {
        match self {
            RunMode::Production => ModeDefaults {
                row_cap: 500,
                max_sources_per_seed: 200,
                max_new_nodes_per_seed: 100,
            },
            RunMode::Discovery => ModeDefaults {
                row_cap: 2000,
                max_sources_per_seed: 1000,
                max_new_nodes_per_seed: 1500,
            },
        }
    }
}

/// Operator-facing configuration for one harvest run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub mode: RunMode,
    /// Explicit property allowlist; empty means "use mode defaults".
    pub properties: Vec<Pid>,
    /// Union the schema relationship properties into the allowlist
    /// (discovery mode always does this).
    pub use_schema_relationship_properties: bool,
    pub gate_mode: GateMode,
    /// Row cap for the reverse-edge query; `None` = mode default.
    pub row_cap: Option<u32>,
    /// Source budget; `None` = mode default.
    pub max_sources_per_seed: Option<usize>,
    /// Node budget; `None` = mode default.
    pub max_new_nodes_per_seed: Option<usize>,
    pub unresolved_class_threshold: f64,
    pub unsupported_pair_threshold: f64,
    /// Minimum Wikidata time precision treated as a precise temporal anchor
    /// (year=9, month=10, day=11).
    pub min_temporal_precision: u8,
    pub literal_heavy_threshold: f64,
    pub max_ancestor_hops: u32,
    pub http_timeout: Duration,
    pub batch_size: usize,
    pub inter_batch_delay: Duration,
    pub retry: RetryPolicy,
    /// Extra instance-of QIDs to reject, on top of the default denylist.
    pub extra_type_denylist: Vec<Qid>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Production,
            properties: Vec::new(),
            use_schema_relationship_properties: false,
            gate_mode: GateMode::Auto,
            row_cap: None,
            max_sources_per_seed: None,
            max_new_nodes_per_seed: None,
            unresolved_class_threshold: 0.20,
            unsupported_pair_threshold: 0.10,
            min_temporal_precision: 9,
            literal_heavy_threshold: 0.80,
            max_ancestor_hops: 4,
            http_timeout: Duration::from_secs(45),
            batch_size: 40,
            inter_batch_delay: Duration::from_millis(100),
            retry: RetryPolicy::default(),
            extra_type_denylist: Vec::new(),
        }
    }
}

/// Effective settings after combining config, schema, and seed.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub row_cap: u32,
    pub max_sources_per_seed: usize,
    pub max_new_nodes_per_seed: usize,
    /// Final property allowlist, numerically sorted, admin properties
    /// stripped.
    pub property_allowlist: Vec<Pid>,
    /// True when a per-seed override from the schema replaced the allowlist.
    pub seed_override_applied: bool,
    pub class_gate_enabled: bool,
    /// Empty when the gate is disabled.
    pub class_allowlist: BTreeSet<Qid>,
    pub type_denylist: BTreeSet<Qid>,
}

fn static_pids(values: &[&str]) -> Vec<Pid> {
    values
        .iter()
        .map(|p| Pid::parse(p).expect("static property literal"))
        .collect()
}

/// Resolve the effective run settings.
///
/// Fails fast when the resolved property allowlist is empty, or the class
/// gate is enabled over an empty class allowlist — both would make the run
/// meaningless, and the failure must precede any network traffic.
pub fn resolve(
    config: &HarvestConfig,
    schema: &Schema,
    seed: &Qid,
) -> Result<ResolvedSettings, ConfigError> {
    let defaults = config.mode.defaults();
    let row_cap = config.row_cap.unwrap_or(defaults.row_cap).max(1);
    let max_sources = config
        .max_sources_per_seed
        .unwrap_or(defaults.max_sources_per_seed)
        .max(1);
    let max_new_nodes = config
        .max_new_nodes_per_seed
        .unwrap_or(defaults.max_new_nodes_per_seed)
        .max(1);

    let mut properties: BTreeSet<Pid> = if !config.properties.is_empty() {
        config.properties.iter().cloned().collect()
    } else if config.mode == RunMode::Discovery {
        static_pids(DISCOVERY_PROPERTY_BOOTSTRAP).into_iter().collect()
    } else {
        static_pids(DEFAULT_PROPERTY_ALLOWLIST).into_iter().collect()
    };

    if config.mode == RunMode::Discovery || config.use_schema_relationship_properties {
        properties.extend(schema.property_allowlist.iter().cloned());
    }

    let admin_denylist = static_pids(ADMIN_PROPERTY_DENYLIST);
    let mut property_allowlist: Vec<Pid> = properties
        .into_iter()
        .filter(|p| !admin_denylist.contains(p))
        .collect();
    property_allowlist.sort_by_key(Pid::number);

    // A per-seed anchor override replaces the resolved allowlist outright —
    // curated anchors carry a tighter property surface to cut noise.
    let mut seed_override_applied = false;
    if let Some(override_pids) = schema.seed_property_overrides.get(seed) {
        if !override_pids.is_empty() {
            property_allowlist = override_pids.clone();
            property_allowlist.sort_by_key(Pid::number);
            seed_override_applied = true;
            tracing::info!(
                seed = %seed,
                properties = ?property_allowlist.iter().map(Pid::as_str).collect::<Vec<_>>(),
                "per-seed property allowlist override applied"
            );
        }
    }

    if property_allowlist.is_empty() {
        return Err(ConfigError::EmptyPropertyAllowlist);
    }

    let class_gate_enabled = match config.gate_mode {
        GateMode::Schema => true,
        GateMode::Disabled => false,
        GateMode::Auto => config.mode == RunMode::Production,
    };
    let class_allowlist = if class_gate_enabled {
        if schema.class_allowlist.is_empty() {
            return Err(ConfigError::EmptyClassAllowlist);
        }
        schema.class_allowlist.clone()
    } else {
        BTreeSet::new()
    };

    let mut type_denylist: BTreeSet<Qid> = DEFAULT_TYPE_DENYLIST
        .iter()
        .map(|q| Qid::parse(q).expect("static type literal"))
        .collect();
    type_denylist.extend(config.extra_type_denylist.iter().cloned());

    Ok(ResolvedSettings {
        row_cap,
        max_sources_per_seed: max_sources,
        max_new_nodes_per_seed: max_new_nodes,
        property_allowlist,
        seed_override_applied,
        class_gate_enabled,
        class_allowlist,
        type_denylist,
    })
}
