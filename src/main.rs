//! wikilink CLI: controlled backlink harvesting against Wikidata.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use miette::{IntoDiagnostic, Result};

use wikilink::client::{RetryPolicy, WikidataClient};
use wikilink::config::{GateMode, HarvestConfig, RunMode};
use wikilink::error::ConfigError;
use wikilink::harvester::Harvester;
use wikilink::ident::{Pid, Qid};
use wikilink::report::RunReport;
use wikilink::schema::Schema;

#[derive(Parser)]
#[command(
    name = "wikilink",
    version,
    about = "Harvest, gate, and profile Wikidata backlinks for a seed item"
)]
struct Cli {
    /// Seed item identifier, e.g. Q1048.
    #[arg(long)]
    seed_qid: String,

    /// Run mode: production (tight budgets, class gating) or discovery
    /// (expanded budgets and property surface).
    #[arg(long, value_enum, default_value = "production")]
    mode: RunMode,

    /// Path to the domain schema artifact (JSON).
    #[arg(long)]
    schema: PathBuf,

    /// Directory for the run report.
    #[arg(long, default_value = "out/backlinks")]
    output_dir: PathBuf,

    /// Explicit report path, overriding the default location.
    #[arg(long)]
    report_path: Option<PathBuf>,

    /// Property allowlist entry (repeatable). Replaces the mode default.
    #[arg(long = "property")]
    properties: Vec<String>,

    /// Union the schema's relationship properties into the allowlist.
    #[arg(long)]
    use_schema_relationship_properties: bool,

    /// Class-allowlist gate mode.
    #[arg(long, value_enum, default_value = "auto")]
    class_allowlist_mode: GateMode,

    /// Extra instance-of QID to reject (repeatable).
    #[arg(long = "type-denylist-qid")]
    type_denylist_qids: Vec<String>,

    /// Traversal depth. Only depth 1 is supported.
    #[arg(long, default_value = "1")]
    max_depth: u32,

    /// Row cap for the reverse-edge query (mode default when omitted).
    #[arg(long)]
    sparql_limit: Option<u32>,

    /// Source budget: candidates ranked past this are rejected
    /// (mode default when omitted).
    #[arg(long)]
    max_sources_per_seed: Option<usize>,

    /// Node budget: accepted entities ranked past this are rejected
    /// (mode default when omitted).
    #[arg(long)]
    max_new_nodes_per_seed: Option<usize>,

    /// Unresolved-class gate threshold.
    #[arg(long, default_value = "0.20")]
    unresolved_class_threshold: f64,

    /// Unsupported-pair gate threshold.
    #[arg(long, default_value = "0.10")]
    unsupported_pair_threshold: f64,

    /// Minimum time precision treated as a precise temporal anchor
    /// (year=9, month=10, day=11).
    #[arg(long, default_value = "9")]
    min_temporal_precision: u8,

    /// Literal-heavy ratio above which an entity leaves the frontier.
    #[arg(long, default_value = "0.80")]
    literal_heavy_threshold: f64,

    /// Subclass-of traversal bound for ancestor resolution.
    #[arg(long, default_value = "4")]
    max_ancestor_hops: u32,

    /// HTTP timeout in seconds.
    #[arg(long, default_value = "45")]
    timeout_s: u64,

    /// Pause between batched requests, in milliseconds.
    #[arg(long, default_value = "100")]
    sleep_ms: u64,

    /// Identifiers per batched request.
    #[arg(long, default_value = "40")]
    batch_size: usize,

    /// Attempts per request before giving up on transient failures.
    #[arg(long, default_value = "4")]
    retry_attempts: u32,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.max_depth != 1 {
        return Err(ConfigError::UnsupportedDepth {
            depth: cli.max_depth,
        })
        .into_diagnostic();
    }

    let seed = Qid::parse(&cli.seed_qid).into_diagnostic()?;
    let properties = cli
        .properties
        .iter()
        .map(|p| Pid::parse(p))
        .collect::<std::result::Result<Vec<_>, _>>()
        .into_diagnostic()?;
    let extra_type_denylist = cli
        .type_denylist_qids
        .iter()
        .map(|q| Qid::parse(q))
        .collect::<std::result::Result<Vec<_>, _>>()
        .into_diagnostic()?;

    let config = HarvestConfig {
        mode: cli.mode,
        properties,
        use_schema_relationship_properties: cli.use_schema_relationship_properties,
        gate_mode: cli.class_allowlist_mode,
        row_cap: cli.sparql_limit,
        max_sources_per_seed: cli.max_sources_per_seed,
        max_new_nodes_per_seed: cli.max_new_nodes_per_seed,
        unresolved_class_threshold: cli.unresolved_class_threshold,
        unsupported_pair_threshold: cli.unsupported_pair_threshold,
        min_temporal_precision: cli.min_temporal_precision,
        literal_heavy_threshold: cli.literal_heavy_threshold,
        max_ancestor_hops: cli.max_ancestor_hops,
        http_timeout: Duration::from_secs(cli.timeout_s),
        batch_size: cli.batch_size,
        inter_batch_delay: Duration::from_millis(cli.sleep_ms),
        retry: RetryPolicy {
            max_attempts: cli.retry_attempts,
            ..Default::default()
        },
        extra_type_denylist,
    };

    let schema = Schema::load(&cli.schema).into_diagnostic()?;
    let client = WikidataClient::new(config.http_timeout, config.retry.clone());

    let harvester = Harvester::new(&client, &schema, &config);
    let report = harvester.run(&seed).into_diagnostic()?;

    let report_path = cli
        .report_path
        .unwrap_or_else(|| RunReport::default_path(&cli.output_dir, &seed));
    report.write(&report_path).into_diagnostic()?;

    for line in report.summary_lines() {
        println!("{line}");
    }
    println!("report={}", report_path.display());

    Ok(())
}
