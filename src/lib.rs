// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # wikilink
//!
//! A controlled backlink harvester for Wikidata. Given a seed item, it
//! discovers the entities that point at the seed through an allowlisted
//! property set, gates them against a domain schema, profiles their full
//! statement sets, scopes them against federation authorities, and emits
//! one auditable JSON report per run.
//!
//! ## Pipeline
//!
//! - **Reverse-edge discovery** (`candidate`): one SPARQL query per seed,
//!   aggregated into per-source candidates with dual budgets
//! - **Class gating** (`ancestors`, `classify`): subclass-closure matching
//!   against the schema class allowlist, with a closed rejection taxonomy
//! - **Statement triage** (`claims`, `dispatch`, `profile`): every fetched
//!   statement routed by its (datatype, value-type) pair, none dropped
//! - **Federation scoping** (`scoping`): external-authority identifiers
//!   resolved into a temporal/domain/unscoped verdict with confidence
//! - **Quality gates** (`gate`): run-level rates that flag schema drift
//!
//! ## Library usage
//!
//! ```no_run
//! use wikilink::client::WikidataClient;
//! use wikilink::config::HarvestConfig;
//! use wikilink::harvester::Harvester;
//! use wikilink::ident::Qid;
//! use wikilink::schema::Schema;
//!
//! let config = HarvestConfig::default();
//! let client = WikidataClient::new(config.http_timeout, config.retry.clone());
//! let schema = Schema::load("schema.json".as_ref()).unwrap();
//! let seed = Qid::parse("Q1048").unwrap();
//! let report = Harvester::new(&client, &schema, &config).run(&seed).unwrap();
//! println!("{}", report.gates.overall_status.as_str());
//! ```

pub mod ancestors;
pub mod candidate;
pub mod claims;
pub mod classify;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod harvester;
pub mod ident;
pub mod profile;
pub mod report;
pub mod schema;
pub mod scoping;
