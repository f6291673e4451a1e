//! Rich diagnostic error types for the wikilink harvester.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]`
//! derives, providing error codes, help text, and source chains so users
//! know exactly what went wrong and how to fix it.
//!
//! Note the deliberate split from the run report: per-candidate and
//! per-statement anomalies (denylisted types, budget overflow, unsupported
//! datatype pairs) are report data, never errors. Only run-invalidating
//! conditions live here.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for a harvest run.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text, sources) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum HarvestError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Id(#[from] IdError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Report(#[from] ReportError),
}

// ---------------------------------------------------------------------------
// Identifier errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum IdError {
    #[error("invalid item identifier: \"{value}\"")]
    #[diagnostic(
        code(wikilink::id::invalid_qid),
        help("Item identifiers are a 'Q' followed by digits, e.g. Q1048.")
    )]
    InvalidQid { value: String },

    #[error("invalid property identifier: \"{value}\"")]
    #[diagnostic(
        code(wikilink::id::invalid_pid),
        help("Property identifiers are a 'P' followed by digits, e.g. P1441.")
    )]
    InvalidPid { value: String },
}

// ---------------------------------------------------------------------------
// Query client errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error("transport failure talking to {endpoint}: {message}")]
    #[diagnostic(
        code(wikilink::query::transport),
        help(
            "The HTTP request could not complete at all (DNS, TLS, timeout). \
             Check network connectivity and the endpoint URL."
        )
    )]
    Transport { endpoint: String, message: String },

    #[error("{endpoint} returned HTTP {status}")]
    #[diagnostic(
        code(wikilink::query::status),
        help(
            "The endpoint rejected the request. 429 means rate limiting; \
             4xx usually means a malformed query."
        )
    )]
    Status { endpoint: String, status: u16 },

    #[error("retries exhausted after {attempts} attempt(s) against {endpoint}")]
    #[diagnostic(
        code(wikilink::query::retries_exhausted),
        help(
            "Every attempt failed with a transient error. The endpoint may be \
             overloaded — try again later, raise --retry-attempts, or lower \
             request volume with --sleep-ms."
        )
    )]
    RetriesExhausted { endpoint: String, attempts: u32 },

    #[error("failed to decode response from {endpoint}: {message}")]
    #[diagnostic(
        code(wikilink::query::decode),
        help(
            "The response body was not the expected JSON shape. \
             The remote API contract may have changed."
        )
    )]
    Decode { endpoint: String, message: String },
}

// ---------------------------------------------------------------------------
// Schema artifact errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SchemaError {
    #[error("failed to read schema file: {path}")]
    #[diagnostic(
        code(wikilink::schema::io),
        help("Ensure the schema file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse schema file {path}: {message}")]
    #[diagnostic(
        code(wikilink::schema::parse),
        help("The schema artifact must be valid JSON. Check for trailing commas or truncation.")
    )]
    Parse { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("property allowlist is empty")]
    #[diagnostic(
        code(wikilink::config::empty_property_allowlist),
        help(
            "Provide at least one --property, or point --schema at an artifact \
             with relationship properties."
        )
    )]
    EmptyPropertyAllowlist,

    #[error("class allowlist gating is enabled but the class allowlist is empty")]
    #[diagnostic(
        code(wikilink::config::empty_class_allowlist),
        help(
            "The schema artifact supplied no entity-type QIDs. Either fix the \
             schema or pass --class-allowlist-mode disabled."
        )
    )]
    EmptyClassAllowlist,

    #[error("unsupported traversal depth: {depth}")]
    #[diagnostic(
        code(wikilink::config::unsupported_depth),
        help("Only --max-depth 1 is currently supported.")
    )]
    UnsupportedDepth { depth: u32 },
}

// ---------------------------------------------------------------------------
// Report errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ReportError {
    #[error("failed to write report to {path}")]
    #[diagnostic(
        code(wikilink::report::io),
        help("Check that the output directory exists and is writable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for functions returning harvester results.
pub type HarvestResult<T> = std::result::Result<T, HarvestError>;
