//! Blocking HTTP client for the Wikidata query service and action API.
//!
//! All network access in the harvester funnels through [`WikidataClient`].
//! Requests are synchronous and strictly sequential — the endpoints are
//! rate-sensitive, and concurrency would risk throttling or bans. Transient
//! failures (transport errors, HTTP 429/5xx) are retried with a bounded
//! backoff schedule; a server-sent `Retry-After` overrides the schedule.
//! Exhausting the retry budget is fatal — nothing is swallowed.
//!
//! The [`Transport`] and [`Sleeper`] seams exist so tests can run the full
//! retry loop against canned responses and a fake clock.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

use crate::error::QueryError;

/// Wikidata SPARQL query service.
pub const SPARQL_ENDPOINT: &str = "https://query.wikidata.org/sparql";
/// Wikidata action API (wbgetentities).
pub const API_ENDPOINT: &str = "https://www.wikidata.org/w/api.php";

const USER_AGENT: &str = concat!(
    "wikilink/",
    env!("CARGO_PKG_VERSION"),
    " (controlled backlink harvester)"
);

// ---------------------------------------------------------------------------
// Transport seam
// ---------------------------------------------------------------------------

/// A completed HTTP exchange, successful or not.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    /// Parsed `Retry-After` header (seconds), when the server sent one.
    pub retry_after: Option<u64>,
    pub body: String,
}

/// One blocking GET with query parameters.
///
/// Implementations return `Ok` for any response that reached us (including
/// error statuses — the retry loop decides what to do with those) and `Err`
/// only when no response arrived at all.
pub trait Transport {
    fn get(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<TransportResponse, QueryError>;
}

/// Production transport backed by a shared `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn get(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<TransportResponse, QueryError> {
        let mut request = self.agent.get(endpoint);
        for (key, value) in params {
            request = request.query(key, value);
        }
        match request.call() {
            Ok(response) => {
                let status = response.status();
                let body = response.into_string().map_err(|e| QueryError::Decode {
                    endpoint: endpoint.to_string(),
                    message: format!("failed to read body: {e}"),
                })?;
                Ok(TransportResponse {
                    status,
                    retry_after: None,
                    body,
                })
            }
            Err(ureq::Error::Status(status, response)) => {
                let retry_after = response
                    .header("Retry-After")
                    .and_then(|v| v.trim().parse::<u64>().ok());
                Ok(TransportResponse {
                    status,
                    retry_after,
                    body: response.into_string().unwrap_or_default(),
                })
            }
            Err(ureq::Error::Transport(transport)) => Err(QueryError::Transport {
                endpoint: endpoint.to_string(),
                message: transport.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Bounded exponential backoff: `base_delay * 2^attempt`, capped at
/// `max_delay`. An injected value, so tests can drive it with a fake sleeper.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1).
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay before retry number `attempt` (0-based: the delay after
    /// the first failure is `delay_for(0)`).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map(|d| d.min(self.max_delay))
            .unwrap_or(self.max_delay)
    }
}

/// Clock seam for in-line retry sleeps.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeper.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Blocking Wikidata client: SPARQL queries plus action-API lookups, with a
/// shared retry policy.
pub struct WikidataClient {
    transport: Box<dyn Transport>,
    retry: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
}

impl WikidataClient {
    /// Production client with the standard `ureq` transport.
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            transport: Box::new(UreqTransport::new(timeout)),
            retry,
            sleeper: Box::new(ThreadSleeper),
        }
    }

    /// Client over an arbitrary transport and sleeper (tests use this).
    pub fn with_transport(
        transport: Box<dyn Transport>,
        retry: RetryPolicy,
        sleeper: Box<dyn Sleeper>,
    ) -> Self {
        Self {
            transport,
            retry,
            sleeper,
        }
    }

    /// Run a SPARQL query, returning flat binding rows (variable → value).
    pub fn sparql_rows(
        &self,
        query: &str,
    ) -> Result<Vec<BTreeMap<String, String>>, QueryError> {
        let body = self.get_with_retry(SPARQL_ENDPOINT, &[("query", query), ("format", "json")])?;
        let payload: Value =
            serde_json::from_str(&body).map_err(|e| QueryError::Decode {
                endpoint: SPARQL_ENDPOINT.to_string(),
                message: e.to_string(),
            })?;
        let bindings = payload
            .pointer("/results/bindings")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut rows = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let mut row = BTreeMap::new();
            if let Some(vars) = binding.as_object() {
                for (name, cell) in vars {
                    if let Some(value) = cell.get("value").and_then(Value::as_str) {
                        row.insert(name.clone(), value.to_string());
                    }
                }
            }
            rows.push(row);
        }
        Ok(rows)
    }

    /// Issue an action-API request, returning the parsed JSON document.
    pub fn api_json(&self, params: &[(&str, &str)]) -> Result<Value, QueryError> {
        let body = self.get_with_retry(API_ENDPOINT, params)?;
        serde_json::from_str(&body).map_err(|e| QueryError::Decode {
            endpoint: API_ENDPOINT.to_string(),
            message: e.to_string(),
        })
    }

    /// In-line pause between batched requests, through the injected sleeper
    /// so fake clocks see it.
    pub fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            self.sleeper.sleep(duration);
        }
    }

    fn get_with_retry(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, QueryError> {
        let attempts = self.retry.max_attempts.max(1);
        for attempt in 0..attempts {
            let outcome = self.transport.get(endpoint, params);
            let retry_after = match outcome {
                Ok(response) if response.status == 200 => return Ok(response.body),
                Ok(response) if retryable_status(response.status) => {
                    tracing::warn!(
                        endpoint,
                        status = response.status,
                        attempt = attempt + 1,
                        "transient HTTP status, will retry"
                    );
                    response.retry_after
                }
                Ok(response) => {
                    // Non-transient status: surface immediately, no retry.
                    return Err(QueryError::Status {
                        endpoint: endpoint.to_string(),
                        status: response.status,
                    });
                }
                Err(err) => {
                    if attempt + 1 >= attempts {
                        return Err(err);
                    }
                    tracing::warn!(
                        endpoint,
                        attempt = attempt + 1,
                        error = %err,
                        "transport failure, will retry"
                    );
                    None
                }
            };

            if attempt + 1 >= attempts {
                break;
            }
            // Server-directed delay wins over the backoff schedule.
            let delay = retry_after
                .map(Duration::from_secs)
                .unwrap_or_else(|| self.retry.delay_for(attempt));
            self.sleeper.sleep(delay);
        }
        Err(QueryError::RetriesExhausted {
            endpoint: endpoint.to_string(),
            attempts,
        })
    }
}

fn retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

// ---------------------------------------------------------------------------
// Test doubles (shared with other modules' tests)
// ---------------------------------------------------------------------------
