//! Bounded-depth ancestor resolution over the subclass-of relation.
//!
//! The class gate matches declared types against the allowlist directly or
//! through their `wdt:P279` ancestors. Ancestors are resolved once per run
//! with an upward breadth-first traversal: each hop collects the combined
//! frontier across all origin types, batches it through the SPARQL client,
//! and expands every origin's closure from the shared parent map. The hop
//! bound is load-bearing — the upstream taxonomy is densely cross-linked
//! and effectively cyclic, so an unbounded walk would not terminate usefully.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::client::WikidataClient;
use crate::error::QueryError;
use crate::ident::{qid_from_uri, Qid};

/// Per-origin-type ancestor closures, shared read-only after construction.
///
/// Each closure contains the origin itself, so "type or ancestor in
/// allowlist" is a single set intersection.
#[derive(Debug, Clone, Default)]
pub struct AncestorClosures {
    closures: BTreeMap<Qid, BTreeSet<Qid>>,
}

impl AncestorClosures {
    /// Build closures from precomputed parts.
    pub fn from_parts(closures: BTreeMap<Qid, BTreeSet<Qid>>) -> Self {
        Self { closures }
    }

    /// Ancestor closure for an origin type (empty set for unknown origins).
    pub fn closure_of(&self, origin: &Qid) -> Option<&BTreeSet<Qid>> {
        self.closures.get(origin)
    }

    /// Origin plus all resolved ancestors, flattened.
    pub fn expand(&self, origin: &Qid) -> BTreeSet<Qid> {
        match self.closures.get(origin) {
            Some(closure) => closure.clone(),
            None => BTreeSet::from([origin.clone()]),
        }
    }

    pub fn len(&self) -> usize {
        self.closures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closures.is_empty()
    }
}

fn parent_query(batch: &[Qid]) -> String {
    let values = batch
        .iter()
        .map(|q| format!("wd:{q}"))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "SELECT ?child ?parent WHERE {{\n\
         \x20 VALUES ?child {{ {values} }}\n\
         \x20 ?child wdt:P279 ?parent .\n\
         }}"
    )
}

/// Resolve ancestor closures for all origin types, up to `max_hops` hops.
///
/// Terminates when the frontier empties or the hop bound is reached.
/// Lookups are deduplicated within the run (each frontier node is queried
/// once per hop regardless of how many origins reached it); there is no
/// cross-run cache.
pub fn resolve_ancestors(
    client: &WikidataClient,
    origins: &BTreeSet<Qid>,
    max_hops: u32,
    batch_size: usize,
    inter_batch_delay: Duration,
) -> Result<AncestorClosures, QueryError> {
    if origins.is_empty() {
        return Ok(AncestorClosures::default());
    }

    let mut closures: BTreeMap<Qid, BTreeSet<Qid>> = origins
        .iter()
        .map(|q| (q.clone(), BTreeSet::from([q.clone()])))
        .collect();
    let mut frontier: BTreeMap<Qid, BTreeSet<Qid>> = origins
        .iter()
        .map(|q| (q.clone(), BTreeSet::from([q.clone()])))
        .collect();

    for hop in 0..max_hops {
        let frontier_nodes: BTreeSet<Qid> =
            frontier.values().flatten().cloned().collect();
        if frontier_nodes.is_empty() {
            break;
        }
        tracing::debug!(
            hop = hop + 1,
            frontier = frontier_nodes.len(),
            "resolving subclass ancestors"
        );

        let mut parent_map: BTreeMap<Qid, BTreeSet<Qid>> = BTreeMap::new();
        let nodes: Vec<Qid> = frontier_nodes.into_iter().collect();
        for batch in nodes.chunks(batch_size.max(1)) {
            let rows = client.sparql_rows(&parent_query(batch))?;
            for row in rows {
                let child = row.get("child").and_then(|uri| qid_from_uri(uri));
                let parent = row.get("parent").and_then(|uri| qid_from_uri(uri));
                if let (Some(child), Some(parent)) = (child, parent) {
                    parent_map.entry(child).or_default().insert(parent);
                }
            }
            client.pause(inter_batch_delay);
        }

        let mut next_frontier: BTreeMap<Qid, BTreeSet<Qid>> = BTreeMap::new();
        for origin in origins {
            let reached = frontier.get(origin).cloned().unwrap_or_default();
            let closure = closures.entry(origin.clone()).or_default();
            let mut fresh = BTreeSet::new();
            for node in &reached {
                if let Some(parents) = parent_map.get(node) {
                    for parent in parents {
                        if closure.insert(parent.clone()) {
                            fresh.insert(parent.clone());
                        }
                    }
                }
            }
            next_frontier.insert(origin.clone(), fresh);
        }
        frontier = next_frontier;
    }

    Ok(AncestorClosures { closures })
}
