//! Batched full-statement retrieval for accepted entities.
//!
//! Accepted identifiers are fetched through the action API in bounded
//! batches (`wbgetentities`, labels + claims, English labels) and merged
//! into one identifier-keyed map. Entities the remote reports `missing`
//! simply do not appear in the map — that is "no profile", not an error.
//!
//! The serde structs here mirror the wire format only as deeply as the
//! dispatcher needs: datatype, datavalue type/payload, rank, and
//! qualifier/reference presence.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::client::WikidataClient;
use crate::error::QueryError;
use crate::ident::Qid;

/// Statement rank. Best-rank extraction prefers preferred over normal over
/// deprecated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Preferred,
    Normal,
    Deprecated,
}

impl Rank {
    /// Parse a wire rank string; anything unrecognized is treated as normal.
    pub fn parse(value: &str) -> Rank {
        match value {
            "preferred" => Rank::Preferred,
            "deprecated" => Rank::Deprecated,
            _ => Rank::Normal,
        }
    }
}

/// The typed payload of a snak, when present.
#[derive(Debug, Clone, Deserialize)]
pub struct DataValue {
    /// Value-shape tag (`wikibase-entityid`, `time`, `string`, ...).
    #[serde(rename = "type", default)]
    pub value_type: String,
    #[serde(default)]
    pub value: Value,
}

impl DataValue {
    /// Time precision for `time`-shaped values (year=9, month=10, day=11).
    pub fn time_precision(&self) -> Option<u8> {
        self.value
            .get("precision")
            .and_then(Value::as_u64)
            .and_then(|p| u8::try_from(p).ok())
    }

    /// String payload for `string`-shaped values (external IDs, URLs, media
    /// file names).
    pub fn as_string(&self) -> Option<&str> {
        self.value.as_str()
    }
}

/// The main snak of a statement: declared datatype plus optional payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Snak {
    #[serde(default)]
    pub datatype: String,
    #[serde(default)]
    pub datavalue: Option<DataValue>,
}

/// One property statement on an entity.
#[derive(Debug, Clone, Deserialize)]
pub struct Statement {
    pub mainsnak: Snak,
    #[serde(default = "default_rank")]
    rank: String,
    #[serde(default)]
    qualifiers: BTreeMap<String, Value>,
    #[serde(default)]
    references: Vec<Value>,
}

fn default_rank() -> String {
    "normal".to_string()
}

impl Statement {
    pub fn rank(&self) -> Rank {
        Rank::parse(&self.rank)
    }

    pub fn has_qualifiers(&self) -> bool {
        !self.qualifiers.is_empty()
    }

    pub fn has_references(&self) -> bool {
        !self.references.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct LabelEntry {
    #[serde(default)]
    value: String,
}

/// A fetched entity: labels and the full claim map (property → statements).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EntityDoc {
    #[serde(default)]
    labels: BTreeMap<String, LabelEntry>,
    #[serde(default)]
    pub claims: BTreeMap<String, Vec<Statement>>,
}

impl EntityDoc {
    pub fn label_en(&self) -> &str {
        self.labels
            .get("en")
            .map(|l| l.value.as_str())
            .unwrap_or_default()
    }

    pub fn statement_count(&self) -> usize {
        self.claims.values().map(Vec::len).sum()
    }
}

/// Fetch full statement sets for the given identifiers, in bounded batches.
pub fn fetch_claims(
    client: &WikidataClient,
    qids: &[Qid],
    batch_size: usize,
    inter_batch_delay: Duration,
) -> Result<BTreeMap<Qid, EntityDoc>, QueryError> {
    let mut out = BTreeMap::new();
    for batch in qids.chunks(batch_size.max(1)) {
        let ids = batch
            .iter()
            .map(Qid::as_str)
            .collect::<Vec<_>>()
            .join("|");
        let payload = client.api_json(&[
            ("action", "wbgetentities"),
            ("format", "json"),
            ("ids", &ids),
            ("languages", "en"),
            ("props", "labels|claims"),
        ])?;

        let Some(entities) = payload.get("entities").and_then(Value::as_object) else {
            continue;
        };
        for (raw_qid, entity) in entities {
            let Ok(qid) = Qid::parse(raw_qid) else { continue };
            // Absent upstream is absence here, not an error.
            if entity.get("missing").is_some() {
                tracing::debug!(qid = %qid, "entity reported missing upstream");
                continue;
            }
            let doc: EntityDoc =
                serde_json::from_value(entity.clone()).map_err(|e| QueryError::Decode {
                    endpoint: crate::client::API_ENDPOINT.to_string(),
                    message: format!("entity {qid}: {e}"),
                })?;
            out.insert(qid, doc);
        }
        client.pause(inter_batch_delay);
    }
    Ok(out)
}
