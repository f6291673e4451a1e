//! Reverse-edge rows and candidate aggregation.
//!
//! The reverse-edge SPARQL query returns one row per (source, property,
//! declared-type) combination; aggregation groups rows by source identifier
//! into [`Candidate`] records with set/count semantics, so the result is
//! independent of row order. Budget truncation ranks candidates by
//! (backlink hits desc, matched-property count desc, QID asc) and cuts at
//! the cap; overflow is returned, never silently dropped.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::ident::{pid_from_uri, qid_from_uri, Pid, Qid};

/// One parsed reverse-edge row.
#[derive(Debug, Clone)]
pub struct BacklinkRow {
    pub source: Qid,
    pub label: String,
    pub property: Option<Pid>,
    pub declared_type: Option<Qid>,
    pub type_label: String,
}

/// Build the reverse-edge query: everything pointing at the seed through an
/// allowlisted property, with the source's declared types and English labels.
pub fn backlink_query(seed: &Qid, properties: &[Pid], row_cap: u32) -> String {
    let prop_values = properties
        .iter()
        .map(|p| format!("wdt:{p}"))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "SELECT ?source ?sourceLabel ?prop ?type ?typeLabel WHERE {{\n\
         \x20 BIND(wd:{seed} AS ?target)\n\
         \x20 VALUES ?prop {{ {prop_values} }}\n\
         \x20 ?source ?prop ?target .\n\
         \x20 OPTIONAL {{ ?source wdt:P31 ?type . }}\n\
         \x20 SERVICE wikibase:label {{ bd:serviceParam wikibase:language \"en\". }}\n\
         }}\n\
         LIMIT {row_cap}"
    )
}

/// Parse flat SPARQL binding rows into [`BacklinkRow`]s.
///
/// Rows whose source is not a valid item URI are ignored (the label service
/// can emit blank-node artifacts).
pub fn parse_backlink_rows(rows: &[BTreeMap<String, String>]) -> Vec<BacklinkRow> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(source) = row.get("source").and_then(|uri| qid_from_uri(uri)) else {
            continue;
        };
        out.push(BacklinkRow {
            source,
            label: row.get("sourceLabel").cloned().unwrap_or_default(),
            property: row.get("prop").and_then(|uri| pid_from_uri(uri)),
            declared_type: row.get("type").and_then(|uri| qid_from_uri(uri)),
            type_label: row.get("typeLabel").cloned().unwrap_or_default(),
        });
    }
    out
}

/// A source entity aggregated from its reverse-edge rows. Frozen before
/// classification; nothing mutates it afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub qid: Qid,
    pub label: String,
    /// Allowlisted properties through which this source points at the seed.
    pub properties: BTreeSet<Pid>,
    /// Declared instance-of types.
    pub types: BTreeSet<Qid>,
    /// English labels for declared types, where the label service had one.
    pub type_labels: BTreeMap<Qid, String>,
    /// Number of reverse-edge rows that named this source.
    pub backlink_hits: u64,
}

/// Group rows by source identifier.
///
/// First non-empty label wins; properties and types accumulate as sets, so
/// feeding rows in any order produces the same candidates.
pub fn aggregate(rows: &[BacklinkRow]) -> BTreeMap<Qid, Candidate> {
    let mut candidates: BTreeMap<Qid, Candidate> = BTreeMap::new();
    for row in rows {
        let entry = candidates
            .entry(row.source.clone())
            .or_insert_with(|| Candidate {
                qid: row.source.clone(),
                label: String::new(),
                properties: BTreeSet::new(),
                types: BTreeSet::new(),
                type_labels: BTreeMap::new(),
                backlink_hits: 0,
            });
        entry.backlink_hits += 1;
        if entry.label.is_empty() && !row.label.is_empty() {
            entry.label = row.label.clone();
        }
        if let Some(pid) = &row.property {
            entry.properties.insert(pid.clone());
        }
        if let Some(qid) = &row.declared_type {
            entry.types.insert(qid.clone());
            if !row.type_label.is_empty() {
                entry
                    .type_labels
                    .entry(qid.clone())
                    .or_insert_with(|| row.type_label.clone());
            }
        }
    }
    candidates
}

/// Rank candidates by (hits desc, property-set size desc, QID asc) and
/// truncate at `cap`. Returns `(kept, overflow)`.
pub fn apply_budget(
    candidates: Vec<Candidate>,
    cap: usize,
) -> (Vec<Candidate>, Vec<Candidate>) {
    let mut ordered = candidates;
    ordered.sort_by(|a, b| {
        b.backlink_hits
            .cmp(&a.backlink_hits)
            .then(b.properties.len().cmp(&a.properties.len()))
            .then(a.qid.cmp(&b.qid))
    });
    let overflow = ordered.split_off(cap.min(ordered.len()));
    (ordered, overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(source: &str, prop: &str, decl: Option<&str>, label: &str) -> BacklinkRow {
        BacklinkRow {
            source: Qid::parse(source).unwrap(),
            label: label.to_string(),
            property: Some(Pid::parse(prop).unwrap()),
            declared_type: decl.map(|q| Qid::parse(q).unwrap()),
            type_label: String::new(),
        }
    }

    #[test]
    fn query_embeds_seed_allowlist_and_cap() {
        let query = backlink_query(
            &Qid::parse("Q1048").unwrap(),
            &[Pid::parse("P710").unwrap(), Pid::parse("P1441").unwrap()],
            500,
        );
        assert!(query.contains("BIND(wd:Q1048 AS ?target)"));
        assert!(query.contains("VALUES ?prop { wdt:P710 wdt:P1441 }"));
        assert!(query.contains("LIMIT 500"));
    }

    #[test]
    fn parse_ignores_rows_without_item_source() {
        let mut good = BTreeMap::new();
        good.insert(
            "source".to_string(),
            "http://www.wikidata.org/entity/Q42".to_string(),
        );
        let mut bad = BTreeMap::new();
        bad.insert("source".to_string(), "_:blank".to_string());
        let rows = parse_backlink_rows(&[good, bad]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source.as_str(), "Q42");
    }

    #[test]
    fn aggregation_accumulates_sets_and_hits() {
        let rows = vec![
            row("Q42", "P710", Some("Q5"), "Douglas Adams"),
            row("Q42", "P1441", Some("Q5"), ""),
            row("Q42", "P710", Some("Q36180"), ""),
        ];
        let candidates = aggregate(&rows);
        let c = &candidates[&Qid::parse("Q42").unwrap()];
        assert_eq!(c.backlink_hits, 3);
        assert_eq!(c.properties.len(), 2);
        assert_eq!(c.types.len(), 2);
        assert_eq!(c.label, "Douglas Adams");
    }

    #[test]
    fn first_nonempty_label_wins() {
        let rows = vec![
            row("Q42", "P710", None, ""),
            row("Q42", "P710", None, "Douglas Adams"),
            row("Q42", "P710", None, "Other"),
        ];
        let candidates = aggregate(&rows);
        assert_eq!(candidates[&Qid::parse("Q42").unwrap()].label, "Douglas Adams");
    }

    #[test]
    fn aggregation_is_order_independent() {
        let rows = vec![
            row("Q1", "P710", Some("Q5"), "a"),
            row("Q2", "P1441", Some("Q5"), "b"),
            row("Q1", "P138", Some("Q6"), "a"),
        ];
        let mut reversed = rows.clone();
        reversed.reverse();
        let forward = aggregate(&rows);
        let backward = aggregate(&reversed);
        assert_eq!(forward.len(), backward.len());
        for (qid, c) in &forward {
            let other = &backward[qid];
            assert_eq!(c.backlink_hits, other.backlink_hits);
            assert_eq!(c.properties, other.properties);
            assert_eq!(c.types, other.types);
        }
    }

    fn candidate(qid: &str, hits: u64, props: &[&str]) -> Candidate {
        Candidate {
            qid: Qid::parse(qid).unwrap(),
            label: String::new(),
            properties: props.iter().map(|p| Pid::parse(p).unwrap()).collect(),
            types: BTreeSet::new(),
            type_labels: BTreeMap::new(),
            backlink_hits: hits,
        }
    }

    #[test]
    fn budget_ranks_by_hits_then_properties_then_qid() {
        let a = candidate("Q3", 2, &["P710"]);
        let b = candidate("Q1", 5, &["P710"]);
        let c = candidate("Q2", 2, &["P710", "P1441"]);

        let (kept, overflow) = apply_budget(vec![a, b, c], 2);
        let kept_qids: Vec<&str> = kept.iter().map(|c| c.qid.as_str()).collect();
        // Q1 has the most hits; Q2 ties Q3 on hits but has more properties.
        assert_eq!(kept_qids, vec!["Q1", "Q2"]);
        assert_eq!(overflow.len(), 1);
        assert_eq!(overflow[0].qid.as_str(), "Q3");
    }

    #[test]
    fn budget_with_room_keeps_everything() {
        let (kept, overflow) = apply_budget(Vec::new(), 10);
        assert!(kept.is_empty());
        assert!(overflow.is_empty());
    }
}
