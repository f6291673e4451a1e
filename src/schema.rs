//! Read-only schema artifact.
//!
//! The schema file is a JSON document maintained outside this tool. The
//! harvester consumes five things from it: the class allowlist (entity-type
//! QIDs), the relationship property allowlist, the type→category map, the
//! category→scoping-class map, and optional per-seed property-allowlist
//! overrides. Rows that fail identifier validation are skipped silently,
//! matching how the artifact is curated (it carries documentation keys like
//! `description` alongside data).

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::error::SchemaError;
use crate::ident::{Pid, Qid};

/// Scoping class a schema category maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopingClass {
    /// Categories anchored to a time period (people, events, offices).
    Temporal,
    /// Timeless categories (organizations, places, concepts).
    Conceptual,
}

impl ScopingClass {
    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "temporal" => Some(ScopingClass::Temporal),
            "conceptual" => Some(ScopingClass::Conceptual),
            _ => None,
        }
    }
}

// Wire shape of the artifact. Everything is optional: a partial schema is a
// curation state, not an error.

#[derive(Debug, Default, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    entities: EntitySection,
    #[serde(default)]
    relationships: RelationshipSection,
    #[serde(default)]
    entity_scoping: ScopingSection,
}

#[derive(Debug, Default, Deserialize)]
struct EntitySection {
    #[serde(default)]
    types: Vec<EntityTypeRow>,
}

#[derive(Debug, Default, Deserialize)]
struct EntityTypeRow {
    #[serde(default)]
    wikidata_qid: String,
    #[serde(default)]
    category: String,
}

#[derive(Debug, Default, Deserialize)]
struct RelationshipSection {
    #[serde(default)]
    types: Vec<RelationshipTypeRow>,
}

#[derive(Debug, Default, Deserialize)]
struct RelationshipTypeRow {
    #[serde(default)]
    wikidata_property: String,
}

#[derive(Debug, Default, Deserialize)]
struct ScopingSection {
    #[serde(default)]
    category_to_scoping_class: BTreeMap<String, String>,
    #[serde(default)]
    anchor_to_property_allowlist: BTreeMap<String, serde_json::Value>,
}

/// Validated, in-memory view of the schema artifact.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    /// Accepted "is-a" classes gating candidate acceptance.
    pub class_allowlist: BTreeSet<Qid>,
    /// Relationship properties the schema recognizes.
    pub property_allowlist: BTreeSet<Pid>,
    /// Entity-type QID → schema category name.
    pub type_categories: BTreeMap<Qid, String>,
    /// Category name → scoping class.
    pub category_scoping: BTreeMap<String, ScopingClass>,
    /// Per-seed property allowlist overrides (anchor QID → PIDs).
    pub seed_property_overrides: BTreeMap<Qid, Vec<Pid>>,
}

impl Schema {
    /// Load and validate the artifact from disk.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: SchemaFile =
            serde_json::from_str(&text).map_err(|e| SchemaError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: SchemaFile) -> Self {
        let mut schema = Schema::default();

        for row in file.entities.types {
            if let Ok(qid) = Qid::parse(&row.wikidata_qid) {
                let category = row.category.trim();
                if !category.is_empty() {
                    schema.type_categories.insert(qid.clone(), category.to_string());
                }
                schema.class_allowlist.insert(qid);
            }
        }

        for row in file.relationships.types {
            if let Ok(pid) = Pid::parse(&row.wikidata_property) {
                schema.property_allowlist.insert(pid);
            }
        }

        for (category, class) in file.entity_scoping.category_to_scoping_class {
            if let Some(parsed) = ScopingClass::parse(&class) {
                schema.category_scoping.insert(category, parsed);
            }
        }

        for (key, value) in file.entity_scoping.anchor_to_property_allowlist {
            // Documentation keys ("description") live next to anchor rows.
            let Ok(anchor) = Qid::parse(&key) else { continue };
            let Some(raw_pids) = value.as_array() else { continue };
            let pids: Vec<Pid> = raw_pids
                .iter()
                .filter_map(|v| v.as_str())
                .filter_map(|s| Pid::parse(s).ok())
                .collect();
            if !pids.is_empty() {
                schema.seed_property_overrides.insert(anchor, pids);
            }
        }

        schema
    }

    /// Category for a declared type, if the schema knows it.
    pub fn category_of(&self, qid: &Qid) -> Option<&str> {
        self.type_categories.get(qid).map(String::as_str)
    }

    /// Scoping class for a category name.
    pub fn scoping_class_of(&self, category: &str) -> Option<ScopingClass> {
        self.category_scoping.get(category).copied()
    }
}
