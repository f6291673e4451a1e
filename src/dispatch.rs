//! Total statement classification.
//!
//! Every statement on an accepted entity is mapped to exactly one
//! [`StatementRoute`] by inspecting the (declared datatype, value-shape tag)
//! pair. The supported contract is a finite static table; anything outside
//! it is quarantined, never dropped, so the gate evaluator sees the full
//! picture. Time-shaped values additionally split on precision against the
//! configured minimum.

use serde::Serialize;

use crate::claims::{Rank, Statement};

/// Closed route enumeration. Every dispatched statement carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementRoute {
    /// Entity-reference pair: a potential edge to another node.
    StructuralEdgeCandidate,
    /// External-authority identifier, scoping evidence.
    FederationIdentifier,
    /// Time value at or above the minimum precision.
    TemporalAnchor,
    /// Time value below the minimum precision (or missing precision).
    TemporalUncertain,
    /// Plain/monolingual text or URL.
    LiteralProperty,
    /// Quantity value.
    MeasuredAttribute,
    /// Globe coordinate.
    GeographicAttribute,
    /// Commons media reference.
    MediaReference,
    /// Statement with no value payload at all.
    QuarantinedMissingValue,
    /// Pair outside the supported contract.
    QuarantinedUnsupported,
}

impl StatementRoute {
    pub fn as_str(self) -> &'static str {
        match self {
            StatementRoute::StructuralEdgeCandidate => "structural_edge_candidate",
            StatementRoute::FederationIdentifier => "federation_identifier",
            StatementRoute::TemporalAnchor => "temporal_anchor",
            StatementRoute::TemporalUncertain => "temporal_uncertain",
            StatementRoute::LiteralProperty => "literal_property",
            StatementRoute::MeasuredAttribute => "measured_attribute",
            StatementRoute::GeographicAttribute => "geographic_attribute",
            StatementRoute::MediaReference => "media_reference",
            StatementRoute::QuarantinedMissingValue => "quarantined_missing_value",
            StatementRoute::QuarantinedUnsupported => "quarantined_unsupported",
        }
    }

    /// Quarantine routes carry no usable value.
    pub fn is_quarantined(self) -> bool {
        matches!(
            self,
            StatementRoute::QuarantinedMissingValue | StatementRoute::QuarantinedUnsupported
        )
    }

    /// Routes counted toward the literal-heavy ratio: everything that is
    /// neither a structural edge nor strong anchor/identifier evidence.
    pub fn is_literal_heavy(self) -> bool {
        matches!(
            self,
            StatementRoute::LiteralProperty
                | StatementRoute::MeasuredAttribute
                | StatementRoute::GeographicAttribute
                | StatementRoute::MediaReference
                | StatementRoute::TemporalUncertain
        )
    }
}

/// Routing kind for a supported (datatype, value-shape) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairKind {
    Edge,
    Federation,
    Temporal,
    Literal,
    Measured,
    Geographic,
    Media,
}

/// The supported pair contract. Data-driven so the routing is exhaustively
/// testable by enumeration; pairs absent from this table are quarantined by
/// the single fallback below.
const PAIR_TABLE: &[(&str, &str, PairKind)] = &[
    ("wikibase-item", "wikibase-entityid", PairKind::Edge),
    ("wikibase-property", "wikibase-entityid", PairKind::Edge),
    ("wikibase-lexeme", "wikibase-entityid", PairKind::Edge),
    ("wikibase-form", "wikibase-entityid", PairKind::Edge),
    ("wikibase-sense", "wikibase-entityid", PairKind::Edge),
    ("external-id", "string", PairKind::Federation),
    ("time", "time", PairKind::Temporal),
    ("string", "string", PairKind::Literal),
    ("monolingualtext", "monolingualtext", PairKind::Literal),
    ("url", "string", PairKind::Literal),
    ("quantity", "quantity", PairKind::Measured),
    ("globe-coordinate", "globecoordinate", PairKind::Geographic),
    // Older dumps spell the datatype without the hyphen.
    ("globecoordinate", "globecoordinate", PairKind::Geographic),
    ("commonsMedia", "string", PairKind::Media),
];

fn pair_kind(datatype: &str, value_type: &str) -> Option<PairKind> {
    PAIR_TABLE
        .iter()
        .find(|(d, v, _)| *d == datatype && *v == value_type)
        .map(|(_, _, kind)| *kind)
}

/// One statement's classification plus the metadata the profiler needs.
#[derive(Debug, Clone)]
pub struct RoutedStatement {
    pub route: StatementRoute,
    pub datatype: String,
    pub value_type: String,
    pub time_precision: Option<u8>,
    pub has_qualifiers: bool,
    pub has_references: bool,
    pub rank: Rank,
}

impl RoutedStatement {
    /// `datatype|value_type` key used in the report's pair histograms.
    pub fn pair_key(&self) -> String {
        format!("{}|{}", self.datatype, self.value_type)
    }
}

/// Classify one statement. Total over the contract: every input yields
/// exactly one route.
pub fn dispatch_statement(statement: &Statement, min_temporal_precision: u8) -> RoutedStatement {
    let datatype = statement.mainsnak.datatype.clone();
    let (value_type, time_precision) = match &statement.mainsnak.datavalue {
        Some(dv) => (dv.value_type.clone(), dv.time_precision()),
        None => (String::new(), None),
    };

    let route = if value_type.is_empty() {
        StatementRoute::QuarantinedMissingValue
    } else {
        match pair_kind(&datatype, &value_type) {
            Some(PairKind::Edge) => StatementRoute::StructuralEdgeCandidate,
            Some(PairKind::Federation) => StatementRoute::FederationIdentifier,
            Some(PairKind::Temporal) => match time_precision {
                Some(p) if p >= min_temporal_precision => StatementRoute::TemporalAnchor,
                _ => StatementRoute::TemporalUncertain,
            },
            Some(PairKind::Literal) => StatementRoute::LiteralProperty,
            Some(PairKind::Measured) => StatementRoute::MeasuredAttribute,
            Some(PairKind::Geographic) => StatementRoute::GeographicAttribute,
            Some(PairKind::Media) => StatementRoute::MediaReference,
            // The one fallback: inside no contract entry, quarantined.
            None => StatementRoute::QuarantinedUnsupported,
        }
    };

    RoutedStatement {
        route,
        datatype,
        value_type,
        time_precision,
        has_qualifiers: statement.has_qualifiers(),
        has_references: statement.has_references(),
        rank: statement.rank(),
    }
}
