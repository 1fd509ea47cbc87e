use chrono::{Datelike, Local, NaiveDate};
use roxmltree::{Document, Node};
use std::collections::HashMap;

use crate::types::{ConsolidationKind, Context, Dimension, FiscalRole, Period, PeriodKind};

/// Date-window policy for classifying undated or unmarked contexts by how far
/// their period lies from "today". The bands are approximate by design and
/// will misjudge filings processed long after publication; id markers always
/// take precedence, and the whole policy is replaceable via ExtractOptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiscalWindow {
    pub today: NaiveDate,
}

impl FiscalWindow {
    pub const CURRENT_YEARS_BACK: i32 = 2;
    pub const PREVIOUS_YEARS_BACK: i32 = 4;

    pub fn new(today: NaiveDate) -> Self {
        FiscalWindow { today }
    }

    pub fn classify(&self, date: NaiveDate) -> FiscalRole {
        let back = self.today.year() - date.year();
        if back <= Self::CURRENT_YEARS_BACK {
            FiscalRole::Current
        } else if back <= Self::PREVIOUS_YEARS_BACK {
            FiscalRole::Previous
        } else {
            FiscalRole::Unknown
        }
    }
}

impl Default for FiscalWindow {
    fn default() -> Self {
        FiscalWindow {
            today: Local::now().date_naive(),
        }
    }
}

/// Ordered id-substring rules for fiscal role. First hit wins; covers the
/// EDINET context-id convention (CurrentYearInstant, Prior1YearDuration, ...)
/// plus spelled-out Japanese markers seen in hand-built filings.
const FISCAL_ID_RULES: &[(&str, FiscalRole)] = &[
    ("CurrentYear", FiscalRole::Current),
    ("CurrentQuarter", FiscalRole::Current),
    ("CurrentYTD", FiscalRole::Current),
    ("Current", FiscalRole::Current),
    ("当期", FiscalRole::Current),
    ("当年", FiscalRole::Current),
    ("Prior1Year", FiscalRole::Previous),
    ("PriorYear", FiscalRole::Previous),
    ("PriorQuarter", FiscalRole::Previous),
    ("Prior", FiscalRole::Previous),
    ("Previous", FiscalRole::Previous),
    ("前期", FiscalRole::Previous),
    ("前年", FiscalRole::Previous),
];

fn fiscal_role_from_id(id: &str) -> Option<FiscalRole> {
    FISCAL_ID_RULES
        .iter()
        .find(|(marker, _)| id.contains(marker))
        .map(|(_, role)| *role)
}

/// "NonConsolidated" must be probed before "Consolidated" since the former
/// contains the latter.
fn consolidation_from_text(text: &str) -> Option<ConsolidationKind> {
    if text.contains("NonConsolidated") || text.contains("個別") || text.contains("単体") {
        Some(ConsolidationKind::NonConsolidated)
    } else if text.contains("Consolidated") || text.contains("連結") {
        Some(ConsolidationKind::Consolidated)
    } else {
        None
    }
}

/// All contexts of one document, keyed by id. Frozen after parse apart from
/// synthesis of bare references.
#[derive(Debug, Clone, Default)]
pub struct ContextRegistry {
    map: HashMap<String, Context>,
}

impl ContextRegistry {
    pub fn parse(doc: &Document, window: &FiscalWindow) -> Self {
        let mut map = HashMap::new();

        for node in doc
            .root_element()
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "context")
        {
            let Some(id) = node.attribute("id") else {
                continue;
            };
            let context = parse_context(id, node, window);
            log::debug!(
                "context {}: role={} period={:?}",
                id,
                context.fiscal_role,
                context.period.kind
            );
            map.entry(id.to_string()).or_insert(context);
        }

        ContextRegistry { map }
    }

    pub fn get(&self, id: &str) -> Option<&Context> {
        self.map.get(id)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Registers a minimal synthesized record for every referenced id that
    /// has no explicit context element. Dates stay null; classification comes
    /// from the id text alone.
    pub fn ensure_referenced<'a>(&mut self, ids: impl Iterator<Item = &'a str>) -> usize {
        let mut added = 0;
        for id in ids {
            if !self.map.contains_key(id) {
                self.map.insert(id.to_string(), synthesize_context(id));
                added += 1;
            }
        }
        added
    }

    pub fn into_map(self) -> HashMap<String, Context> {
        self.map
    }
}

fn parse_context(id: &str, node: Node, window: &FiscalWindow) -> Context {
    let period = parse_period(node);
    let (entity_identifier, entity_scheme) = parse_entity(node);
    let dimensions = parse_dimensions(node);

    let consolidation = dimensions
        .iter()
        .find_map(|d| {
            consolidation_from_text(&d.member).or_else(|| consolidation_from_text(&d.axis))
        })
        .or_else(|| consolidation_from_text(id))
        .unwrap_or(ConsolidationKind::Unknown);

    let fiscal_role = fiscal_role_from_id(id)
        .or_else(|| period.reference_date().map(|d| window.classify(d)))
        .unwrap_or(FiscalRole::Unknown);

    Context {
        id: id.to_string(),
        period,
        entity_identifier,
        entity_scheme,
        dimensions,
        fiscal_role,
        consolidation,
        synthesized: false,
    }
}

/// Minimal record for a bare reference: id heuristics only, null dates.
pub fn synthesize_context(id: &str) -> Context {
    Context {
        id: id.to_string(),
        period: Period::unknown(),
        entity_identifier: None,
        entity_scheme: None,
        dimensions: Vec::new(),
        fiscal_role: fiscal_role_from_id(id).unwrap_or(FiscalRole::Unknown),
        consolidation: consolidation_from_text(id).unwrap_or(ConsolidationKind::Unknown),
        synthesized: true,
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

fn parse_period(context: Node) -> Period {
    let Some(period) = context
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "period")
    else {
        return Period::unknown();
    };

    let mut instant = None;
    let mut start_date = None;
    let mut end_date = None;

    for child in period.children().filter(|n| n.is_element()) {
        let text = child.text().unwrap_or("");
        match child.tag_name().name() {
            "instant" => instant = parse_date(text),
            "startDate" => start_date = parse_date(text),
            "endDate" => end_date = parse_date(text),
            _ => {}
        }
    }

    let kind = if instant.is_some() {
        PeriodKind::Instant
    } else if start_date.is_some() || end_date.is_some() {
        PeriodKind::Duration
    } else {
        PeriodKind::Unknown
    };

    Period {
        kind,
        instant,
        start_date,
        end_date,
    }
}

fn parse_entity(context: Node) -> (Option<String>, Option<String>) {
    let Some(identifier) = context
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "identifier")
    else {
        return (None, None);
    };
    (
        identifier.text().map(|t| t.trim().to_string()),
        identifier.attribute("scheme").map(String::from),
    )
}

fn parse_dimensions(context: Node) -> Vec<Dimension> {
    let mut dimensions = Vec::new();

    for member in context.descendants().filter(|n| {
        n.is_element()
            && matches!(n.tag_name().name(), "explicitMember" | "typedMember")
    }) {
        let Some(axis) = member.attribute("dimension") else {
            continue;
        };
        let typed = member.tag_name().name() == "typedMember";
        let value = if typed {
            // Typed members carry an arbitrary child element; its text is the
            // member value.
            member
                .children()
                .find(|n| n.is_element())
                .and_then(|n| n.text())
                .unwrap_or("")
                .trim()
                .to_string()
        } else {
            member.text().unwrap_or("").trim().to_string()
        };
        dimensions.push(Dimension {
            axis: axis.to_string(),
            member: value,
            typed,
        });
    }

    dimensions
}
