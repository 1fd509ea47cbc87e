use anyhow::{Context as _, Result};
use roxmltree::{Document, NodeId};
use std::collections::HashMap;

use crate::context::{ContextRegistry, FiscalWindow};
use crate::fact;
use crate::hierarchy::build_hierarchy;
use crate::namespace::NamespaceTable;
use crate::table::{self, classify::ClassifiedTable, cells::MappedTable};
use crate::types::{
    Diagnostics, ExtractionResult, Fact, Fallback, PeriodColumns, StatementType, TableCandidate,
};
use crate::unit::UnitRegistry;

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// When set, the most relevant table is chosen by statement-type match
    /// and bound financial-fact count; otherwise the first candidate wins.
    pub intelligent_selection: bool,
    pub fiscal_window: FiscalWindow,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            intelligent_selection: true,
            fiscal_window: FiscalWindow::default(),
        }
    }
}

/// Parses the raw markup and runs the pipeline. The parse itself is the only
/// hard failure; everything downstream degrades into diagnostics.
pub fn extract_str(content: &str) -> Result<ExtractionResult> {
    let doc = Document::parse(content).context("failed to parse input document")?;
    Ok(extract(&doc))
}

pub fn extract(doc: &Document) -> ExtractionResult {
    extract_with_options(doc, &ExtractOptions::default())
}

/// One document in, one result out. Stateless: every run builds fresh
/// registries; nothing is shared across invocations.
pub fn extract_with_options(doc: &Document, options: &ExtractOptions) -> ExtractionResult {
    let mut diagnostics = Diagnostics::default();

    let ns = NamespaceTable::from_document(doc);
    let mut contexts = ContextRegistry::parse(doc, &options.fiscal_window);
    let mut units = UnitRegistry::parse(doc);

    let (scanned, scan_stats) = fact::scan(doc, &ns);
    let facts: Vec<_> = scanned.iter().map(|s| s.fact.clone()).collect();
    diagnostics.fact_count = facts.len();
    diagnostics.inherited_context_count = scan_stats.inherited_context_count;
    if scan_stats.inherited_context_count > 0 {
        diagnostics.warn(format!(
            "{} fact(s) bound their context by inheritance",
            scan_stats.inherited_context_count
        ));
    }

    // Bare references get minimal synthesized records; the facts themselves
    // are never dropped over a dangling id.
    let synthesized_contexts =
        contexts.ensure_referenced(facts.iter().filter_map(|f| f.context_ref.as_deref()));
    if synthesized_contexts > 0 {
        diagnostics.warn(format!(
            "{} context reference(s) had no explicit element; synthesized from id",
            synthesized_contexts
        ));
    }
    units.ensure_referenced(facts.iter().filter_map(|f| f.unit_ref.as_deref()));

    diagnostics.context_count = contexts.len();
    diagnostics.unit_count = units.len();

    let classified = table::classify_tables(doc, &ns, &scanned);
    diagnostics.table_count = classified.len();
    diagnostics.candidate_count = classified.iter().filter(|t| t.retained).count();

    let fact_nodes: HashMap<NodeId, usize> = scanned
        .iter()
        .enumerate()
        .map(|(i, s)| (s.node_id, i))
        .collect();

    let any_table = !classified.is_empty();
    let any_retained = classified.iter().any(|t| t.retained);

    let mut tables: Vec<TableCandidate> = Vec::new();
    for c in &classified {
        // Below-threshold tables are mapped only when nothing qualified, so
        // the flat fallback still has rows to show.
        if c.retained || !any_retained {
            let mapped = table::map_table(c.node, &fact_nodes);
            let periods = table::detect_period_columns(&mapped.header, &facts, &contexts);
            if periods.positional_default {
                diagnostics.warn(format!(
                    "table {}: period columns assumed positionally",
                    c.index
                ));
            }
            tables.push(candidate_from(c, mapped, periods));
        }
    }

    let mut statement = Vec::new();
    let mut statement_type = StatementType::Unknown;
    let mut selected_table = None;

    if any_retained {
        let selection = select_table(&tables, &ns, &facts, options.intelligent_selection);
        if let Some(idx) = selection {
            let selected = &tables[idx];
            statement_type = selected.statement_type;
            statement = build_hierarchy(
                &selected.rows,
                selected.periods,
                selected.statement_type,
                &facts,
                &units,
            );
            selected_table = Some(idx);
            if selected.statement_type == StatementType::Unknown {
                diagnostics.warn(format!(
                    "selected table {} has no recognizable statement type",
                    selected.index
                ));
            }
        }
    } else if any_table {
        // Classification failed but generic tables exist: flat output, no
        // hierarchy, first table selected.
        diagnostics.warn("no table met the financial score threshold; flat table fallback");
        diagnostics.fallback = Fallback::FlatTable;
        if !tables.is_empty() {
            selected_table = Some(0);
            statement = build_hierarchy(
                &tables[0].rows,
                tables[0].periods,
                StatementType::Unknown,
                &facts,
                &units,
            );
        }
    } else if !facts.is_empty() {
        diagnostics.warn("no tables found; synthesizing statement from facts");
        diagnostics.fallback = Fallback::VirtualTable;
        let virtual_table = table::build_virtual_table(0, &facts, &contexts);
        statement_type = virtual_table.statement_type;
        statement = build_hierarchy(
            &virtual_table.rows,
            virtual_table.periods,
            virtual_table.statement_type,
            &facts,
            &units,
        );
        tables.push(virtual_table);
        selected_table = Some(0);
    } else {
        diagnostics.warn("no tables or facts found in document");
        diagnostics.fallback = Fallback::Empty;
    }

    log::debug!(
        "extraction done: {} facts, {} tables ({} candidates), fallback={:?}",
        diagnostics.fact_count,
        diagnostics.table_count,
        diagnostics.candidate_count,
        diagnostics.fallback
    );

    ExtractionResult {
        tables,
        selected_table,
        statement,
        statement_type,
        facts,
        contexts: contexts.into_map(),
        units: units.into_map(),
        diagnostics,
    }
}

fn candidate_from(
    classified: &ClassifiedTable,
    mapped: MappedTable,
    periods: PeriodColumns,
) -> TableCandidate {
    TableCandidate {
        index: classified.index,
        title: classified.title.clone(),
        score: classified.score,
        statement_type: classified.statement_type,
        header: mapped.header,
        rows: mapped.rows,
        periods,
        synthetic: false,
        bound_fact_count: mapped.bound_fact_count,
    }
}

/// Picks the single most relevant table. Intelligent selection weighs a
/// recognized statement type at 100 plus one per bound financial-namespace
/// fact; ties and disabled selection fall back to document order.
fn select_table(
    tables: &[TableCandidate],
    ns: &NamespaceTable,
    facts: &[Fact],
    intelligent: bool,
) -> Option<usize> {
    if tables.is_empty() {
        return None;
    }
    if !intelligent {
        return Some(0);
    }

    let mut best = 0usize;
    let mut best_weight = i64::MIN;
    for (i, t) in tables.iter().enumerate() {
        let type_weight = if t.statement_type != StatementType::Unknown {
            100
        } else {
            0
        };
        let financial_facts = t
            .rows
            .iter()
            .flatten()
            .chain(t.header.iter())
            .filter_map(|c| c.fact_index)
            .filter(|&fact_idx| {
                facts
                    .get(fact_idx)
                    .map(|f| ns.is_financial_tag(&f.name))
                    .unwrap_or(false)
            })
            .count() as i64;
        let weight = type_weight + financial_facts;
        if weight > best_weight {
            best_weight = weight;
            best = i;
        }
    }
    Some(best)
}
