use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use strum::EnumIter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    Instant,
    Duration,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub kind: PeriodKind,
    pub instant: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Period {
    pub fn unknown() -> Self {
        Period {
            kind: PeriodKind::Unknown,
            instant: None,
            start_date: None,
            end_date: None,
        }
    }

    /// The date used for fiscal-role classification: the instant for
    /// balance-sheet contexts, the period end for flow contexts.
    pub fn reference_date(&self) -> Option<NaiveDate> {
        self.instant.or(self.end_date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum FiscalRole {
    Current,
    Previous,
    Unknown,
}

impl fmt::Display for FiscalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FiscalRole::Current => write!(f, "current"),
            FiscalRole::Previous => write!(f, "previous"),
            FiscalRole::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationKind {
    Consolidated,
    NonConsolidated,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub axis: String,
    pub member: String,
    pub typed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub id: String,
    pub period: Period,
    pub entity_identifier: Option<String>,
    pub entity_scheme: Option<String>,
    pub dimensions: Vec<Dimension>,
    pub fiscal_role: FiscalRole,
    pub consolidation: ConsolidationKind,
    /// True when no explicit context element existed and the record was
    /// synthesized from the id alone.
    pub synthesized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Simple {
        measure: String,
    },
    Fraction {
        numerator: String,
        denominator: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub kind: UnitKind,
    pub label: String,
    pub synthesized: bool,
}

/// A single tagged data point as found in the document. Reference fields may
/// point at ids with no registry entry; that is tolerated downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Qualified tag name, "prefix:LocalName".
    pub name: String,
    pub context_ref: Option<String>,
    pub unit_ref: Option<String>,
    pub decimals: Option<i32>,
    pub scale: Option<i32>,
    pub format: Option<String>,
    /// True when an inline `sign="-"` attribute negates the displayed value.
    pub sign_negated: bool,
    pub value: String,
    /// True when the context reference was inherited from an ancestor or
    /// sibling element rather than found on the fact itself.
    pub inherited_context: bool,
}

impl Fact {
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(p, _)| p)
    }

    pub fn local_name(&self) -> &str {
        self.name.split_once(':').map(|(_, l)| l).unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum StatementType {
    BalanceSheet,
    IncomeStatement,
    CashFlow,
    ShareholderEquity,
    Unknown,
}

impl StatementType {
    /// Canonical Japanese statement caption, used when no verbatim heading
    /// title is available.
    pub fn canonical_label(&self) -> Option<&'static str> {
        match self {
            StatementType::BalanceSheet => Some("貸借対照表"),
            StatementType::IncomeStatement => Some("損益計算書"),
            StatementType::CashFlow => Some("キャッシュ・フロー計算書"),
            StatementType::ShareholderEquity => Some("株主資本等変動計算書"),
            StatementType::Unknown => None,
        }
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementType::BalanceSheet => write!(f, "balance_sheet"),
            StatementType::IncomeStatement => write!(f, "income_statement"),
            StatementType::CashFlow => write!(f, "cash_flow"),
            StatementType::ShareholderEquity => write!(f, "shareholder_equity"),
            StatementType::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub text: String,
    /// Index into `ExtractionResult::facts` for the fact bound to this cell.
    pub fact_index: Option<usize>,
    /// False for placeholder cells created by colspan/rowspan expansion.
    pub colspan_owner: bool,
}

impl Cell {
    pub fn empty() -> Self {
        Cell {
            text: String::new(),
            fact_index: None,
            colspan_owner: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodColumns {
    pub previous: Option<usize>,
    pub current: Option<usize>,
    pub change: Option<usize>,
    pub change_rate: Option<usize>,
    /// True when no header markers were found and the fixed positional layout
    /// was assumed.
    pub positional_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCandidate {
    /// Document-order index among all scanned tables.
    pub index: usize,
    pub title: Option<String>,
    pub score: i32,
    pub statement_type: StatementType,
    pub header: Vec<Cell>,
    pub rows: Vec<Vec<Cell>>,
    pub periods: PeriodColumns,
    /// True for tables synthesized from facts rather than found in markup.
    pub synthetic: bool,
    /// Number of cells carrying a bound fact.
    pub bound_fact_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalItem {
    pub item_name: String,
    pub xbrl_tag: Option<String>,
    pub level: u32,
    pub previous_period: Option<f64>,
    pub current_period: Option<f64>,
    pub change: Option<f64>,
    pub change_rate: Option<f64>,
    pub unit_label: Option<String>,
    pub context_ref: Option<String>,
    pub unit_ref: Option<String>,
    pub is_total: bool,
    pub children: Vec<HierarchicalItem>,
}

impl HierarchicalItem {
    pub fn new(item_name: impl Into<String>) -> Self {
        HierarchicalItem {
            item_name: item_name.into(),
            xbrl_tag: None,
            level: 0,
            previous_period: None,
            current_period: None,
            change: None,
            change_rate: None,
            unit_label: None,
            context_ref: None,
            unit_ref: None,
            is_total: false,
            children: Vec::new(),
        }
    }

    /// Derives change and change-rate from the two period values when both
    /// are present.
    pub fn derive_change(&mut self) {
        if let (Some(prev), Some(cur)) = (self.previous_period, self.current_period) {
            self.change = Some(cur - prev);
            if prev != 0.0 {
                self.change_rate = Some((cur - prev) / prev.abs() * 100.0);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    None,
    FlatTable,
    VirtualTable,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub warnings: Vec<String>,
    pub fact_count: usize,
    pub context_count: usize,
    pub unit_count: usize,
    pub table_count: usize,
    pub candidate_count: usize,
    pub inherited_context_count: usize,
    pub fallback: Fallback,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics {
            warnings: Vec::new(),
            fact_count: 0,
            context_count: 0,
            unit_count: 0,
            table_count: 0,
            candidate_count: 0,
            inherited_context_count: 0,
            fallback: Fallback::None,
        }
    }
}

impl Diagnostics {
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Top-level result of one extraction run. Immutable once produced; every
/// value in `statement` traces back to `facts`/`contexts`/`units` through its
/// reference fields when fact-derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub tables: Vec<TableCandidate>,
    pub selected_table: Option<usize>,
    pub statement: Vec<HierarchicalItem>,
    pub statement_type: StatementType,
    pub facts: Vec<Fact>,
    pub contexts: HashMap<String, Context>,
    pub units: HashMap<String, Unit>,
    pub diagnostics: Diagnostics,
}
