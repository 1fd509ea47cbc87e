pub mod context;
pub mod extract;
pub mod fact;
pub mod hierarchy;
pub mod namespace;
pub mod normalize;
pub mod table;
pub mod types;
pub mod unit;

// Re-exports
pub use context::{ContextRegistry, FiscalWindow};
pub use extract::{extract, extract_str, extract_with_options, ExtractOptions};
pub use namespace::NamespaceTable;
pub use types::{
    ConsolidationKind, Context, Diagnostics, ExtractionResult, Fact, Fallback, FiscalRole,
    HierarchicalItem, Period, PeriodKind, StatementType, TableCandidate, Unit, UnitKind,
};
pub use unit::UnitRegistry;
