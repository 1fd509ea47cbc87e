pub mod cells;
pub mod classify;
pub mod period;
pub mod synthetic;

pub use cells::map_table;
pub use classify::{classify_tables, ClassifiedTable, FINANCIAL_TABLE_THRESHOLD};
pub use period::detect_period_columns;
pub use synthetic::build_virtual_table;
