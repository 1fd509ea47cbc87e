use crate::context::ContextRegistry;
use crate::types::{Cell, Fact, FiscalRole, PeriodColumns};

const PREVIOUS_MARKERS: &[&str] = &[
    "前期",
    "前年",
    "前連結会計年度",
    "前事業年度",
    "前中間",
    "prior",
    "previous",
];

const CURRENT_MARKERS: &[&str] = &[
    "当期",
    "当年",
    "当連結会計年度",
    "当事業年度",
    "当中間",
    "current",
];

const CHANGE_MARKERS: &[&str] = &["増減", "比較", "前期比", "change"];

const RATE_MARKERS: &[&str] = &["率", "%", "％", "rate"];

fn matches_any(text: &str, markers: &[&str]) -> bool {
    let lower = text.to_lowercase();
    markers.iter().any(|m| lower.contains(m))
}

/// Identifies which header columns carry previous-period, current-period,
/// change, and change-rate values. Column 0 is always the label column.
///
/// Marker text wins; a bound fact's context fiscal role is consulted next;
/// with no markers at all and at least three columns, the conventional fixed
/// layout is assumed and flagged as a positional default.
pub fn detect_period_columns(
    header: &[Cell],
    facts: &[Fact],
    contexts: &ContextRegistry,
) -> PeriodColumns {
    let mut columns = PeriodColumns::default();

    for (index, cell) in header.iter().enumerate().skip(1) {
        let text = &cell.text;

        // Cells naming 増減 are probed first so a combined header like
        // 前期比増減率 lands in the rate column, not the previous column.
        if matches_any(text, CHANGE_MARKERS) {
            if matches_any(text, RATE_MARKERS) {
                columns.change_rate.get_or_insert(index);
            } else {
                columns.change.get_or_insert(index);
            }
            continue;
        }
        if matches_any(text, PREVIOUS_MARKERS) {
            columns.previous.get_or_insert(index);
            continue;
        }
        if matches_any(text, CURRENT_MARKERS) {
            columns.current.get_or_insert(index);
            continue;
        }

        // A header cell bound to a fact can reveal its period through the
        // referenced context.
        if let Some(role) = cell
            .fact_index
            .and_then(|i| facts.get(i))
            .and_then(|f| f.context_ref.as_deref())
            .and_then(|id| contexts.get(id))
            .map(|c| c.fiscal_role)
        {
            match role {
                FiscalRole::Previous => {
                    columns.previous.get_or_insert(index);
                }
                FiscalRole::Current => {
                    columns.current.get_or_insert(index);
                }
                FiscalRole::Unknown => {}
            }
        }
    }

    let any_marker = columns.previous.is_some()
        || columns.current.is_some()
        || columns.change.is_some()
        || columns.change_rate.is_some();

    if !any_marker {
        let width = header.len();
        if width >= 3 {
            // Documented positional default: label, previous, current,
            // change, change-rate in that order.
            columns.previous = Some(1);
            columns.current = Some(2);
            if width >= 4 {
                columns.change = Some(3);
            }
            if width >= 5 {
                columns.change_rate = Some(4);
            }
            columns.positional_default = true;
        } else if width == 2 {
            // Single value column: treat it as the current period.
            columns.current = Some(1);
            columns.positional_default = true;
        }
    }

    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(texts: &[&str]) -> Vec<Cell> {
        texts
            .iter()
            .map(|t| Cell {
                text: t.to_string(),
                fact_index: None,
                colspan_owner: true,
            })
            .collect()
    }

    fn detect(texts: &[&str]) -> PeriodColumns {
        detect_period_columns(&header(texts), &[], &ContextRegistry::default())
    }

    #[test]
    fn test_explicit_labels_win_regardless_of_position() {
        let columns = detect(&["科目", "増減", "当期", "前期"]);
        assert_eq!(columns.previous, Some(3));
        assert_eq!(columns.current, Some(2));
        assert_eq!(columns.change, Some(1));
        assert!(!columns.positional_default);
    }

    #[test]
    fn test_change_rate_split_on_rate_marker() {
        let columns = detect(&["科目", "前期", "当期", "増減", "増減率"]);
        assert_eq!(columns.change, Some(3));
        assert_eq!(columns.change_rate, Some(4));
    }

    #[test]
    fn test_positional_default_without_markers() {
        let columns = detect(&["科目", "金額A", "金額B", "金額C", "金額D"]);
        assert!(columns.positional_default);
        assert_eq!(columns.previous, Some(1));
        assert_eq!(columns.current, Some(2));
        assert_eq!(columns.change, Some(3));
        assert_eq!(columns.change_rate, Some(4));
    }

    #[test]
    fn test_two_columns_default_to_current() {
        let columns = detect(&["科目", "金額"]);
        assert!(columns.positional_default);
        assert_eq!(columns.current, Some(1));
        assert_eq!(columns.previous, None);
    }

    #[test]
    fn test_english_markers() {
        let columns = detect(&["Item", "Prior year", "Current year"]);
        assert_eq!(columns.previous, Some(1));
        assert_eq!(columns.current, Some(2));
    }

    #[test]
    fn test_period_markers_beat_change_only_when_separate() {
        // 前期比増減率 carries both kinds of marker; it classifies as a rate
        // column, leaving the period columns to their own cells.
        let columns = detect(&["科目", "前期", "当期", "前期比増減率"]);
        assert_eq!(columns.previous, Some(1));
        assert_eq!(columns.current, Some(2));
        assert_eq!(columns.change_rate, Some(3));
        assert_eq!(columns.change, None);
    }
}
