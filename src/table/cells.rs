use roxmltree::{Node, NodeId};
use std::collections::HashMap;

use crate::fact::element_text;
use crate::types::Cell;

/// A table reshaped into a rectangular cell grid: one header row plus data
/// rows, all the same width.
#[derive(Debug, Clone, Default)]
pub struct MappedTable {
    pub header: Vec<Cell>,
    pub rows: Vec<Vec<Cell>>,
    pub header_row_index: usize,
    pub bound_fact_count: usize,
}

/// Header text that identifies a header row when no th markup exists.
const HEADER_MARKERS: &[&str] = &[
    "科目",
    "勘定科目",
    "金額",
    "前期",
    "当期",
    "前年",
    "当年",
    "増減",
    "前連結会計年度",
    "当連結会計年度",
];

/// Caps runaway span attributes from malformed markup.
const MAX_SPAN: usize = 32;

/// Whether the nearest ancestor table of `node` is `table`. Rows of a nested
/// table belong to the enclosing cell's text, not to the outer grid.
pub(crate) fn owned_by(table: Node, node: Node) -> bool {
    node.ancestors()
        .skip(1)
        .find(|a| a.is_element() && a.tag_name().name().eq_ignore_ascii_case("table"))
        .map(|a| a == table)
        .unwrap_or(false)
}

/// Expands a table element into an aligned grid. Colspan owners keep their
/// text and bound fact; the remaining positions become empty placeholders.
/// Rowspan carries placeholders into following rows the same way.
pub fn map_table(table: Node, fact_nodes: &HashMap<NodeId, usize>) -> MappedTable {
    let source_rows: Vec<Node> = table
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case("tr"))
        .filter(|n| owned_by(table, *n))
        .collect();

    let mut grid: Vec<Vec<Cell>> = Vec::with_capacity(source_rows.len());
    let mut has_th: Vec<bool> = Vec::with_capacity(source_rows.len());
    // Remaining rowspan per column position, consumed by subsequent rows.
    let mut carry: Vec<usize> = Vec::new();

    for row in &source_rows {
        let mut cells_out: Vec<Cell> = Vec::new();
        let mut row_has_th = false;
        let mut col = 0usize;

        let mut source_cells = row.children().filter(|n| {
            n.is_element()
                && matches!(
                    n.tag_name().name().to_ascii_lowercase().as_str(),
                    "td" | "th"
                )
        });

        loop {
            // Positions still covered by a rowspan from above.
            while col < carry.len() && carry[col] > 0 {
                carry[col] -= 1;
                cells_out.push(Cell::empty());
                col += 1;
            }

            let Some(cell) = source_cells.next() else {
                // Trailing positions still covered from above.
                if carry[col.min(carry.len())..].iter().any(|&c| c > 0) {
                    while col < carry.len() {
                        if carry[col] > 0 {
                            carry[col] -= 1;
                        }
                        cells_out.push(Cell::empty());
                        col += 1;
                    }
                }
                break;
            };
            if cell.tag_name().name().eq_ignore_ascii_case("th") {
                row_has_th = true;
            }

            let colspan = span_attr(cell, "colspan");
            let rowspan = span_attr(cell, "rowspan");
            let fact_index = cell
                .descendants()
                .find_map(|n| fact_nodes.get(&n.id()))
                .copied();

            for offset in 0..colspan {
                if carry.len() <= col {
                    carry.resize(col + 1, 0);
                }
                if rowspan > 1 {
                    carry[col] = rowspan - 1;
                }
                if offset == 0 {
                    cells_out.push(Cell {
                        text: element_text(cell),
                        fact_index,
                        colspan_owner: true,
                    });
                } else {
                    cells_out.push(Cell::empty());
                }
                col += 1;
            }
        }

        grid.push(cells_out);
        has_th.push(row_has_th);
    }

    let header_row_index = detect_header_row(&grid, &has_th);
    let width = grid.get(header_row_index).map(Vec::len).unwrap_or(0);

    let mut header = Vec::new();
    let mut rows = Vec::new();
    for (i, mut row) in grid.into_iter().enumerate() {
        // Invariant: every row matches the header width after expansion.
        if width > 0 {
            row.truncate(width);
            row.resize(width, Cell::empty());
        }
        if i == header_row_index {
            header = row;
        } else {
            rows.push(row);
        }
    }

    let bound_fact_count = rows
        .iter()
        .flatten()
        .chain(header.iter())
        .filter(|c| c.fact_index.is_some())
        .count();

    MappedTable {
        header,
        rows,
        header_row_index,
        bound_fact_count,
    }
}

fn span_attr(cell: Node, name: &str) -> usize {
    cell.attribute(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_SPAN)
}

/// Prefers the first row using th markup, else a row whose text matches the
/// header vocabulary, else row 0.
fn detect_header_row(grid: &[Vec<Cell>], has_th: &[bool]) -> usize {
    if let Some(i) = has_th.iter().position(|&t| t) {
        return i;
    }
    grid.iter()
        .position(|row| {
            row.iter()
                .any(|c| HEADER_MARKERS.iter().any(|m| c.text.contains(m)))
        })
        .unwrap_or(0)
}
