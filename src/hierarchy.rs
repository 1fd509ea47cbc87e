use once_cell::sync::Lazy;

use crate::normalize;
use crate::types::{Cell, Fact, HierarchicalItem, PeriodColumns, StatementType};
use crate::unit::UnitRegistry;

/// One canonical top-level line item and the child captions expected to sit
/// under it. Order matters: the list mirrors statement presentation order.
struct CanonicalParent {
    name: &'static str,
    children: &'static [&'static str],
}

static BALANCE_SHEET: Lazy<Vec<CanonicalParent>> = Lazy::new(|| {
    vec![
        CanonicalParent {
            name: "流動資産",
            children: &[
                "現金及び預金",
                "受取手形",
                "売掛金",
                "受取手形及び売掛金",
                "電子記録債権",
                "有価証券",
                "商品及び製品",
                "仕掛品",
                "原材料及び貯蔵品",
                "棚卸資産",
                "前渡金",
                "前払費用",
                "未収入金",
                "貸倒引当金",
            ],
        },
        CanonicalParent {
            name: "固定資産",
            children: &[
                "有形固定資産",
                "建物及び構築物",
                "機械装置及び運搬具",
                "工具、器具及び備品",
                "土地",
                "建設仮勘定",
                "無形固定資産",
                "のれん",
                "ソフトウエア",
                "投資その他の資産",
                "投資有価証券",
                "関係会社株式",
                "長期貸付金",
                "繰延税金資産",
                "退職給付に係る資産",
            ],
        },
        CanonicalParent {
            name: "流動負債",
            children: &[
                "支払手形及び買掛金",
                "買掛金",
                "電子記録債務",
                "短期借入金",
                "1年内返済予定の長期借入金",
                "未払金",
                "未払費用",
                "未払法人税等",
                "契約負債",
                "前受金",
                "賞与引当金",
            ],
        },
        CanonicalParent {
            name: "固定負債",
            children: &[
                "社債",
                "長期借入金",
                "リース債務",
                "繰延税金負債",
                "退職給付に係る負債",
                "役員退職慰労引当金",
                "資産除去債務",
            ],
        },
        CanonicalParent {
            name: "株主資本",
            children: &["資本金", "資本剰余金", "利益剰余金", "自己株式"],
        },
        CanonicalParent {
            name: "その他の包括利益累計額",
            children: &[
                "その他有価証券評価差額金",
                "繰延ヘッジ損益",
                "為替換算調整勘定",
                "退職給付に係る調整累計額",
            ],
        },
    ]
});

static INCOME_STATEMENT: Lazy<Vec<CanonicalParent>> = Lazy::new(|| {
    vec![
        CanonicalParent {
            name: "売上高",
            children: &[],
        },
        CanonicalParent {
            name: "売上原価",
            children: &[],
        },
        CanonicalParent {
            name: "販売費及び一般管理費",
            children: &[],
        },
        CanonicalParent {
            name: "営業外収益",
            children: &[
                "受取利息",
                "受取配当金",
                "持分法による投資利益",
                "為替差益",
                "雑収入",
            ],
        },
        CanonicalParent {
            name: "営業外費用",
            children: &["支払利息", "為替差損", "雑損失"],
        },
        CanonicalParent {
            name: "特別利益",
            children: &["固定資産売却益", "投資有価証券売却益", "負ののれん発生益"],
        },
        CanonicalParent {
            name: "特別損失",
            children: &["固定資産除却損", "減損損失", "投資有価証券評価損"],
        },
        CanonicalParent {
            name: "法人税等",
            children: &["法人税、住民税及び事業税", "法人税等調整額"],
        },
    ]
});

static CASH_FLOW: Lazy<Vec<CanonicalParent>> = Lazy::new(|| {
    vec![
        CanonicalParent {
            name: "営業活動によるキャッシュ・フロー",
            children: &[
                "税引前当期純利益",
                "減価償却費",
                "減損損失",
                "貸倒引当金の増減額",
                "受取利息及び受取配当金",
                "支払利息",
                "売上債権の増減額",
                "棚卸資産の増減額",
                "仕入債務の増減額",
                "法人税等の支払額",
            ],
        },
        CanonicalParent {
            name: "投資活動によるキャッシュ・フロー",
            children: &[
                "有形固定資産の取得による支出",
                "有形固定資産の売却による収入",
                "投資有価証券の取得による支出",
                "投資有価証券の売却による収入",
                "貸付けによる支出",
                "貸付金の回収による収入",
            ],
        },
        CanonicalParent {
            name: "財務活動によるキャッシュ・フロー",
            children: &[
                "短期借入金の純増減額",
                "長期借入れによる収入",
                "長期借入金の返済による支出",
                "社債の発行による収入",
                "自己株式の取得による支出",
                "配当金の支払額",
            ],
        },
    ]
});

static SHAREHOLDER_EQUITY: Lazy<Vec<CanonicalParent>> = Lazy::new(|| {
    vec![
        CanonicalParent {
            name: "株主資本",
            children: &["資本金", "資本剰余金", "利益剰余金", "自己株式"],
        },
        CanonicalParent {
            name: "その他の包括利益累計額",
            children: &[
                "その他有価証券評価差額金",
                "繰延ヘッジ損益",
                "為替換算調整勘定",
                "退職給付に係る調整累計額",
            ],
        },
        CanonicalParent {
            name: "当期変動額",
            children: &[
                "剰余金の配当",
                "当期純利益",
                "自己株式の取得",
                "株主資本以外の項目の当期変動額",
            ],
        },
    ]
});

fn taxonomy_for(statement_type: StatementType) -> &'static [CanonicalParent] {
    match statement_type {
        StatementType::BalanceSheet => &BALANCE_SHEET,
        StatementType::IncomeStatement => &INCOME_STATEMENT,
        StatementType::CashFlow => &CASH_FLOW,
        StatementType::ShareholderEquity => &SHAREHOLDER_EQUITY,
        StatementType::Unknown => &[],
    }
}

fn is_total_label(label: &str) -> bool {
    label.contains("合計") || label.contains("小計") || label == "計"
}

fn parent_index(taxonomy: &[CanonicalParent], label: &str) -> Option<usize> {
    // Total rows like 流動資産合計 contain the parent caption but close a
    // section rather than open one.
    if is_total_label(label) {
        return None;
    }
    taxonomy.iter().position(|p| label.contains(p.name))
}

fn is_child_of(parent: &CanonicalParent, label: &str) -> bool {
    parent.children.iter().any(|c| label.contains(c))
}

fn any_parent_lists(taxonomy: &[CanonicalParent], label: &str) -> bool {
    taxonomy.iter().any(|p| is_child_of(p, label))
}

/// Reclassifies flat statement rows against the canonical taxonomy for the
/// statement type: one top-to-bottom pass that assigns indentation levels and
/// total flags, then nests children under the preceding level-0 item. Rows
/// are never reordered or dropped; an unrecognized row simply stays at the
/// top level.
pub fn build_hierarchy(
    rows: &[Vec<Cell>],
    periods: PeriodColumns,
    statement_type: StatementType,
    facts: &[Fact],
    units: &UnitRegistry,
) -> Vec<HierarchicalItem> {
    let taxonomy = taxonomy_for(statement_type);
    let mut flat: Vec<HierarchicalItem> = Vec::new();
    let mut current_parent: Option<usize> = None;

    for row in rows {
        let label = row.first().map(|c| c.text.trim().to_string()).unwrap_or_default();
        if label.is_empty() && row.iter().all(|c| c.text.trim().is_empty()) {
            continue;
        }

        let mut item = row_item(&label, row, periods, facts, units);
        item.is_total = is_total_label(&label);

        if let Some(idx) = parent_index(taxonomy, &label) {
            current_parent = Some(idx);
            item.level = 0;
        } else if item.is_total {
            // A total row closes its section but stays indented under it when
            // it names the open parent.
            let under_parent = current_parent
                .map(|idx| label.contains(taxonomy[idx].name))
                .unwrap_or(false);
            item.level = if under_parent { 1 } else { 0 };
            if under_parent {
                current_parent = None;
            }
        } else if current_parent
            .map(|idx| is_child_of(&taxonomy[idx], &label))
            .unwrap_or(false)
        {
            item.level = 1;
        } else if any_parent_lists(taxonomy, &label) {
            item.level = 1;
        } else {
            item.level = 0;
        }

        flat.push(item);
    }

    nest(flat)
}

/// Attaches each level-1 item to the nearest preceding level-0 item.
fn nest(flat: Vec<HierarchicalItem>) -> Vec<HierarchicalItem> {
    let mut roots: Vec<HierarchicalItem> = Vec::new();
    for item in flat {
        if item.level > 0 {
            if let Some(parent) = roots.last_mut() {
                parent.children.push(item);
                continue;
            }
        }
        roots.push(item);
    }
    roots
}

fn row_item(
    label: &str,
    row: &[Cell],
    periods: PeriodColumns,
    facts: &[Fact],
    units: &UnitRegistry,
) -> HierarchicalItem {
    let mut item = HierarchicalItem::new(label);

    let previous = periods.previous.and_then(|i| row.get(i));
    let current = periods.current.and_then(|i| row.get(i));

    item.previous_period = previous.and_then(|c| cell_number(c, facts));
    item.current_period = current.and_then(|c| cell_number(c, facts));

    // The current-period fact is the canonical source for tag, unit, and
    // context traceability; the previous-period fact fills in when the
    // current cell is unbound.
    let source_fact = current
        .and_then(|c| c.fact_index)
        .or_else(|| previous.and_then(|c| c.fact_index))
        .and_then(|i| facts.get(i));
    if let Some(fact) = source_fact {
        item.xbrl_tag = Some(fact.name.clone());
        item.context_ref = fact.context_ref.clone();
        item.unit_ref = fact.unit_ref.clone();
        item.unit_label = fact
            .unit_ref
            .as_deref()
            .and_then(|id| units.get(id))
            .map(|u| u.label.clone());
    }

    item.derive_change();

    // Explicit change columns override the derived values when parseable.
    if let Some(value) = periods
        .change
        .and_then(|i| row.get(i))
        .and_then(|c| cell_number(c, facts))
    {
        item.change = Some(value);
    }
    if let Some(value) = periods
        .change_rate
        .and_then(|i| row.get(i))
        .and_then(|c| cell_number(c, facts))
    {
        item.change_rate = Some(value);
    }

    item
}

fn cell_number(cell: &Cell, facts: &[Fact]) -> Option<f64> {
    if let Some(fact) = cell.fact_index.and_then(|i| facts.get(i)) {
        normalize::normalize_value(&fact.value, fact.decimals, fact.scale, fact.sign_negated)
            .or_else(|| normalize::parse_number(&cell.text))
    } else {
        normalize::parse_number(&cell.text)
    }
}
