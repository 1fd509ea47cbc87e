use once_cell::sync::Lazy;
use roxmltree::{Document, Node};
use strum::IntoEnumIterator;

use crate::fact::{element_text, ScannedFact};
use crate::namespace::NamespaceTable;
use crate::table::cells::owned_by;
use crate::types::StatementType;

/// Minimum score for a table to count as a financial candidate.
pub const FINANCIAL_TABLE_THRESHOLD: i32 = 3;

/// Statement captions matched against headings and titles.
static TITLE_KEYWORDS: Lazy<Vec<(StatementType, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        (
            StatementType::BalanceSheet,
            vec![
                "貸借対照表",
                "財政状態計算書",
                "バランスシート",
                "balance sheet",
            ],
        ),
        (
            StatementType::IncomeStatement,
            vec![
                "損益計算書",
                "損益及び包括利益計算書",
                "income statement",
                "statements of income",
                "profit and loss",
            ],
        ),
        (
            StatementType::CashFlow,
            vec![
                "キャッシュ・フロー計算書",
                "キャッシュフロー計算書",
                "cash flow",
            ],
        ),
        (
            StatementType::ShareholderEquity,
            vec![
                "株主資本等変動計算書",
                "持分変動計算書",
                "changes in equity",
                "changes in net assets",
            ],
        ),
    ]
});

/// Line-item vocabulary found inside statement bodies; used for in-table
/// keyword scoring and for typing tables without a usable heading.
static CONTENT_KEYWORDS: Lazy<Vec<(StatementType, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        (
            StatementType::BalanceSheet,
            vec![
                "資産の部",
                "負債の部",
                "純資産の部",
                "assets section",
                "liabilities section",
                "流動資産",
                "固定資産",
                "流動負債",
                "固定負債",
                "負債純資産合計",
            ],
        ),
        (
            StatementType::IncomeStatement,
            vec![
                "売上高",
                "売上原価",
                "売上総利益",
                "営業利益",
                "経常利益",
                "当期純利益",
                "販売費及び一般管理費",
            ],
        ),
        (
            StatementType::CashFlow,
            vec![
                "営業活動によるキャッシュ・フロー",
                "投資活動によるキャッシュ・フロー",
                "財務活動によるキャッシュ・フロー",
                "現金及び現金同等物",
            ],
        ),
        (
            StatementType::ShareholderEquity,
            vec!["株主資本", "資本剰余金", "利益剰余金", "剰余金の配当", "自己株式"],
        ),
    ]
});

/// XBRL tag fragments mapped to statement types, for fact-only inference.
static TAG_KEYWORDS: Lazy<Vec<(StatementType, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        (
            StatementType::CashFlow,
            vec!["CashFlow", "CashAndCashEquivalents", "CashAndDeposits"],
        ),
        (
            StatementType::IncomeStatement,
            vec![
                "NetSales",
                "OperatingIncome",
                "OrdinaryIncome",
                "GrossProfit",
                "ProfitLoss",
                "CostOfSales",
            ],
        ),
        (
            StatementType::BalanceSheet,
            vec!["Assets", "Liabilities", "NetAssets", "Equity"],
        ),
        (
            StatementType::ShareholderEquity,
            vec!["ShareholdersEquity", "Dividends", "TreasuryStock"],
        ),
    ]
});

/// First-column account-caption vocabulary for the +2 label component.
static ROW_LABELS: &[&str] = &[
    "資産の部",
    "負債の部",
    "純資産の部",
    "流動資産",
    "固定資産",
    "流動負債",
    "固定負債",
    "株主資本",
    "売上高",
    "売上原価",
    "営業利益",
    "経常利益",
    "当期純利益",
    "営業活動によるキャッシュ・フロー",
    "現金及び預金",
    "資産合計",
    "負債合計",
];

fn title_type(text: &str) -> Option<StatementType> {
    let lower = text.to_lowercase();
    TITLE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(&k.to_lowercase())))
        .map(|(ty, _)| *ty)
}

fn content_type(text: &str) -> Option<StatementType> {
    let lower = text.to_lowercase();
    // Most content-keyword hits wins; ties resolve in declaration order, so
    // later entries must beat the running best strictly.
    let mut best: Option<(StatementType, usize)> = None;
    for (ty, keywords) in CONTENT_KEYWORDS.iter() {
        let hits = keywords
            .iter()
            .filter(|k| lower.contains(&k.to_lowercase()))
            .count();
        if hits > 0 && best.map_or(true, |(_, b)| hits > b) {
            best = Some((*ty, hits));
        }
    }
    best.map(|(ty, _)| ty)
}

/// Infers a statement type from an aggregate of XBRL tag names. Shared with
/// the virtual-table builder.
pub fn statement_type_from_tags<'a>(tags: impl Iterator<Item = &'a str>) -> StatementType {
    let mut counts: Vec<(StatementType, usize)> =
        StatementType::iter().map(|ty| (ty, 0usize)).collect();
    for tag in tags {
        let local = tag.rsplit_once(':').map(|(_, l)| l).unwrap_or(tag);
        for (ty, fragments) in TAG_KEYWORDS.iter() {
            if fragments.iter().any(|f| local.contains(f)) {
                if let Some(entry) = counts.iter_mut().find(|(t, _)| t == ty) {
                    entry.1 += 1;
                }
                break;
            }
        }
    }
    counts
        .into_iter()
        .filter(|(ty, hits)| *hits > 0 && *ty != StatementType::Unknown)
        .max_by_key(|(_, hits)| *hits)
        .map(|(ty, _)| ty)
        .unwrap_or(StatementType::Unknown)
}

/// A scored source table, still holding its document node for cell mapping.
#[derive(Debug, Clone)]
pub struct ClassifiedTable<'a, 'input> {
    pub node: Node<'a, 'input>,
    pub index: usize,
    pub score: i32,
    pub statement_type: StatementType,
    pub title: Option<String>,
    pub bound_fact_count: usize,
    pub retained: bool,
}

/// Scores and types every table element in the document. Tables below the
/// threshold are returned with `retained == false` so the orchestrator can
/// still fall back to them when nothing qualifies.
pub fn classify_tables<'a, 'input>(
    doc: &'a Document<'input>,
    ns: &NamespaceTable,
    facts: &[ScannedFact],
) -> Vec<ClassifiedTable<'a, 'input>> {
    let mut out = Vec::new();

    for (index, table) in doc
        .root_element()
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case("table"))
        .filter(|n| !nested_in_table(*n))
        .enumerate()
    {
        let classified = classify_one(table, index, ns, facts);
        log::debug!(
            "table {}: score={} type={} title={:?}",
            index,
            classified.score,
            classified.statement_type,
            classified.title
        );
        out.push(classified);
    }

    out
}

fn classify_one<'a, 'input>(
    table: Node<'a, 'input>,
    index: usize,
    ns: &NamespaceTable,
    facts: &[ScannedFact],
) -> ClassifiedTable<'a, 'input> {
    let mut score = 0;

    let heading = preceding_heading(table);
    let heading_type = heading.as_deref().and_then(title_type);
    if heading_type.is_some() {
        score += 3;
    }

    let body_text = element_text(table);
    let body_type = content_type(&body_text);
    if body_type.is_some() {
        score += 2;
    }

    let bound_fact_count = facts
        .iter()
        .filter(|f| ns.is_financial_tag(&f.fact.name) && contains_node(table, f.node_id))
        .count();
    if bound_fact_count > 0 {
        score += 5;
    }

    let (row_count, col_count) = table_shape(table);
    if row_count >= 3 && col_count >= 2 {
        score += 1;
    }

    if first_column_matches(table) {
        score += 2;
    }

    let statement_type = heading_type
        .or(body_type)
        .or_else(|| {
            let tags = facts
                .iter()
                .filter(|f| contains_node(table, f.node_id))
                .map(|f| f.fact.name.as_str())
                .collect::<Vec<_>>();
            if tags.is_empty() {
                None
            } else {
                Some(statement_type_from_tags(tags.into_iter()))
            }
        })
        .unwrap_or(StatementType::Unknown);

    // Prefer the verbatim heading as the title; fall back to the canonical
    // caption for the assigned type.
    let title = match (&heading, heading_type) {
        (Some(h), Some(_)) => Some(h.clone()),
        _ => statement_type.canonical_label().map(String::from),
    };

    ClassifiedTable {
        node: table,
        index,
        score,
        statement_type,
        title,
        bound_fact_count,
        retained: score >= FINANCIAL_TABLE_THRESHOLD,
    }
}

/// Nearest short text block before the table: previous siblings first, then
/// the ancestors' previous siblings, a bounded number of hops each.
fn preceding_heading(table: Node) -> Option<String> {
    const MAX_HOPS: usize = 6;
    const MAX_LEVELS: usize = 3;

    let mut anchor = Some(table);
    for _ in 0..MAX_LEVELS {
        let node = anchor?;
        let mut sibling = node.prev_sibling();
        let mut hops = 0;
        while let Some(s) = sibling {
            if s.is_element() {
                let text = element_text(s);
                if !text.is_empty() && text.chars().count() <= 80 {
                    return Some(text);
                }
                hops += 1;
                if hops >= MAX_HOPS {
                    break;
                }
            }
            sibling = s.prev_sibling();
        }
        anchor = node.parent();
    }
    None
}

fn contains_node(table: Node, id: roxmltree::NodeId) -> bool {
    table.descendants().any(|n| n.id() == id)
}

/// A table inside another table's cell is note markup, not a candidate of
/// its own; its rows already fold into the enclosing cell's text.
fn nested_in_table(node: Node) -> bool {
    node.ancestors()
        .skip(1)
        .any(|a| a.is_element() && a.tag_name().name().eq_ignore_ascii_case("table"))
}

fn table_shape(table: Node) -> (usize, usize) {
    let rows: Vec<Node> = table
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case("tr"))
        .filter(|n| owned_by(table, *n))
        .collect();
    let cols = rows
        .iter()
        .map(|r| {
            r.children()
                .filter(|n| {
                    n.is_element()
                        && matches!(
                            n.tag_name().name().to_ascii_lowercase().as_str(),
                            "td" | "th"
                        )
                })
                .count()
        })
        .max()
        .unwrap_or(0);
    (rows.len(), cols)
}

fn first_column_matches(table: Node) -> bool {
    table
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case("tr"))
        .filter(|n| owned_by(table, *n))
        .filter_map(|r| {
            r.children()
                .find(|n| {
                    n.is_element()
                        && matches!(
                            n.tag_name().name().to_ascii_lowercase().as_str(),
                            "td" | "th"
                        )
                })
                .map(element_text)
        })
        .any(|label| ROW_LABELS.iter().any(|known| label.contains(known)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact;

    fn classify_str(xml: &str) -> Vec<(i32, StatementType, bool)> {
        let doc = Document::parse(xml).unwrap();
        let ns = NamespaceTable::from_document(&doc);
        let (facts, _) = fact::scan(&doc, &ns);
        classify_tables(&doc, &ns, &facts)
            .into_iter()
            .map(|t| (t.score, t.statement_type, t.retained))
            .collect()
    }

    #[test]
    fn test_keywords_alone_classify_balance_sheet() {
        // No fact attributes at all; section keywords carry the score.
        let xml = r#"
            <html><body>
              <table>
                <tr><td>科目</td><td>金額</td></tr>
                <tr><td>資産の部</td><td></td></tr>
                <tr><td>負債の部</td><td></td></tr>
              </table>
            </body></html>"#;
        let tables = classify_str(xml);
        assert_eq!(tables.len(), 1);
        let (score, ty, retained) = tables[0];
        assert_eq!(ty, StatementType::BalanceSheet);
        // +2 content keywords, +1 shape, +2 first-column label
        assert_eq!(score, 5);
        assert!(retained);
    }

    #[test]
    fn test_heading_keyword_and_monotonicity() {
        let bare = r#"
            <html><body>
              <table>
                <tr><td>a</td><td>b</td></tr>
                <tr><td>c</td><td>d</td></tr>
                <tr><td>e</td><td>f</td></tr>
              </table>
            </body></html>"#;
        let with_heading = r#"
            <html><body>
              <p>連結貸借対照表</p>
              <table>
                <tr><td>a</td><td>b</td></tr>
                <tr><td>c</td><td>d</td></tr>
                <tr><td>e</td><td>f</td></tr>
              </table>
            </body></html>"#;
        let bare_score = classify_str(bare)[0].0;
        let heading_score = classify_str(with_heading)[0].0;
        // Adding a financial keyword to the heading never lowers the score.
        assert!(heading_score > bare_score);
        assert_eq!(heading_score - bare_score, 3);
    }

    #[test]
    fn test_bound_financial_fact_scores_five() {
        let xml = r#"
            <html xmlns:ix="http://www.xbrl.org/2013/inlineXBRL"><body>
              <table>
                <tr><td>x</td><td><ix:nonFraction name="jppfs_cor:Assets" contextRef="c1" unitRef="u1">10</ix:nonFraction></td></tr>
              </table>
            </body></html>"#;
        let tables = classify_str(xml);
        let (score, ty, retained) = tables[0];
        assert_eq!(score, 5);
        assert!(retained);
        // Tag vocabulary types the table even without keywords.
        assert_eq!(ty, StatementType::BalanceSheet);
    }

    #[test]
    fn test_below_threshold_not_retained() {
        let xml = r#"<html><body><table><tr><td>1</td><td>2</td></tr></table></body></html>"#;
        let tables = classify_str(xml);
        assert_eq!(tables[0].0, 0);
        assert!(!tables[0].2);
    }

    #[test]
    fn test_verbatim_heading_becomes_title() {
        let xml = r#"
            <html><body>
              <p>連結損益計算書</p>
              <table>
                <tr><td>売上高</td><td>100</td></tr>
                <tr><td>営業利益</td><td>10</td></tr>
                <tr><td>経常利益</td><td>12</td></tr>
              </table>
            </body></html>"#;
        let doc = Document::parse(xml).unwrap();
        let ns = NamespaceTable::from_document(&doc);
        let (facts, _) = fact::scan(&doc, &ns);
        let tables = classify_tables(&doc, &ns, &facts);
        assert_eq!(tables[0].title.as_deref(), Some("連結損益計算書"));
        assert_eq!(tables[0].statement_type, StatementType::IncomeStatement);
    }

    #[test]
    fn test_nested_table_is_not_a_separate_candidate() {
        let xml = r#"
            <html><body>
              <p>貸借対照表</p>
              <table>
                <tr><td>科目</td><td>当期</td></tr>
                <tr><td>資産の部</td><td></td></tr>
                <tr><td>現金及び預金
                    <table>
                      <tr><td>内訳A</td><td>10</td></tr>
                      <tr><td>内訳B</td><td>20</td></tr>
                    </table></td><td>30</td></tr>
              </table>
            </body></html>"#;
        let tables = classify_str(xml);
        assert_eq!(tables.len(), 1);
        assert!(tables[0].2);
    }

    #[test]
    fn test_content_keyword_ties_resolve_in_declaration_order() {
        // One balance-sheet hit against one cash-flow hit: the earlier-
        // declared balance sheet wins.
        assert_eq!(
            content_type("流動資産 現金及び現金同等物"),
            Some(StatementType::BalanceSheet)
        );
        // A strict majority still overrides declaration order.
        assert_eq!(
            content_type("流動資産 営業活動によるキャッシュ・フロー 現金及び現金同等物"),
            Some(StatementType::CashFlow)
        );
    }

    #[test]
    fn test_statement_type_from_tags() {
        let ty = statement_type_from_tags(
            ["jppfs_cor:NetSales", "jppfs_cor:OperatingIncome", "jppfs_cor:Assets"].into_iter(),
        );
        assert_eq!(ty, StatementType::IncomeStatement);
        assert_eq!(
            statement_type_from_tags(["foo:Bar"].into_iter()),
            StatementType::Unknown
        );
    }
}
