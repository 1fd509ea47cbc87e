use itertools::Itertools;
use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::context::ContextRegistry;
use crate::table::classify::statement_type_from_tags;
use crate::types::{Cell, Fact, FiscalRole, PeriodColumns, TableCandidate};

/// Japanese captions for the common jppfs/jpcrp line-item tags, so a
/// synthesized statement reads like a rendered one. Unknown tags fall back to
/// their local name.
static TAG_CAPTIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("CurrentAssets", "流動資産"),
        ("NoncurrentAssets", "固定資産"),
        ("Assets", "資産合計"),
        ("CashAndDeposits", "現金及び預金"),
        ("NotesAndAccountsReceivableTrade", "受取手形及び売掛金"),
        ("Inventories", "棚卸資産"),
        ("PropertyPlantAndEquipment", "有形固定資産"),
        ("Land", "土地"),
        ("CurrentLiabilities", "流動負債"),
        ("NoncurrentLiabilities", "固定負債"),
        ("Liabilities", "負債合計"),
        ("NetAssets", "純資産合計"),
        ("ShareholdersEquity", "株主資本"),
        ("CapitalStock", "資本金"),
        ("RetainedEarnings", "利益剰余金"),
        ("TreasuryStock", "自己株式"),
        ("NetSales", "売上高"),
        ("CostOfSales", "売上原価"),
        ("GrossProfit", "売上総利益"),
        (
            "SellingGeneralAndAdministrativeExpenses",
            "販売費及び一般管理費",
        ),
        ("OperatingIncome", "営業利益"),
        ("NonOperatingIncome", "営業外収益"),
        ("NonOperatingExpenses", "営業外費用"),
        ("OrdinaryIncome", "経常利益"),
        ("IncomeBeforeIncomeTaxes", "税引前当期純利益"),
        ("ProfitLoss", "当期純利益"),
        (
            "ProfitLossAttributableToOwnersOfParent",
            "親会社株主に帰属する当期純利益",
        ),
        (
            "NetCashProvidedByUsedInOperatingActivities",
            "営業活動によるキャッシュ・フロー",
        ),
        (
            "NetCashProvidedByUsedInInvestingActivities",
            "投資活動によるキャッシュ・フロー",
        ),
        (
            "NetCashProvidedByUsedInFinancingActivities",
            "財務活動によるキャッシュ・フロー",
        ),
        ("CashAndCashEquivalents", "現金及び現金同等物"),
    ])
});

fn caption_for(tag: &str) -> String {
    let local = tag.rsplit_once(':').map(|(_, l)| l).unwrap_or(tag);
    TAG_CAPTIONS
        .get(local)
        .map(|c| c.to_string())
        .unwrap_or_else(|| local.to_string())
}

fn role_of(fact: &Fact, contexts: &ContextRegistry) -> FiscalRole {
    fact.context_ref
        .as_deref()
        .and_then(|id| contexts.get(id))
        .map(|c| c.fiscal_role)
        .unwrap_or(FiscalRole::Unknown)
}

/// Synthesizes a two-period statement table directly from facts. Invoked
/// only when no markup table qualified; one row per distinct tag, with the
/// first fact per fiscal role populating each period column. Ties are not an
/// error: document order decides.
pub fn build_virtual_table(
    index: usize,
    facts: &[Fact],
    contexts: &ContextRegistry,
) -> TableCandidate {
    let tags: Vec<&str> = facts.iter().map(|f| f.name.as_str()).unique().collect();

    let header = vec![
        owner_cell("科目"),
        owner_cell("前期"),
        owner_cell("当期"),
    ];

    let mut rows = Vec::with_capacity(tags.len());
    let mut bound = 0usize;
    for tag in &tags {
        let previous = facts
            .iter()
            .position(|f| f.name == *tag && role_of(f, contexts) == FiscalRole::Previous);
        let current = facts
            .iter()
            .position(|f| f.name == *tag && role_of(f, contexts) == FiscalRole::Current)
            .or_else(|| {
                // All-unknown roles still produce a usable current column.
                facts
                    .iter()
                    .position(|f| f.name == *tag && role_of(f, contexts) == FiscalRole::Unknown)
            });

        bound += usize::from(previous.is_some()) + usize::from(current.is_some());
        rows.push(vec![
            owner_cell(&caption_for(tag)),
            value_cell(previous, facts),
            value_cell(current, facts),
        ]);
    }

    let statement_type = statement_type_from_tags(tags.iter().copied());
    log::debug!(
        "virtual table: {} rows from {} facts, type={}",
        rows.len(),
        facts.len(),
        statement_type
    );

    TableCandidate {
        index,
        title: statement_type.canonical_label().map(String::from),
        score: 0,
        statement_type,
        header,
        rows,
        periods: PeriodColumns {
            previous: Some(1),
            current: Some(2),
            change: None,
            change_rate: None,
            positional_default: false,
        },
        synthetic: true,
        bound_fact_count: bound,
    }
}

fn owner_cell(text: &str) -> Cell {
    Cell {
        text: text.to_string(),
        fact_index: None,
        colspan_owner: true,
    }
}

fn value_cell(fact_index: Option<usize>, facts: &[Fact]) -> Cell {
    match fact_index {
        Some(i) => Cell {
            text: facts[i].value.clone(),
            fact_index: Some(i),
            colspan_owner: true,
        },
        None => Cell::empty(),
    }
}
