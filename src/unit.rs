use once_cell::sync::Lazy;
use roxmltree::{Document, Node};
use std::collections::HashMap;

use crate::types::{Unit, UnitKind};

/// Fixed measure→label table. Keys are matched against the local part of the
/// measure QName; anything unknown passes through as its local name.
static MEASURE_LABELS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("JPY", "円"),
        ("USD", "ドル"),
        ("EUR", "ユーロ"),
        ("GBP", "ポンド"),
        ("CNY", "元"),
        ("shares", "株"),
        ("Shares", "株"),
        ("pure", ""),
        ("Pure", ""),
        ("percent", "％"),
        ("Percent", "％"),
    ])
});

fn local_measure(measure: &str) -> &str {
    measure.rsplit_once(':').map(|(_, l)| l).unwrap_or(measure)
}

pub fn measure_label(measure: &str) -> String {
    let local = local_measure(measure.trim());
    MEASURE_LABELS
        .get(local)
        .map(|l| l.to_string())
        .unwrap_or_else(|| local.to_string())
}

/// All units of one document, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    map: HashMap<String, Unit>,
}

impl UnitRegistry {
    pub fn parse(doc: &Document) -> Self {
        let mut map = HashMap::new();

        for node in doc
            .root_element()
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "unit")
        {
            let Some(id) = node.attribute("id") else {
                continue;
            };
            map.entry(id.to_string()).or_insert_with(|| parse_unit(id, node));
        }

        UnitRegistry { map }
    }

    pub fn get(&self, id: &str) -> Option<&Unit> {
        self.map.get(id)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Same synthesis path as bare context references: a unitRef with no unit
    /// element gets a record classified from the id text alone.
    pub fn ensure_referenced<'a>(&mut self, ids: impl Iterator<Item = &'a str>) -> usize {
        let mut added = 0;
        for id in ids {
            if !self.map.contains_key(id) {
                self.map.insert(id.to_string(), synthesize_unit(id));
                added += 1;
            }
        }
        added
    }

    pub fn into_map(self) -> HashMap<String, Unit> {
        self.map
    }
}

fn parse_unit(id: &str, node: Node) -> Unit {
    // A divide element means a fraction unit; otherwise the first measure is
    // the whole unit.
    if let Some(divide) = node
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "divide")
    {
        let numerator = measure_in(divide, "unitNumerator");
        let denominator = measure_in(divide, "unitDenominator");
        let label = format!("{}/{}", measure_label(&numerator), measure_label(&denominator));
        return Unit {
            id: id.to_string(),
            kind: UnitKind::Fraction {
                numerator,
                denominator,
            },
            label,
            synthesized: false,
        };
    }

    let measure = node
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "measure")
        .and_then(|n| n.text())
        .unwrap_or("")
        .trim()
        .to_string();
    let label = measure_label(&measure);
    Unit {
        id: id.to_string(),
        kind: UnitKind::Simple { measure },
        label,
        synthesized: false,
    }
}

fn measure_in(divide: Node, part: &str) -> String {
    divide
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == part)
        .and_then(|p| {
            p.descendants()
                .find(|n| n.is_element() && n.tag_name().name() == "measure")
        })
        .and_then(|n| n.text())
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Id-substring synthesis for bare unit references.
pub fn synthesize_unit(id: &str) -> Unit {
    let measure = if id.contains("JPY") || id.contains("円") {
        "iso4217:JPY"
    } else if id.contains("USD") {
        "iso4217:USD"
    } else if id.to_ascii_lowercase().contains("share") || id.contains("株") {
        "xbrli:shares"
    } else if id.to_ascii_lowercase().contains("pure") {
        "xbrli:pure"
    } else {
        ""
    };
    Unit {
        id: id.to_string(),
        kind: UnitKind::Simple {
            measure: measure.to_string(),
        },
        label: if measure.is_empty() {
            String::new()
        } else {
            measure_label(measure)
        },
        synthesized: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_currency_unit() {
        let xml = r#"
            <xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance">
              <xbrli:unit id="JPY">
                <xbrli:measure>iso4217:JPY</xbrli:measure>
              </xbrli:unit>
            </xbrl>"#;
        let doc = Document::parse(xml).unwrap();
        let registry = UnitRegistry::parse(&doc);
        let unit = registry.get("JPY").unwrap();
        assert_eq!(unit.label, "円");
        assert_eq!(
            unit.kind,
            UnitKind::Simple {
                measure: "iso4217:JPY".to_string()
            }
        );
    }

    #[test]
    fn test_fraction_unit_label() {
        let xml = r#"
            <xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance">
              <xbrli:unit id="JPYPerShares">
                <xbrli:divide>
                  <xbrli:unitNumerator><xbrli:measure>iso4217:JPY</xbrli:measure></xbrli:unitNumerator>
                  <xbrli:unitDenominator><xbrli:measure>xbrli:shares</xbrli:measure></xbrli:unitDenominator>
                </xbrli:divide>
              </xbrli:unit>
            </xbrl>"#;
        let doc = Document::parse(xml).unwrap();
        let registry = UnitRegistry::parse(&doc);
        let unit = registry.get("JPYPerShares").unwrap();
        assert_eq!(unit.label, "円/株");
        assert!(matches!(unit.kind, UnitKind::Fraction { .. }));
    }

    #[test]
    fn test_passthrough_for_unknown_measure() {
        assert_eq!(measure_label("foo:Widget"), "Widget");
        assert_eq!(measure_label("xbrli:pure"), "");
    }

    #[test]
    fn test_bare_reference_synthesis() {
        let unit = synthesize_unit("JPY");
        assert!(unit.synthesized);
        assert_eq!(unit.label, "円");

        let shares = synthesize_unit("NumberOfShares");
        assert_eq!(shares.label, "株");

        let opaque = synthesize_unit("u-1");
        assert_eq!(opaque.label, "");
    }
}
