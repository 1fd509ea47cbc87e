use once_cell::sync::Lazy;
use roxmltree::Document;
use std::collections::HashMap;

/// Default prefix bindings for EDINET filings. Real documents redeclare most
/// of these on the root element, but partially-tagged filings frequently use
/// the conventional prefixes without declaring them.
static DEFAULT_NAMESPACES: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("ix", "http://www.xbrl.org/2013/inlineXBRL"),
        ("ixt", "http://www.xbrl.org/inlineXBRL/transformation/2015-02-26"),
        ("xbrli", "http://www.xbrl.org/2003/instance"),
        ("xbrldi", "http://xbrl.org/2006/xbrldi"),
        ("xbrldt", "http://xbrl.org/2005/xbrldt"),
        ("link", "http://www.xbrl.org/2003/linkbase"),
        ("xlink", "http://www.w3.org/1999/xlink"),
        (
            "jppfs_cor",
            "http://disclosure.edinet-fsa.go.jp/taxonomy/jppfs/2023-12-01/jppfs_cor",
        ),
        (
            "jpcrp_cor",
            "http://disclosure.edinet-fsa.go.jp/taxonomy/jpcrp/2023-12-01/jpcrp_cor",
        ),
        (
            "jpdei_cor",
            "http://disclosure.edinet-fsa.go.jp/taxonomy/jpdei/2013-08-31/jpdei_cor",
        ),
        (
            "jpigp_cor",
            "http://disclosure.edinet-fsa.go.jp/taxonomy/jpigp/2023-12-01/jpigp_cor",
        ),
        (
            "jplvh_cor",
            "http://disclosure.edinet-fsa.go.jp/taxonomy/jplvh/2013-08-31/jplvh_cor",
        ),
        (
            "jpfie_cor",
            "http://disclosure.edinet-fsa.go.jp/taxonomy/jpfie/2013-08-31/jpfie_cor",
        ),
        (
            "jpcai_cor",
            "http://disclosure.edinet-fsa.go.jp/taxonomy/jpcai/2013-08-31/jpcai_cor",
        ),
        (
            "jppre_cor",
            "http://disclosure.edinet-fsa.go.jp/taxonomy/jppre/2013-08-31/jppre_cor",
        ),
    ]
});

/// Prefixes whose facts count as recognized financial taxonomy tags when
/// scoring tables.
const FINANCIAL_PREFIXES: &[&str] = &[
    "jppfs_cor",
    "jpcrp_cor",
    "jpdei_cor",
    "jpigp_cor",
    "jplvh_cor",
    "jpfie_cor",
    "jpcai_cor",
    "jppfs",
    "jpcrp",
    "jpigp",
];

/// Prefix→URI table for one document. Built once per run, read-only after.
#[derive(Debug, Clone)]
pub struct NamespaceTable {
    prefixes: HashMap<String, String>,
}

impl NamespaceTable {
    /// Seeds the defaults, then overrides with whatever the root element
    /// actually declares. Never fails.
    pub fn from_document(doc: &Document) -> Self {
        let mut prefixes: HashMap<String, String> = DEFAULT_NAMESPACES
            .iter()
            .map(|(p, u)| (p.to_string(), u.to_string()))
            .collect();

        for ns in doc.root_element().namespaces() {
            if let Some(prefix) = ns.name() {
                prefixes.insert(prefix.to_string(), ns.uri().to_string());
            }
        }

        NamespaceTable { prefixes }
    }

    pub fn uri(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|(_, u)| u.as_str() == uri)
            .map(|(p, _)| p.as_str())
    }

    pub fn is_known_prefix(&self, prefix: &str) -> bool {
        self.prefixes.contains_key(prefix)
    }

    /// Whether a prefix belongs to one of the Japanese disclosure taxonomies.
    pub fn is_financial_prefix(&self, prefix: &str) -> bool {
        FINANCIAL_PREFIXES.contains(&prefix)
            || self
                .uri(prefix)
                .map(|u| u.contains("disclosure.edinet-fsa.go.jp"))
                .unwrap_or(false)
    }

    /// "prefix:Local" → financial check on the prefix part.
    pub fn is_financial_tag(&self, qualified: &str) -> bool {
        qualified
            .split_once(':')
            .map(|(p, _)| self.is_financial_prefix(p))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_present_without_declarations() {
        let doc = Document::parse("<root/>").unwrap();
        let ns = NamespaceTable::from_document(&doc);
        assert_eq!(ns.uri("xbrli"), Some("http://www.xbrl.org/2003/instance"));
        assert!(ns.is_known_prefix("jppfs_cor"));
        assert!(ns.is_financial_prefix("jppfs_cor"));
        assert!(!ns.is_financial_prefix("xbrli"));
    }

    #[test]
    fn test_root_declarations_override_defaults() {
        let xml = r#"<root xmlns:xbrli="http://example.com/custom" xmlns:mine="http://example.com/mine"/>"#;
        let doc = Document::parse(xml).unwrap();
        let ns = NamespaceTable::from_document(&doc);
        assert_eq!(ns.uri("xbrli"), Some("http://example.com/custom"));
        assert_eq!(ns.uri("mine"), Some("http://example.com/mine"));
        // Untouched defaults still present
        assert!(ns.is_known_prefix("ix"));
    }

    #[test]
    fn test_financial_tag_check() {
        let doc = Document::parse("<root/>").unwrap();
        let ns = NamespaceTable::from_document(&doc);
        assert!(ns.is_financial_tag("jppfs_cor:Assets"));
        assert!(!ns.is_financial_tag("us-gaap:Assets"));
        assert!(!ns.is_financial_tag("Assets"));
    }
}
