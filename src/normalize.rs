use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Characters stripped outright before numeric parsing: grouping separators,
/// currency marks, and footnote markers that ride along in table cells.
static STRIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,，、\s¥￥円%％※*]+").unwrap());

/// Accounting negation: triangle glyphs or a fully parenthesized amount.
static PAREN_NEGATIVE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\((.+)\)$").unwrap());

/// Folds full-width punctuation/digits and decodes entities, leaving the text
/// otherwise untouched. Applied before any numeric interpretation.
pub fn fold_text(text: &str) -> String {
    let decoded = html_escape::decode_html_entities(text);
    decoded.nfkc().collect::<String>().trim().to_string()
}

/// Reduces raw cell text to a parseable signed decimal string, or returns
/// None when the text is not numeric. Idempotent: already-clean numeric text
/// maps to itself.
pub fn clean_numeric(text: &str) -> Option<String> {
    let folded = fold_text(text);
    if folded.is_empty() {
        return None;
    }

    let mut negative = false;
    let mut body = folded.as_str();

    if let Some(rest) = body.strip_prefix(&['△', '▲'][..]) {
        negative = true;
        body = rest;
    } else if let Some(caps) = PAREN_NEGATIVE_RE.captures(body) {
        negative = true;
        body = caps.get(1).map(|m| m.as_str()).unwrap_or(body);
    }

    let stripped = STRIP_RE.replace_all(body, "").to_string();
    let unsigned = stripped.strip_prefix('-').map(|r| {
        negative = !negative;
        r.to_string()
    });
    let digits = unsigned.unwrap_or(stripped);

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    if digits.chars().filter(|&c| c == '.').count() > 1 {
        return None;
    }

    Some(if negative {
        format!("-{}", digits)
    } else {
        digits
    })
}

/// Parses cell text into a plain number. Never fails; non-numeric text maps
/// to None and the caller keeps the raw text.
pub fn parse_number(text: &str) -> Option<f64> {
    clean_numeric(text).and_then(|s| s.parse::<f64>().ok())
}

/// Full normalization for a fact-derived value: clean the text, honor the
/// inline sign attribute, apply the scale multiplier, round to `decimals`
/// fractional digits when given and non-negative.
pub fn normalize_value(
    raw: &str,
    decimals: Option<i32>,
    scale: Option<i32>,
    sign_negated: bool,
) -> Option<f64> {
    let mut value = parse_number(raw)?;
    if sign_negated {
        value = -value;
    }
    if let Some(scale) = scale {
        value *= 10f64.powi(scale);
    }
    if let Some(decimals) = decimals {
        if decimals >= 0 {
            let factor = 10f64.powi(decimals);
            value = (value * factor).round() / factor;
        }
    }
    Some(value)
}

/// User-facing rendering: thousands separators plus the unit's display
/// label. The numeric value itself stays separate; this is presentation only.
pub fn format_value(value: f64, unit_label: Option<&str>) -> String {
    let negative = value < 0.0;
    let abs = value.abs();
    let formatted = if abs.fract() == 0.0 {
        format!("{:.0}", abs)
    } else {
        format!("{:.2}", abs)
    };

    let parts: Vec<&str> = formatted.split('.').collect();
    let mut result = String::new();
    let chars: Vec<_> = parts[0].chars().collect();
    for (i, c) in chars.iter().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.insert(0, ',');
        }
        result.insert(0, *c);
    }
    if parts.len() > 1 {
        result.push('.');
        result.push_str(parts[1]);
    }
    if negative {
        result.insert(0, '-');
    }

    match unit_label {
        Some(label) if !label.is_empty() => {
            if label.is_ascii() {
                format!("{} {}", result, label)
            } else {
                // CJK unit labels attach without a space: 1,234円
                format!("{}{}", result, label)
            }
        }
        _ => result,
    }
}
