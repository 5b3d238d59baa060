//! Shared markup helpers used by every per-store rule set: schema.org
//! JSON-LD offers, product meta tags, page titles, and price-text parsing.

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::models::Availability;

/// A price candidate recovered from markup.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceCandidate {
    pub amount: Decimal,
    pub currency: Option<String>,
    pub availability: Availability,
}

fn text_price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // common shapes: "5 999,00 zł", "1999.00 PLN", "199,99 €"
        Regex::new(r"(?i)(\d[\d\s\u{00a0}.,]*)\s*(zł|pln|eur|€|usd|\$)")
            .unwrap_or_else(|e| panic!("invalid price regex: {e}"))
    })
}

fn symbol_price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // symbol-prefixed shapes: "$19.99", "€ 199,99"
        Regex::new(r"([$€])\s*(\d[\d\s\u{00a0}.,]*)")
            .unwrap_or_else(|e| panic!("invalid price regex: {e}"))
    })
}

/// Normalize thousand/decimal separators:
/// `5 999,00` | `5 999,00` (NBSP) | `5,999.00` | `5999` → `5999.00` / `5999`.
pub fn clean_number(text: &str) -> String {
    let mut t: String = text
        .replace('\u{00a0}', " ")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let has_comma = t.contains(',');
    let has_dot = t.contains('.');
    if has_comma && has_dot {
        // If both separators appear, the last one is the decimal point.
        if t.rfind(',') > t.rfind('.') {
            t = t.replace('.', "").replace(',', ".");
        } else {
            t = t.replace(',', "");
        }
    } else if has_comma {
        t = t.replace(',', ".");
    }
    // The regexes may capture a trailing separator ("1999, " → "1999.").
    t.trim_end_matches('.').to_string()
}

/// Parse a cleaned amount; non-positive amounts do not count as prices.
pub fn decimal_from_text(text: &str) -> Option<Decimal> {
    let amount = Decimal::from_str(&clean_number(text)).ok()?;
    (amount > Decimal::ZERO).then_some(amount)
}

/// Map a currency token or symbol to an ISO code.
pub fn currency_code(token: &str) -> Option<String> {
    let t = token.trim().to_lowercase();
    match t.as_str() {
        "zł" | "pln" => Some("PLN".to_string()),
        "€" | "eur" => Some("EUR".to_string()),
        "$" | "usd" => Some("USD".to_string()),
        _ => None,
    }
}

/// Regex fallback over the document's visible text: first
/// `<number> <currency-token>` pair.
pub fn text_price(doc: &Html) -> Option<PriceCandidate> {
    let text = doc.root_element().text().collect::<Vec<_>>().join(" ");
    let captures = text_price_re().captures(&text)?;
    let amount = decimal_from_text(captures.get(1)?.as_str())?;
    let currency = captures.get(2).and_then(|m| currency_code(m.as_str()));
    Some(PriceCandidate {
        amount,
        currency,
        availability: Availability::Unknown,
    })
}

/// Parse a short price string (an element's text) rather than a whole page.
/// Handles both suffix tokens ("3 141,12 zł") and prefix symbols ("$19.99").
pub fn price_from_fragment(text: &str) -> Option<(Decimal, Option<String>)> {
    if let Some(captures) = text_price_re().captures(text) {
        let amount = decimal_from_text(captures.get(1)?.as_str())?;
        let currency = captures.get(2).and_then(|m| currency_code(m.as_str()));
        return Some((amount, currency));
    }

    let captures = symbol_price_re().captures(text)?;
    let amount = decimal_from_text(captures.get(2)?.as_str())?;
    let currency = captures.get(1).and_then(|m| currency_code(m.as_str()));
    Some((amount, currency))
}

/// First schema.org Product offer carrying a price, walking every JSON-LD
/// block and nested object on the page.
pub fn jsonld_offer(doc: &Html) -> Option<PriceCandidate> {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;

    for node in doc.select(&selector) {
        let raw = node.text().collect::<String>();
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let Ok(data) = serde_json::from_str::<Value>(raw) else {
            continue;
        };
        if let Some(candidate) = walk_for_offer(&data) {
            return Some(candidate);
        }
    }
    None
}

fn walk_for_offer(value: &Value) -> Option<PriceCandidate> {
    match value {
        Value::Object(obj) => {
            if let Some(offers) = obj.get("offers") {
                if let Some(candidate) = offer_price(offers) {
                    return Some(candidate);
                }
            }
            obj.values().find_map(walk_for_offer)
        }
        Value::Array(items) => items.iter().find_map(walk_for_offer),
        _ => None,
    }
}

fn offer_price(offers: &Value) -> Option<PriceCandidate> {
    let candidates: Vec<&Value> = match offers {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    for offer in candidates {
        let Value::Object(obj) = offer else { continue };

        let price = obj
            .get("price")
            .or_else(|| obj.get("priceSpecification").and_then(|s| s.get("price")));
        let amount = match price {
            Some(Value::Number(n)) => decimal_from_text(&n.to_string()),
            Some(Value::String(s)) => decimal_from_text(s),
            _ => None,
        };
        let Some(amount) = amount else { continue };

        let currency = obj
            .get("priceCurrency")
            .or_else(|| {
                obj.get("priceSpecification")
                    .and_then(|s| s.get("priceCurrency"))
            })
            .and_then(|v| v.as_str())
            .map(|s| s.to_uppercase());

        let availability = obj
            .get("availability")
            .and_then(|v| v.as_str())
            .map(availability_from_schema)
            .unwrap_or(Availability::Unknown);

        return Some(PriceCandidate {
            amount,
            currency,
            availability,
        });
    }
    None
}

fn availability_from_schema(value: &str) -> Availability {
    if value.contains("InStock") || value.contains("LimitedAvailability") {
        Availability::InStock
    } else if value.contains("OutOfStock") || value.contains("SoldOut") {
        Availability::OutOfStock
    } else {
        Availability::Unknown
    }
}

/// `<meta property="...">` content attribute.
pub fn meta_content(doc: &Html, property: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"meta[property="{property}"]"#)).ok()?;
    doc.select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// OpenGraph product price meta tags.
pub fn meta_price(doc: &Html) -> Option<PriceCandidate> {
    let amount = decimal_from_text(&meta_content(doc, "product:price:amount")?)?;
    let currency = meta_content(doc, "product:price:currency").map(|c| c.to_uppercase());
    Some(PriceCandidate {
        amount,
        currency,
        availability: Availability::Unknown,
    })
}

/// Display title: og:title, then `<title>`, then the first `<h1>`.
pub fn page_title(doc: &Html) -> Option<String> {
    if let Some(title) = meta_content(doc, "og:title") {
        return Some(title);
    }

    for selector in ["title", "h1"] {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        if let Some(el) = doc.select(&sel).next() {
            let text = el.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}
