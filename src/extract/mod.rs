//! Per-store price extraction. Pure: (store, page content) in, price or
//! typed parse failure out; no network, no storage.

use rust_decimal::Decimal;
use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::models::{Availability, Store};

pub mod markup;

mod amazon;
mod morele;
mod xkom;

/// A successfully extracted price, plus the page title when one was found
/// (used to auto-name products registered by bare URL).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedPrice {
    pub amount: Decimal,
    pub currency: Option<String>,
    pub availability: Availability,
    pub title: Option<String>,
}

/// Extraction failed: the content held no recognizable price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub detail: String,
    /// Title still travels with the failure so a fetched-but-unparsable page
    /// can name its product.
    pub title: Option<String>,
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.detail)
    }
}

/// One extractor per supported store. Adding a store means adding a variant
/// here and one rules module; nothing else changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceExtractor {
    XKom,
    Morele,
    Amazon,
}

impl PriceExtractor {
    pub fn for_store(store: Store) -> Option<Self> {
        match store {
            Store::XKom => Some(PriceExtractor::XKom),
            Store::Morele => Some(PriceExtractor::Morele),
            Store::Amazon => Some(PriceExtractor::Amazon),
            Store::Unknown => None,
        }
    }

    pub fn extract(&self, html: &str) -> Result<ExtractedPrice, ParseFailure> {
        let doc = Html::parse_document(html);
        let title = markup::page_title(&doc);

        let candidate = match self {
            PriceExtractor::XKom => xkom::extract(&doc),
            PriceExtractor::Morele => morele::extract(&doc),
            PriceExtractor::Amazon => amazon::extract(&doc),
        };

        match candidate {
            Some(found) => Ok(ExtractedPrice {
                amount: found.amount,
                currency: found.currency,
                availability: found.availability,
                title,
            }),
            None => Err(ParseFailure {
                detail: "price not found".to_string(),
                title,
            }),
        }
    }
}

/// Extract a price from page content for the given store.
///
/// An unknown store is a parse failure, not a panic: the product stays
/// registered and the failure shows up in its history.
pub fn extract_price(store: Store, html: &str) -> Result<ExtractedPrice, ParseFailure> {
    match PriceExtractor::for_store(store) {
        Some(extractor) => extractor.extract(html),
        None => {
            let doc = Html::parse_document(html);
            Err(ParseFailure {
                detail: "unsupported store".to_string(),
                title: markup::page_title(&doc),
            })
        }
    }
}
