//! morele.net rule set. The product header exposes the current price in a
//! `data-price` attribute; JSON-LD is present on most, not all, pages.

use scraper::{Html, Selector};

use super::markup::{self, PriceCandidate};
use crate::models::Availability;

pub(crate) fn extract(doc: &Html) -> Option<PriceCandidate> {
    if let Some(offer) = markup::jsonld_offer(doc) {
        return Some(offer);
    }

    if let Some(candidate) = data_price_attr(doc) {
        return Some(candidate);
    }

    markup::text_price(doc)
}

fn data_price_attr(doc: &Html) -> Option<PriceCandidate> {
    let selector = Selector::parse("div.product-price[data-price], [data-price]").ok()?;
    let raw = doc
        .select(&selector)
        .find_map(|el| el.value().attr("data-price"))?;
    let amount = markup::decimal_from_text(raw)?;

    Some(PriceCandidate {
        amount,
        // morele trades in PLN only.
        currency: Some("PLN".to_string()),
        availability: Availability::Unknown,
    })
}
