//! Amazon rule set. The buy box renders the price into an offscreen span;
//! availability comes from the dedicated block below it. JSON-LD appears on
//! some marketplaces only.

use scraper::{Html, Selector};

use super::markup::{self, PriceCandidate};
use crate::models::Availability;

pub(crate) fn extract(doc: &Html) -> Option<PriceCandidate> {
    let availability = availability_block(doc);

    if let Some(mut offer) = markup::jsonld_offer(doc) {
        if offer.availability == Availability::Unknown {
            offer.availability = availability;
        }
        return Some(offer);
    }

    if let Some((amount, currency)) = offscreen_price(doc) {
        return Some(PriceCandidate {
            amount,
            currency,
            availability,
        });
    }

    markup::text_price(doc).map(|mut candidate| {
        candidate.availability = availability;
        candidate
    })
}

fn offscreen_price(doc: &Html) -> Option<(rust_decimal::Decimal, Option<String>)> {
    let selector = Selector::parse("span.a-price span.a-offscreen").ok()?;
    doc.select(&selector)
        .map(|el| el.text().collect::<String>())
        .find_map(|text| markup::price_from_fragment(&text))
}

fn availability_block(doc: &Html) -> Availability {
    let Ok(selector) = Selector::parse("#availability span, #availability") else {
        return Availability::Unknown;
    };
    let Some(el) = doc.select(&selector).next() else {
        return Availability::Unknown;
    };

    let text = el.text().collect::<String>().to_lowercase();
    if text.contains("unavailable") || text.contains("niedostępny") {
        Availability::OutOfStock
    } else if text.contains("in stock") || text.contains("dostępny") {
        Availability::InStock
    } else {
        Availability::Unknown
    }
}
