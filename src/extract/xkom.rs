//! x-kom.pl rule set. Product pages carry a schema.org Product block; the
//! OpenGraph price tags survive on variants that strip JSON-LD.

use scraper::Html;

use super::markup::{self, PriceCandidate};

pub(crate) fn extract(doc: &Html) -> Option<PriceCandidate> {
    if let Some(offer) = markup::jsonld_offer(doc) {
        return Some(offer);
    }

    if let Some(mut offer) = markup::meta_price(doc) {
        // x-kom trades in PLN; the currency meta tag is frequently absent.
        offer.currency.get_or_insert_with(|| "PLN".to_string());
        return Some(offer);
    }

    markup::text_price(doc)
}
