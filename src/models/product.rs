use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Store, generate_id};

/// A registered, trackable product page.
///
/// Immutable after registration except for the display name (which may be
/// replaced by the page title once a fetch succeeds) and deletion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub url: String,
    pub store: Store,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub url: String,
    /// Optional display name; defaults to the URL until a page title is seen.
    pub name: Option<String>,
    /// Optional store override; detected from the URL host when absent.
    pub store: Option<Store>,
}

impl Product {
    pub fn new(new_product: NewProduct) -> Self {
        let store = new_product
            .store
            .unwrap_or_else(|| Store::detect(&new_product.url));
        Self {
            id: generate_id(),
            name: new_product.name.unwrap_or_else(|| new_product.url.clone()),
            url: new_product.url,
            store,
            created_at: Utc::now(),
        }
    }

    /// Whether the display name is still the registration placeholder and
    /// should be replaced by a page title when one is extracted.
    pub fn name_is_placeholder(&self) -> bool {
        self.name.is_empty() || self.name.starts_with("http")
    }
}
