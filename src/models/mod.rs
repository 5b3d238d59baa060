use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod outcome;
pub mod product;

// Re-exports for convenience
pub use outcome::*;
pub use product::*;

/// Supported e-commerce sites. One extractor rule set exists per variant;
/// `Unknown` is kept for registered URLs that match no rule set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
pub enum Store {
    #[serde(rename = "x-kom")]
    #[sqlx(rename = "x-kom")]
    XKom,
    #[serde(rename = "morele")]
    #[sqlx(rename = "morele")]
    Morele,
    #[serde(rename = "amazon")]
    #[sqlx(rename = "amazon")]
    Amazon,
    #[serde(rename = "unknown")]
    #[sqlx(rename = "unknown")]
    Unknown,
}

impl Store {
    /// Detect the store from a product page URL host.
    pub fn detect(url: &str) -> Store {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
            .unwrap_or_default();

        if host == "x-kom.pl" || host.ends_with(".x-kom.pl") {
            Store::XKom
        } else if host == "morele.net" || host.ends_with(".morele.net") {
            Store::Morele
        } else if host.contains("amazon.") {
            Store::Amazon
        } else {
            Store::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Store::XKom => "x-kom",
            Store::Morele => "morele",
            Store::Amazon => "amazon",
            Store::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Store {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x-kom" | "xkom" | "x-kom.pl" | "xkom.pl" => Ok(Store::XKom),
            "morele" | "morele.net" => Ok(Store::Morele),
            s if s.starts_with("amazon") => Ok(Store::Amazon),
            "unknown" => Ok(Store::Unknown),
            other => Err(format!("unknown store: {other}")),
        }
    }
}

/// Generate a product identifier in the format stored in the database.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
