//! HTTP client construction, per-store request headers, and cookie-value
//! normalization for the direct and cookie-augmented strategies.

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use serde_json::Value;

use crate::config::FetcherConfig;
use crate::error::Result;
use crate::models::Store;

pub fn build_client(config: &FetcherConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()?;
    Ok(client)
}

/// Browser-like headers. Some sites block aggressively regardless; those
/// failures are recorded, not defeated.
pub fn headers_for_store(store: Store, user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Ok(ua) = HeaderValue::from_str(user_agent) {
        headers.insert(header::USER_AGENT, ua);
    }
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("pl-PL,pl;q=0.9,en-US;q=0.7,en;q=0.6"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
    headers.insert("sec-fetch-user", HeaderValue::from_static("?1"));
    headers.insert(
        "sec-ch-ua",
        HeaderValue::from_static(r#""Chromium";v="126", "Not=A?Brand";v="99""#),
    );
    headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
    headers.insert("sec-ch-ua-platform", HeaderValue::from_static(r#""Linux""#));

    match store {
        Store::XKom => {
            headers.insert(header::REFERER, HeaderValue::from_static("https://www.x-kom.pl/"));
            headers.insert("sec-fetch-site", HeaderValue::from_static("same-origin"));
        }
        Store::Morele => {
            headers.insert(
                header::REFERER,
                HeaderValue::from_static("https://www.morele.net/"),
            );
            headers.insert("sec-fetch-site", HeaderValue::from_static("same-origin"));
        }
        Store::Amazon | Store::Unknown => {
            headers.insert("sec-fetch-site", HeaderValue::from_static("none"));
        }
    }

    headers
}

/// Normalize a configured cookie value into a `Cookie:` header value.
///
/// Accepts a raw `k=v; k2=v2` string, a `Cookie:`-prefixed paste, or a JSON
/// object exported from browser DevTools (optionally under a
/// `"Request Cookies"` key).
pub fn normalize_cookie(raw: &str) -> String {
    let s = raw.trim();

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(s) {
        let pairs = match map.get("Request Cookies") {
            Some(Value::Object(inner)) => Some(inner),
            _ if map.values().all(|v| v.is_string()) => Some(&map),
            _ => None,
        };
        if let Some(pairs) = pairs {
            return pairs
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| format!("{k}={v}")))
                .collect::<Vec<_>>()
                .join("; ");
        }
    }

    let s = s
        .strip_prefix("cookie:")
        .or_else(|| s.strip_prefix("Cookie:"))
        .unwrap_or(s)
        .trim();

    s.replace('\r', " ").replace('\n', "; ")
}

/// Heuristic for block/challenge pages served with a 2xx status.
pub fn looks_like_block(body: &str) -> bool {
    let lower = body.to_lowercase();
    ["captcha", "robot check", "access denied", "forbidden", "cloudflare"]
        .iter()
        .any(|token| lower.contains(token))
}
