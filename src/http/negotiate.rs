//! Content negotiation against the `Accept` header.
//!
//! # Design Decisions
//! - Offers are checked in a fixed order; the highest q-value wins
//! - At equal q an exact media match beats `type/*`, which beats `*/*`
//! - No usable preference falls back to the configured default format

use std::fmt;
use std::str::FromStr;

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Output format selected for a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Text,
    Html,
    Json,
    Yaml,
}

impl Format {
    pub fn content_type(self) -> &'static str {
        match self {
            Format::Text => "text/plain; charset=utf-8",
            Format::Html => "text/html; charset=utf-8",
            Format::Json => "application/json",
            Format::Yaml => "application/yaml",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Format::Text => "text",
            Format::Html => "html",
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown output format `{0}` (expected text, html, json or yaml)")]
pub struct UnknownFormat(pub String);

impl FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(Format::Text),
            "html" => Ok(Format::Html),
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// Media types the server can produce, in preference order.
pub const OFFERS: &[(&str, Format)] = &[
    ("text/plain", Format::Text),
    ("text/html", Format::Html),
    ("application/json", Format::Json),
    ("application/yaml", Format::Yaml),
    ("application/x-yaml", Format::Yaml),
    ("text/yaml", Format::Yaml),
    ("text/x-yaml", Format::Yaml),
];

#[derive(Debug, PartialEq)]
struct AcceptSpec {
    media: String,
    q: f32,
}

fn parse_accept(value: &str) -> Vec<AcceptSpec> {
    value
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.split(';');
            let media = pieces.next()?.trim().to_ascii_lowercase();
            if media.is_empty() {
                return None;
            }
            let mut q = 1.0;
            for param in pieces {
                if let Some((key, val)) = param.split_once('=') {
                    if key.trim().eq_ignore_ascii_case("q") {
                        q = val.trim().parse().ok()?;
                    }
                }
            }
            Some(AcceptSpec { media, q })
        })
        .collect()
}

/// Pick the response format for `headers`.
pub fn negotiate(headers: &HeaderMap, default: Format) -> Format {
    let accept: Vec<&str> = headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    negotiate_accept(&accept.join(","), default)
}

/// Pick the response format for a raw `Accept` value.
pub fn negotiate_accept(accept: &str, default: Format) -> Format {
    let specs = parse_accept(accept);

    // Specificity: 0 exact, 1 type wildcard, 2 full wildcard, 3 nothing yet.
    let mut best = default;
    let mut best_q = -1.0f32;
    let mut best_wild = 3u8;

    for &(offer, format) in OFFERS {
        for spec in &specs {
            if spec.q <= 0.0 || spec.q < best_q {
                continue;
            }
            let wild = if spec.media == "*/*" {
                2
            } else if let Some(prefix) = spec.media.strip_suffix('*') {
                if !offer.starts_with(prefix) {
                    continue;
                }
                1
            } else if spec.media == offer {
                0
            } else {
                continue;
            };

            if spec.q > best_q || wild < best_wild {
                best = format;
                best_q = spec.q;
                best_wild = wild;
            }
        }
    }

    // A bare catch-all states no preference; the configured default decides.
    if best_wild == 2 {
        return default;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_matches() {
        assert_eq!(negotiate_accept("application/json", Format::Text), Format::Json);
        assert_eq!(negotiate_accept("text/html", Format::Text), Format::Html);
        assert_eq!(negotiate_accept("text/plain", Format::Json), Format::Text);
    }

    #[test]
    fn yaml_aliases_share_renderer() {
        for accept in ["application/yaml", "application/x-yaml", "text/yaml", "text/x-yaml"] {
            assert_eq!(negotiate_accept(accept, Format::Text), Format::Yaml, "{accept}");
        }
    }

    #[test]
    fn falls_back_to_default() {
        assert_eq!(negotiate_accept("", Format::Html), Format::Html);
        assert_eq!(negotiate_accept("image/png", Format::Json), Format::Json);
        assert_eq!(negotiate_accept("application/json;q=0", Format::Text), Format::Text);
    }

    #[test]
    fn q_values_rank_offers() {
        assert_eq!(
            negotiate_accept("text/plain;q=0.5, application/json;q=0.9", Format::Text),
            Format::Json
        );
        assert_eq!(
            negotiate_accept("application/json;q=0.2, text/yaml", Format::Text),
            Format::Yaml
        );
    }

    #[test]
    fn wildcards() {
        assert_eq!(negotiate_accept("*/*", Format::Json), Format::Json);
        assert_eq!(negotiate_accept("*/*", Format::Text), Format::Text);
        assert_eq!(negotiate_accept("*/*;q=0.8", Format::Yaml), Format::Yaml);
        assert_eq!(negotiate_accept("application/*", Format::Text), Format::Json);
        // Browsers: html listed explicitly beats the catch-all.
        assert_eq!(
            negotiate_accept("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8", Format::Text),
            Format::Html
        );
        assert_eq!(negotiate_accept("*/*, application/json", Format::Text), Format::Json);
    }

    #[test]
    fn malformed_q_skips_entry() {
        assert_eq!(negotiate_accept("application/json;q=abc", Format::Html), Format::Html);
    }

    #[test]
    fn joins_repeated_accept_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::ACCEPT, "image/png".parse().unwrap());
        headers.append(header::ACCEPT, "application/yaml".parse().unwrap());
        assert_eq!(negotiate(&headers, Format::Text), Format::Yaml);
    }

    #[test]
    fn format_names() {
        assert_eq!("JSON".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("yml".parse::<Format>().unwrap(), Format::Yaml);
        assert!("xml".parse::<Format>().is_err());
        assert_eq!(Format::Html.to_string(), "html");
    }
}
