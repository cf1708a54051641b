use std::fmt;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use super::error::{RequestError, RequestResult};

const FALLBACK_SLUG: &str = "shopee_product";
const MAX_SLUG_CHARS: usize = 50;

/// A product-detail address on the marketplace, validated once on the way in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductUrl(Url);

impl ProductUrl {
    pub fn parse(input: &str) -> RequestResult<Self> {
        let url = Url::parse(input.trim())
            .map_err(|err| RequestError::InvalidUrl(format!("{input}: {err}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| RequestError::InvalidUrl(input.to_string()))?
            .to_lowercase();
        if !host.contains("shopee") {
            return Err(RequestError::UnsupportedHost(host));
        }
        if !url.path().contains("/product/") {
            return Err(RequestError::NotProductPage);
        }
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    /// Name-ish fragment used for export file names: the second-to-last path
    /// segment with dashes turned into underscores.
    pub fn product_slug(&self) -> String {
        let segments = self
            .0
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect::<Vec<_>>())
            .unwrap_or_default();
        if segments.len() < 2 {
            return FALLBACK_SLUG.to_string();
        }
        let slug = segments[segments.len() - 2]
            .replace('-', "_")
            .chars()
            .take(MAX_SLUG_CHARS)
            .collect::<String>();
        if slug.is_empty() {
            FALLBACK_SLUG.to_string()
        } else {
            slug
        }
    }

    pub fn export_file_stem(&self, custom: Option<&str>, now: NaiveDateTime) -> String {
        let stamp = now.format("%Y%m%d_%H%M%S");
        match custom.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => format!("{}_{stamp}", sanitize_file_name(name)),
            None => format!("{}_{stamp}", sanitize_file_name(&self.product_slug())),
        }
    }
}

impl fmt::Display for ProductUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductUrl {
    type Err = RequestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for ProductUrl {
    type Error = RequestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProductUrl> for String {
    fn from(value: ProductUrl) -> Self {
        value.0.into()
    }
}

fn sanitize_file_name(name: &str) -> String {
    let pattern = Regex::new(r"[^\w\-]").expect("valid regex");
    pattern.replace_all(name, "_").into_owned()
}
