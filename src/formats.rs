use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One entry of the reading list, as consumed by the website's book table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Book {
    pub title: String,
    pub author: String,
    pub first_published: i32,
    pub category: String,
    pub isbn13: String,
    pub description: String,
    pub page_count: u32,
    pub publisher: String,
    /// Cover image URL; empty until resolved.
    pub thumbnail: String,
    pub buy_link: String,
    /// Columns this crate has no canonical field for.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Book {
    pub fn has_thumbnail(&self) -> bool {
        !self.thumbnail.trim().is_empty()
    }
}

/// True when `value` parses as an absolute `http` or `https` URL.
pub fn is_http_url(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.has_host(),
        Err(_) => false,
    }
}
