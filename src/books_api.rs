use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use url::Url;

use crate::formats;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/books/v1/volumes";
pub const BASE_URL_ENV: &str = "READINGLIST_BOOKS_API_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Volumes {
    #[serde(default)]
    pub items: Vec<Volume>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    #[serde(default)]
    pub volume_info: VolumeInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    #[serde(default)]
    pub image_links: ImageLinks,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLinks {
    pub thumbnail: Option<String>,
    pub small_thumbnail: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
    pub extra_large: Option<String>,
}

impl ImageLinks {
    /// The first usable link in preference order, already normalized.
    pub fn preferred_url(&self) -> Option<String> {
        [
            &self.thumbnail,
            &self.small_thumbnail,
            &self.medium,
            &self.large,
            &self.extra_large,
        ]
        .into_iter()
        .flatten()
        .find_map(|raw| usable_image_url(raw))
    }
}

/// Image of the first result item that has one; later items are not consulted.
pub fn first_image_url(volumes: &Volumes) -> Option<String> {
    volumes
        .items
        .iter()
        .find_map(|item| item.volume_info.image_links.preferred_url())
}

/// Upgrades `http:` to `https:` and removes `&zoom=<digits>` parameters.
///
/// Scheme matching ignores case; the result always uses lowercase `https:`.
#[must_use]
pub fn normalize_image_url(raw: &str) -> String {
    let raw = raw.trim();
    let upgraded = match strip_scheme(raw, "http:").or_else(|| strip_scheme(raw, "https:")) {
        Some(rest) => format!("https:{rest}"),
        None => raw.to_owned(),
    };
    strip_zoom(&upgraded)
}

fn strip_scheme<'a>(url: &'a str, scheme: &str) -> Option<&'a str> {
    let head = url.get(..scheme.len())?;
    head.eq_ignore_ascii_case(scheme).then(|| &url[scheme.len()..])
}

fn strip_zoom(url: &str) -> String {
    const ZOOM: &str = "&zoom=";

    let mut out = String::with_capacity(url.len());
    let mut rest = url;
    while let Some(idx) = rest.find(ZOOM) {
        let after = &rest[idx + ZOOM.len()..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            out.push_str(&rest[..idx + ZOOM.len()]);
        } else {
            out.push_str(&rest[..idx]);
        }
        rest = &after[digits..];
    }
    out.push_str(rest);
    out
}

fn usable_image_url(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }
    let normalized = normalize_image_url(raw);
    formats::is_http_url(&normalized).then_some(normalized)
}

/// Outcome of one search call. Every failure mode is a value, never an error.
#[derive(Debug, Clone)]
pub enum SearchReply {
    Volumes(Volumes),
    /// The service answered 429 Too Many Requests.
    RateLimited,
    /// Network error, non-2xx status, or an undecodable body.
    Unavailable,
}

#[async_trait]
pub trait VolumeSearch: Send + Sync {
    async fn search(&self, query: &str) -> SearchReply;
}

/// Google Books volumes search over HTTP.
#[derive(Debug, Clone)]
pub struct GoogleBooks {
    client: reqwest::Client,
    base_url: Url,
    max_results: u32,
}

impl GoogleBooks {
    pub fn new(base_url: &str, max_results: u32) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url).context("parse books api base url")?;
        if base_url.scheme() != "http" && base_url.scheme() != "https" {
            anyhow::bail!("books api base url must be http/https: {base_url}");
        }

        let client = reqwest::Client::builder()
            .build()
            .context("build books api http client")?;

        Ok(Self {
            client,
            base_url,
            max_results: max_results.max(1),
        })
    }

    /// `--api-base-url`, then `$READINGLIST_BOOKS_API_URL`, then Google Books.
    pub fn base_url_from(flag: Option<&str>) -> String {
        if let Some(flag) = flag {
            return flag.to_owned();
        }
        match std::env::var(BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => url.trim().to_owned(),
            _ => DEFAULT_BASE_URL.to_owned(),
        }
    }
}

#[async_trait]
impl VolumeSearch for GoogleBooks {
    async fn search(&self, query: &str) -> SearchReply {
        let max_results = self.max_results.to_string();
        let response = match self
            .client
            .get(self.base_url.clone())
            .query(&[("q", query), ("maxResults", max_results.as_str())])
            .header(USER_AGENT, concat!("readinglist/", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(query, ?err, "volume search request failed");
                return SearchReply::Unavailable;
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return SearchReply::RateLimited;
        }
        if !status.is_success() {
            tracing::warn!(query, %status, "volume search returned error status");
            return SearchReply::Unavailable;
        }

        match response.json::<Volumes>().await {
            Ok(volumes) => SearchReply::Volumes(volumes),
            Err(err) => {
                tracing::warn!(query, ?err, "decode volume search response");
                SearchReply::Unavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(thumbnail: Option<&str>, large: Option<&str>) -> ImageLinks {
        ImageLinks {
            thumbnail: thumbnail.map(str::to_owned),
            large: large.map(str::to_owned),
            ..ImageLinks::default()
        }
    }

    fn volume(image_links: ImageLinks) -> Volume {
        Volume {
            volume_info: VolumeInfo { image_links },
        }
    }

    #[test]
    fn normalize_image_url_upgrades_scheme_and_strips_zoom() {
        let cases = [
            ("http://x/y.jpg&zoom=5", "https://x/y.jpg"),
            ("http://x/y.jpg", "https://x/y.jpg"),
            ("https://x/y.jpg", "https://x/y.jpg"),
            ("HTTP://x/y.jpg", "https://x/y.jpg"),
            ("Http://x/y.jpg&zoom=2", "https://x/y.jpg"),
            ("HTTPS://x/y.jpg", "https://x/y.jpg"),
            ("//x/y.jpg", "//x/y.jpg"),
            (
                "http://books.google.com/books/content?id=abc&printsec=frontcover&img=1&zoom=1&source=gbs_api",
                "https://books.google.com/books/content?id=abc&printsec=frontcover&img=1&source=gbs_api",
            ),
            ("https://x/y?a=1&zoom=&b=2", "https://x/y?a=1&zoom=&b=2"),
            ("https://x/y?a=1&zoom=12&zoom=3", "https://x/y?a=1"),
        ];

        for (input, expected) in cases {
            assert_eq!(normalize_image_url(input), expected, "input={input}");
        }
    }

    #[test]
    fn preferred_url_follows_size_order() {
        let both = links(Some("http://x/thumb.jpg"), Some("http://x/large.jpg"));
        assert_eq!(both.preferred_url().as_deref(), Some("https://x/thumb.jpg"));

        let large_only = links(None, Some("http://x/large.jpg&zoom=0"));
        assert_eq!(
            large_only.preferred_url().as_deref(),
            Some("https://x/large.jpg")
        );

        let blank_thumb = ImageLinks {
            thumbnail: Some("  ".to_owned()),
            small_thumbnail: Some("http://x/small.jpg".to_owned()),
            ..ImageLinks::default()
        };
        assert_eq!(
            blank_thumb.preferred_url().as_deref(),
            Some("https://x/small.jpg")
        );

        assert_eq!(ImageLinks::default().preferred_url(), None);
    }

    #[test]
    fn first_image_url_stops_at_first_item_with_an_image() {
        let volumes = Volumes {
            items: vec![
                volume(ImageLinks::default()),
                volume(links(None, Some("http://x/second.jpg"))),
                volume(links(Some("http://x/third.jpg"), None)),
            ],
        };

        assert_eq!(
            first_image_url(&volumes).as_deref(),
            Some("https://x/second.jpg")
        );
    }

    #[test]
    fn volumes_decode_tolerates_missing_sections() -> anyhow::Result<()> {
        let empty: Volumes = serde_json::from_str(r#"{"kind":"books#volumes","totalItems":0}"#)?;
        assert!(empty.items.is_empty());

        let raw = r#"{
            "items": [
                {"id": "a", "volumeInfo": {"title": "No Cover"}},
                {"id": "b", "volumeInfo": {"imageLinks": {"smallThumbnail": "http://x/s.jpg&zoom=5"}}}
            ]
        }"#;
        let volumes: Volumes = serde_json::from_str(raw)?;
        assert_eq!(
            first_image_url(&volumes).as_deref(),
            Some("https://x/s.jpg")
        );

        Ok(())
    }

    #[test]
    fn google_books_rejects_non_http_base_url() {
        assert!(GoogleBooks::new("ftp://example.com/volumes", 5).is_err());
        assert!(GoogleBooks::new("not a url", 5).is_err());
        assert!(GoogleBooks::new(DEFAULT_BASE_URL, 5).is_ok());
    }

    #[test]
    fn base_url_from_prefers_flag() {
        assert_eq!(
            GoogleBooks::base_url_from(Some("http://127.0.0.1:9/volumes")),
            "http://127.0.0.1:9/volumes"
        );
    }
}
