//! Page fetching and content extraction
//!
//! [`HttpScraper`] fetches a url with reqwest, rejects non-HTML responses and
//! extracts readable text with the `scraper` crate. Extraction prefers a short
//! ordered list of semantic containers and falls back to the whole body.
//! Script, style and noscript text is never included.

use crate::utils::text::{normalize_whitespace, truncate_chars, word_count};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;

/// Ordered content containers, most specific first.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    "#content",
    ".content",
    ".post",
];

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];

const USER_AGENT: &str = concat!("research-loop/", env!("CARGO_PKG_VERSION"));

/// Extracted page content.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedContent {
    pub url: String,
    pub title: String,
    pub text: String,
    pub word_count: usize,
}

/// Structured fetch failures. The gathering stage treats every kind the same.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScrapeError {
    #[error("HTTP status {status}")]
    Http { status: u16 },

    #[error("non-HTML content type '{content_type}'")]
    NotHtml { content_type: String },

    #[error("timed out")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait ScrapeService: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<ScrapedContent, ScrapeError>;
}

/// reqwest + scraper backed page fetcher
pub struct HttpScraper {
    client: reqwest::Client,
    max_chars: usize,
    selectors: Vec<Selector>,
    body_selector: Option<Selector>,
    title_selector: Option<Selector>,
}

impl HttpScraper {
    pub fn new(timeout: Duration, max_chars: usize) -> crate::types::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| crate::types::AppError::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_chars,
            selectors: CONTENT_SELECTORS
                .iter()
                .filter_map(|s| Selector::parse(s).ok())
                .collect(),
            body_selector: Selector::parse("body").ok(),
            title_selector: Selector::parse("title").ok(),
        })
    }

    /// Extract `(title, normalized text)` from an HTML document.
    pub fn extract(&self, html: &str) -> (String, String) {
        let document = Html::parse_document(html);

        let title = self
            .title_selector
            .as_ref()
            .and_then(|sel| document.select(sel).next())
            .map(|t| normalize_whitespace(&t.text().collect::<String>()))
            .unwrap_or_default();

        let preferred = self.selectors.iter().find_map(|sel| {
            document
                .select(sel)
                .map(visible_text)
                .find(|text| !text.is_empty())
        });

        let text = preferred
            .or_else(|| {
                self.body_selector
                    .as_ref()
                    .and_then(|sel| document.select(sel).next())
                    .map(visible_text)
            })
            .unwrap_or_else(|| visible_text(document.root_element()));

        (title, truncate_chars(&text, self.max_chars))
    }
}

fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|e| SKIPPED_TAGS.contains(&e.name()))
        });
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    normalize_whitespace(&out)
}

fn is_html(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.contains("text/html") || lower.contains("application/xhtml")
}

#[async_trait]
impl ScrapeService for HttpScraper {
    async fn fetch(&self, url: &str) -> std::result::Result<ScrapedContent, ScrapeError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ScrapeError::Timeout
            } else {
                ScrapeError::Other(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Http {
                status: status.as_u16(),
            });
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !is_html(content_type) {
                return Err(ScrapeError::NotHtml {
                    content_type: content_type.to_string(),
                });
            }
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ScrapeError::Timeout
            } else {
                ScrapeError::Other(e.to_string())
            }
        })?;

        let (title, text) = self.extract(&body);
        let title = if title.is_empty() { url.to_string() } else { title };

        Ok(ScrapedContent {
            url: url.to_string(),
            title,
            word_count: word_count(&text),
            text,
        })
    }
}
