//! Web page fetching and visible-text extraction
//!
//! Pages are downloaded with reqwest and parsed with scraper. Only text a
//! reader would see is kept: script, style and head content is skipped.
//! Whitespace is collapsed inside runs of inline text and block-level
//! elements are separated by blank lines, so headings, paragraphs and list
//! items never run together into one sentence. The result is truncated to a
//! character budget.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use scraper::{ElementRef, Html, Node};
use tracing::debug;

use ise_core::{ExtractionConfig, IseError, PageFetcher, Result};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Elements whose text never reaches the reader
const HIDDEN_ELEMENTS: &[&str] = &["head", "script", "style", "noscript", "template", "title"];

/// Elements that start and end a block of text
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main",
    "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Page fetcher over plain HTTP
pub struct HttpPageFetcher {
    client: Client,
    max_chars: usize,
}

impl HttpPageFetcher {
    pub fn new(timeout_secs: u64, max_chars: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| IseError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, max_chars })
    }

    /// Create from config
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        Self::new(config.fetch_timeout_secs, config.max_page_chars)
    }
}

/// Accumulates text blocks while walking the document
#[derive(Default)]
struct TextBlocks {
    blocks: Vec<String>,
    current: String,
    pending_space: bool,
}

impl TextBlocks {
    fn push_text(&mut self, text: &str) {
        if text.starts_with(char::is_whitespace) {
            self.pending_space = true;
        }
        for word in text.split_whitespace() {
            if self.pending_space && !self.current.is_empty() {
                self.current.push(' ');
            }
            self.current.push_str(word);
            self.pending_space = true;
        }
        self.pending_space = text.ends_with(char::is_whitespace) || text.trim().is_empty();
    }

    fn end_block(&mut self) {
        if !self.current.is_empty() {
            self.blocks.push(std::mem::take(&mut self.current));
        }
        self.pending_space = false;
    }

    fn walk(&mut self, element: ElementRef<'_>) {
        let name = element.value().name();
        if HIDDEN_ELEMENTS.contains(&name) {
            return;
        }
        let block = BLOCK_ELEMENTS.contains(&name);
        if block {
            self.end_block();
        }
        for child in element.children() {
            if let Some(child) = ElementRef::wrap(child) {
                self.walk(child);
            } else if let Node::Text(text) = child.value() {
                self.push_text(text);
            }
        }
        if block {
            self.end_block();
        }
    }

    fn finish(mut self) -> String {
        self.end_block();
        self.blocks.join("\n\n")
    }
}

/// Extract the visible text of an HTML document.
///
/// Blocks are joined with blank lines and the result holds at most
/// `max_chars` characters.
pub fn visible_text(html: &str, max_chars: usize) -> String {
    let document = Html::parse_document(html);

    let mut blocks = TextBlocks::default();
    blocks.walk(document.root_element());
    blocks.finish().chars().take(max_chars).collect()
}

fn is_textual(content_type: Option<&str>) -> bool {
    match content_type {
        Some(ct) => {
            let ct = ct.to_ascii_lowercase();
            ct.starts_with("text/") || ct.contains("html") || ct.contains("xml")
        }
        None => true,
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_text(&self, url: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IseError::FetchError(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IseError::FetchError(format!("HTTP {status} for {url}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if !is_textual(content_type.as_deref()) {
            debug!(url, content_type = ?content_type, "Skipping non-text content");
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| IseError::FetchError(format!("Failed to read body of {url}: {e}")))?;

        let text = visible_text(&body, self.max_chars);
        debug!(url, chars = text.chars().count(), "Page text extracted");

        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }
}
