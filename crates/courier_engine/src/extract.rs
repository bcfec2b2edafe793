//! Full-article extraction from the pages feed items link to.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use engine_logging::{engine_debug, engine_warn};
use reqwest::header::CONTENT_TYPE;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::decode::decode_html;
use crate::sanitize::sanitize_with_base;
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    /// Sanitized, self-contained fragment ready for publishing.
    pub html: String,
    /// Timestamp the page itself declares, preferred over the feed's.
    pub published: Option<DateTime<Utc>>,
}

/// Seam for the sync engine; tests substitute canned content.
pub trait Extractor {
    fn extract(&self, link: &str, source_hint: &str) -> Option<ExtractedContent>;
}

/// Minimum visible text before a selector match is trusted. Shorter
/// fragments are accepted only when they carry an image.
const MIN_TEXT_CHARS: usize = 200;

struct SelectorRule {
    /// Substring of the source hint or page URL this rule is scoped to;
    /// `None` applies everywhere.
    site: Option<&'static str>,
    selector: &'static str,
}

impl SelectorRule {
    fn applies(&self, url: &str, source_hint: &str) -> bool {
        match self.site {
            None => true,
            Some(site) => url.contains(site) || source_hint.to_ascii_lowercase().contains(site),
        }
    }
}

/// Ordered cascade, most specific first. Site-family rules must win over the
/// generic containers because `article`/`main` regularly match navigation
/// chrome on unknown sites.
const SELECTOR_CASCADE: &[SelectorRule] = &[
    SelectorRule { site: Some("mp.weixin.qq.com"), selector: "#js_content" },
    SelectorRule { site: Some("mp.weixin.qq.com"), selector: "div.rich_media_content" },
    SelectorRule { site: Some("zhihu.com"), selector: "div.Post-RichTextContainer" },
    SelectorRule { site: Some("zhihu.com"), selector: "div.RichText" },
    SelectorRule { site: Some("sspai.com"), selector: "div.article-body" },
    SelectorRule { site: Some("36kr.com"), selector: "div.articleDetailContent" },
    SelectorRule { site: None, selector: "div.post-content" },
    SelectorRule { site: None, selector: "div.entry-content" },
    SelectorRule { site: None, selector: "div.article-content" },
    SelectorRule { site: None, selector: "article" },
    SelectorRule { site: None, selector: "main" },
    SelectorRule { site: None, selector: "div#content" },
];

/// Fetches linked pages and distills them into publishable fragments.
pub struct ContentExtractor<'a> {
    transport: &'a Transport,
}

impl<'a> ContentExtractor<'a> {
    pub fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }
}

impl Extractor for ContentExtractor<'_> {
    fn extract(&self, link: &str, source_hint: &str) -> Option<ExtractedContent> {
        if !is_fetchable(link) {
            return None;
        }
        let response = self.transport.get(link)?;
        let status = response.status();
        if !status.is_success() {
            engine_debug!("page fetch for {link} returned {status}");
            return None;
        }
        // Relative references resolve against where the redirects landed,
        // not the link the feed advertised.
        let effective_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = match response.bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                engine_warn!("reading page body for {link} failed: {err}");
                return None;
            }
        };

        let decoded = decode_html(&bytes, content_type.as_deref());
        let document = Html::parse_document(&decoded.html);
        let published = published_time_in(&document);
        let fragment = article_fragment_in(&document, effective_url.as_str(), source_hint)?;
        let html = sanitize_with_base(&fragment, Some(&effective_url));
        Some(ExtractedContent { html, published })
    }
}

/// Run the selector cascade over a page. Pure; exposed so the rule ordering
/// is testable without a server.
pub fn select_article_fragment(html: &str, url: &str, source_hint: &str) -> Option<String> {
    let document = Html::parse_document(html);
    article_fragment_in(&document, url, source_hint)
}

/// Best-effort read of the timestamp a page declares for itself.
pub fn page_published_time(html: &str) -> Option<DateTime<Utc>> {
    let document = Html::parse_document(html);
    published_time_in(&document)
}

fn article_fragment_in(document: &Html, url: &str, source_hint: &str) -> Option<String> {
    let img = Selector::parse("img").ok()?;
    for rule in SELECTOR_CASCADE {
        if !rule.applies(url, source_hint) {
            continue;
        }
        let Ok(selector) = Selector::parse(rule.selector) else {
            continue;
        };
        for candidate in document.select(&selector) {
            if visible_text_chars(candidate) >= MIN_TEXT_CHARS
                || candidate.select(&img).next().is_some()
            {
                return Some(candidate.inner_html());
            }
        }
    }
    None
}

fn published_time_in(document: &Html) -> Option<DateTime<Utc>> {
    let metas = Selector::parse(
        "meta[property=\"article:published_time\"], \
         meta[name=\"article:published_time\"], \
         meta[itemprop=\"datePublished\"]",
    )
    .ok()?;
    for element in document.select(&metas) {
        if let Some(parsed) = element.value().attr("content").and_then(parse_page_timestamp) {
            return Some(parsed);
        }
    }
    let times = Selector::parse("time[datetime]").ok()?;
    for element in document.select(&times) {
        if let Some(parsed) = element.value().attr("datetime").and_then(parse_page_timestamp) {
            return Some(parsed);
        }
    }
    None
}

fn parse_page_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

fn visible_text_chars(element: ElementRef<'_>) -> usize {
    element
        .text()
        .map(|chunk| chunk.chars().filter(|c| !c.is_whitespace()).count())
        .sum()
}

fn is_fetchable(link: &str) -> bool {
    Url::parse(link)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}
