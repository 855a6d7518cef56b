// ABOUTME: Built-in generic strategies: html-title, html-text and text-plain.
// ABOUTME: Provides builtin_registry() so the engine and CLI work without site-specific scrapers.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::document::Document;
use crate::job::CancelToken;
use crate::result::Extraction;
use crate::strategy::{Strategy, StrategyRegistry};

pub const HTML_TITLE: &str = "html-title";
pub const HTML_TEXT: &str = "html-text";
pub const TEXT_PLAIN: &str = "text-plain";

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Tags whose text never counts as visible content.
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Title from `<title>`, `og:title` or the first `<h1>`.
#[derive(Debug, Default)]
pub struct HtmlTitle;

/// Visible body text plus the title.
#[derive(Debug, Default)]
pub struct HtmlText;

/// The body as UTF-8 text.
#[derive(Debug, Default)]
pub struct PlainText;

impl Strategy for HtmlTitle {
    fn id(&self) -> &str {
        HTML_TITLE
    }

    fn extract(
        &self,
        document: &Document,
        cancel: &CancelToken,
    ) -> anyhow::Result<Option<Extraction>> {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let html = Html::parse_document(&document.text());
        Ok(extract_title(&html).map(|t| Extraction::new(document.url.clone()).with_title(t)))
    }
}

impl Strategy for HtmlText {
    fn id(&self) -> &str {
        HTML_TEXT
    }

    fn extract(
        &self,
        document: &Document,
        cancel: &CancelToken,
    ) -> anyhow::Result<Option<Extraction>> {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let html = Html::parse_document(&document.text());
        let text = visible_text(&html);
        if text.is_empty() {
            return Ok(None);
        }
        let mut extraction = Extraction::new(document.url.clone()).with_text(text);
        extraction.title = extract_title(&html);
        Ok(Some(extraction))
    }
}

impl Strategy for PlainText {
    fn id(&self) -> &str {
        TEXT_PLAIN
    }

    fn extract(
        &self,
        document: &Document,
        _cancel: &CancelToken,
    ) -> anyhow::Result<Option<Extraction>> {
        let text = document.text().trim().to_string();
        if text.is_empty() {
            return Ok(None);
        }
        Ok(Some(Extraction::new(document.url.clone()).with_text(text)))
    }
}

/// Registry with every built-in strategy.
pub fn builtin_registry() -> StrategyRegistry {
    let mut registry = StrategyRegistry::new();
    registry.register(HtmlTitle);
    registry.register(HtmlText);
    registry.register(PlainText);
    registry
}

fn first_text(html: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    let element = html.select(&selector).next()?;
    let text = collapse_whitespace(&element.text().collect::<String>());
    (!text.is_empty()).then_some(text)
}

fn extract_title(html: &Html) -> Option<String> {
    if let Some(title) = first_text(html, "title") {
        return Some(title);
    }
    if let Ok(selector) = Selector::parse("meta[property='og:title']") {
        if let Some(content) = html
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("content"))
        {
            let trimmed = content.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    first_text(html, "h1")
}

fn visible_text(html: &Html) -> String {
    let root = match Selector::parse("body")
        .ok()
        .and_then(|sel| html.select(&sel).next())
    {
        Some(body) => body,
        None => html.root_element(),
    };
    let mut parts = Vec::new();
    collect_text(root, &mut parts);
    collapse_whitespace(&parts.join(" "))
}

fn collect_text<'a>(element: ElementRef<'a>, out: &mut Vec<&'a str>) {
    for child in element.children() {
        if let Some(el) = ElementRef::wrap(child) {
            if !INVISIBLE_TAGS.contains(&el.value().name()) {
                collect_text(el, out);
            }
        } else if let Some(text) = child.value().as_text() {
            out.push(text);
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    WHITESPACE_RE.replace_all(s, " ").trim().to_string()
}
