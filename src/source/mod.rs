//! Page-like sources the extractor can query.
//!
//! A source only has to locate elements by CSS selector and read text or
//! attributes from them. Acquiring the page (HTTP fetch, browser session,
//! scrolling) happens before extraction and lives in the collaborator
//! modules below.

#[cfg(feature = "browser")]
pub mod browser;
pub mod http;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::error::Result;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Collapse runs of whitespace (including non-breaking spaces) and trim.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(&text.replace('\u{a0}', " "), " ").trim().to_string()
}

/// A matched element inside a source.
pub trait Element: Sized {
    /// First descendant matching `selector`.
    fn find(&self, selector: &Selector) -> Option<Self>;

    /// Descendant text with whitespace collapsed.
    fn text(&self) -> String;

    fn attr(&self, name: &str) -> Option<String>;

    fn inner_html(&self) -> String;
}

/// Anything that can be queried for repeating elements.
pub trait Source {
    type Element<'a>: Element
    where
        Self: 'a;

    /// All elements matching `selector`, in document order.
    fn query(&self, selector: &Selector) -> Result<Vec<Self::Element<'_>>>;

    /// URL that relative links in this source resolve against.
    fn base_url(&self) -> Option<&Url> {
        None
    }

    /// Short label used in logs and errors.
    fn source_id(&self) -> String {
        self.base_url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<inline html>".to_string())
    }
}

impl<'a> Element for ElementRef<'a> {
    fn find(&self, selector: &Selector) -> Option<Self> {
        self.select(selector).next()
    }

    fn text(&self) -> String {
        let raw: String = ElementRef::text(self).collect();
        normalize_whitespace(&raw)
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.value().attr(name).map(|v| v.trim().to_string())
    }

    fn inner_html(&self) -> String {
        ElementRef::inner_html(self)
    }
}

/// A parsed HTML page, optionally remembering where it came from.
pub struct HtmlDocument {
    html: Html,
    base_url: Option<Url>,
}

impl HtmlDocument {
    pub fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_document(body),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Restrict queries to the first element matching `selector`, e.g. one
    /// table on a page that has several.
    pub fn scope(&self, selector: &Selector) -> Option<ScopedSource<'_>> {
        self.html.select(selector).next().map(|root| ScopedSource {
            root,
            base_url: self.base_url.as_ref(),
        })
    }
}

impl Source for HtmlDocument {
    type Element<'a> = ElementRef<'a> where Self: 'a;

    fn query(&self, selector: &Selector) -> Result<Vec<ElementRef<'_>>> {
        Ok(self.html.select(selector).collect())
    }

    fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }
}

/// A subtree of an [`HtmlDocument`] used as a source of its own.
pub struct ScopedSource<'d> {
    root: ElementRef<'d>,
    base_url: Option<&'d Url>,
}

impl<'d> Source for ScopedSource<'d> {
    type Element<'a> = ElementRef<'d> where Self: 'a;

    fn query(&self, selector: &Selector) -> Result<Vec<ElementRef<'d>>> {
        Ok(self.root.select(selector).collect())
    }

    fn base_url(&self) -> Option<&Url> {
        self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(normalize_whitespace("  Jordan\n\t  Lee\u{a0} "), "Jordan Lee");
    }

    #[test]
    fn element_text_joins_nested_nodes() {
        let doc = HtmlDocument::parse("<div class='c'>\n  <b>Ava</b>\n  <i>Smith</i>\n</div>");
        let sel = Selector::parse("div.c").unwrap();
        let found = doc.query(&sel).unwrap();
        assert_eq!(Element::text(&found[0]), "Ava Smith");
    }

    #[test]
    fn scope_limits_queries_to_subtree() {
        let doc = HtmlDocument::parse(
            "<table id='a'><tr><td>1</td></tr></table><table id='b'><tr><td>2</td></tr><tr><td>3</td></tr></table>",
        );
        let scope = doc.scope(&Selector::parse("#b").unwrap()).unwrap();
        let rows = scope.query(&Selector::parse("tr").unwrap()).unwrap();
        assert_eq!(rows.len(), 2);
    }
}
