use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::CrawlError;

/// A fetched HTML document together with the URL it was served from.
///
/// The URL is the final one after redirects; relative links resolve against it.
#[derive(Debug)]
pub struct Page {
    url: Url,
    html: Html,
}

impl Page {
    pub fn parse(url: Url, body: &str) -> Self {
        Self {
            url,
            html: Html::parse_document(body),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Resolves `href` against the page URL. Empty and fragment-only hrefs
    /// resolve to nothing.
    pub fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return None;
        }
        self.url.join(href).ok().map(String::from)
    }

    /// Applies `rule` to every element its selector matches, in document order.
    pub fn extract_all<R: Rule>(&self, rule: &R) -> Vec<R::Output> {
        self.html
            .select(rule.selector())
            .filter_map(|element| rule.apply(self, element))
            .collect()
    }

    /// Like [`Page::extract_all`], stopping at the first element that yields a value.
    pub fn extract_first<R: Rule>(&self, rule: &R) -> Option<R::Output> {
        self.html
            .select(rule.selector())
            .find_map(|element| rule.apply(self, element))
    }
}

/// One named extraction over a page: a selector plus what to pull out of each match.
///
/// Rules are built per stage call and dropped with it; nothing is registered
/// on the fetcher.
pub trait Rule {
    type Output;

    fn selector(&self) -> &Selector;

    fn apply(&self, page: &Page, element: ElementRef<'_>) -> Option<Self::Output>;
}

pub fn selector(css: &str) -> Result<Selector, CrawlError> {
    Selector::parse(css).map_err(|err| CrawlError::InvalidSelector(format!("{css}: {err}")))
}

/// Concatenated text of the element and all its descendants.
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// `href` of the first anchor below `element` matched by `anchor`.
pub fn first_href<'a>(element: ElementRef<'a>, anchor: &Selector) -> Option<&'a str> {
    element
        .select(anchor)
        .find_map(|link| link.value().attr("href"))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ParagraphRule {
        selector: Selector,
    }

    impl Rule for ParagraphRule {
        type Output = String;

        fn selector(&self) -> &Selector {
            &self.selector
        }

        fn apply(&self, _page: &Page, element: ElementRef<'_>) -> Option<String> {
            let text = element_text(element).trim().to_string();
            (!text.is_empty()).then_some(text)
        }
    }

    fn page(body: &str) -> Page {
        Page::parse(Url::parse("https://example.org/docs/index.html").unwrap(), body)
    }

    #[test]
    fn extract_all_keeps_document_order() {
        let page = page("<p>one</p><p> </p><p>two</p>");
        let rule = ParagraphRule {
            selector: selector("p").unwrap(),
        };
        assert_eq!(page.extract_all(&rule), vec!["one", "two"]);
        assert_eq!(page.extract_first(&rule).as_deref(), Some("one"));
    }

    #[test]
    fn resolve_relative_links() {
        let page = page("");
        assert_eq!(
            page.resolve("/assembly/1").as_deref(),
            Some("https://example.org/assembly/1")
        );
        assert_eq!(
            page.resolve("file.gz").as_deref(),
            Some("https://example.org/docs/file.gz")
        );
        assert_eq!(page.resolve("#top"), None);
        assert_eq!(page.resolve("  "), None);
    }

    #[test]
    fn invalid_selector_is_reported() {
        assert!(matches!(
            selector("p["),
            Err(CrawlError::InvalidSelector(_))
        ));
    }
}
