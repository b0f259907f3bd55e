use scraper::{ElementRef, Selector};
use tracing::{debug, info};
use url::Url;

use crate::domain::Stage;
use crate::error::CrawlError;
use crate::extract::{self, Page, Rule, element_text, first_href};
use crate::fetch::PageFetcher;

/// Visible text of the related-links entry that points at NCBI Assembly.
pub const ASSEMBLY_LINK_LABEL: &str = "Assembly";

const KEYWORDS_LABEL: &str = "Keywords:";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Publication {
    pub abstract_text: String,
    pub keywords: Vec<String>,
    pub doi: String,
    pub assembly_url: String,
}

pub fn crawl<F: PageFetcher + ?Sized>(fetcher: &F, url: &Url) -> Result<Publication, CrawlError> {
    info!("crawl publication {url}");
    let page = fetcher.fetch_page(Stage::Publication, url)?;
    extract(&page)
}

pub fn extract(page: &Page) -> Result<Publication, CrawlError> {
    let abstract_text = page
        .extract_all(&TrimmedText::new("#enc-abstract p")?)
        .join("\n");
    let keywords = page
        .extract_first(&KeywordsRule::new()?)
        .unwrap_or_default();
    let doi = page.extract_first(&DoiRule::new()?).unwrap_or_default();
    let assembly_url = page
        .extract_first(&CrossReferenceRule::new(ASSEMBLY_LINK_LABEL)?)
        .ok_or_else(|| CrawlError::MissingCrossReference {
            url: page.url().to_string(),
        })?;

    debug!(
        keywords = keywords.len(),
        doi = %doi,
        "publication extracted, assembly search at {assembly_url}"
    );

    Ok(Publication {
        abstract_text,
        keywords,
        doi,
        assembly_url,
    })
}

/// Strips every `Keywords:` label and splits the rest on `"; "`.
pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.replace(KEYWORDS_LABEL, "")
        .trim()
        .split("; ")
        .map(str::trim)
        .filter(|keyword| !keyword.is_empty())
        .map(str::to_string)
        .collect()
}

struct TrimmedText {
    selector: Selector,
}

impl TrimmedText {
    fn new(css: &str) -> Result<Self, CrawlError> {
        Ok(Self {
            selector: extract::selector(css)?,
        })
    }
}

impl Rule for TrimmedText {
    type Output = String;

    fn selector(&self) -> &Selector {
        &self.selector
    }

    fn apply(&self, _page: &Page, element: ElementRef<'_>) -> Option<String> {
        let text = element_text(element).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

struct KeywordsRule {
    selector: Selector,
}

impl KeywordsRule {
    fn new() -> Result<Self, CrawlError> {
        Ok(Self {
            selector: extract::selector("#enc-abstract + p")?,
        })
    }
}

impl Rule for KeywordsRule {
    type Output = Vec<String>;

    fn selector(&self) -> &Selector {
        &self.selector
    }

    fn apply(&self, _page: &Page, element: ElementRef<'_>) -> Option<Vec<String>> {
        Some(split_keywords(&element_text(element)))
    }
}

struct DoiRule {
    selector: Selector,
}

impl DoiRule {
    fn new() -> Result<Self, CrawlError> {
        Ok(Self {
            selector: extract::selector(".doi .id-link")?,
        })
    }
}

impl Rule for DoiRule {
    type Output = String;

    fn selector(&self) -> &Selector {
        &self.selector
    }

    fn apply(&self, _page: &Page, element: ElementRef<'_>) -> Option<String> {
        let href = element.value().attr("href")?.trim();
        (!href.is_empty()).then(|| href.to_string())
    }
}

struct CrossReferenceRule {
    selector: Selector,
    anchor: Selector,
    label: &'static str,
}

impl CrossReferenceRule {
    fn new(label: &'static str) -> Result<Self, CrawlError> {
        Ok(Self {
            selector: extract::selector("#related-links li")?,
            anchor: extract::selector("a")?,
            label,
        })
    }
}

impl Rule for CrossReferenceRule {
    type Output = String;

    fn selector(&self) -> &Selector {
        &self.selector
    }

    fn apply(&self, page: &Page, element: ElementRef<'_>) -> Option<String> {
        if element_text(element).trim() != self.label {
            return None;
        }
        page.resolve(first_href(element, &self.anchor)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_split_in_order() {
        assert_eq!(split_keywords("Keywords: A; B; C"), vec!["A", "B", "C"]);
    }

    #[test]
    fn keyword_split_is_idempotent() {
        let once = split_keywords("\n  Keywords:  genome; soil bacteria;  Streptomyces \n");
        let twice = split_keywords(&once.join("; "));
        assert_eq!(once, vec!["genome", "soil bacteria", "Streptomyces"]);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_keyword_line_yields_nothing() {
        assert!(split_keywords("Keywords:").is_empty());
        assert!(split_keywords("   ").is_empty());
    }
}
