use scraper::{ElementRef, Selector};
use tracing::info;
use url::Url;

use crate::domain::Stage;
use crate::error::CrawlError;
use crate::extract::{self, Page, Rule};
use crate::fetch::PageFetcher;

/// Returns the absolute detail-page URL of every search result, in page order.
pub fn crawl<F: PageFetcher + ?Sized>(fetcher: &F, url: &Url) -> Result<Vec<String>, CrawlError> {
    info!("crawl assembly search {url}");
    let page = fetcher.fetch_page(Stage::AssemblySearch, url)?;
    let links = extract(&page)?;
    info!("assembly search listed {} record(s)", links.len());
    Ok(links)
}

pub fn extract(page: &Page) -> Result<Vec<String>, CrawlError> {
    let rule = ResultTitleRule {
        selector: extract::selector(".rslt .title")?,
        anchor: extract::selector("a")?,
    };
    Ok(page.extract_all(&rule).into_iter().flatten().collect())
}

struct ResultTitleRule {
    selector: Selector,
    anchor: Selector,
}

impl Rule for ResultTitleRule {
    type Output = Vec<String>;

    fn selector(&self) -> &Selector {
        &self.selector
    }

    fn apply(&self, page: &Page, element: ElementRef<'_>) -> Option<Vec<String>> {
        Some(
            element
                .select(&self.anchor)
                .filter_map(|link| link.value().attr("href"))
                .filter_map(|href| page.resolve(href))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_title_link_in_order() {
        let page = Page::parse(
            Url::parse("https://www.ncbi.nlm.nih.gov/assembly?LinkName=pubmed_assembly").unwrap(),
            r#"
            <div class="rslt"><p class="title"><a href="/assembly/GCF_1/">first</a></p></div>
            <div class="rslt"><p class="desc"><a href="/ignored">ignored</a></p></div>
            <div class="rslt"><p class="title"><a href="/assembly/GCA_2/">second</a><a>no href</a></p></div>
            "#,
        );

        assert_eq!(
            extract(&page).unwrap(),
            vec![
                "https://www.ncbi.nlm.nih.gov/assembly/GCF_1/",
                "https://www.ncbi.nlm.nih.gov/assembly/GCA_2/",
            ]
        );
    }

    #[test]
    fn no_results_is_empty() {
        let page = Page::parse(
            Url::parse("https://www.ncbi.nlm.nih.gov/assembly").unwrap(),
            "<p>No items found.</p>",
        );
        assert!(extract(&page).unwrap().is_empty());
    }
}
