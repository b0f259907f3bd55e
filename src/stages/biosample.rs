use scraper::{ElementRef, Selector};
use tracing::{debug, info};

use crate::domain::{BioSample, BioSampleAttribute, Stage};
use crate::error::CrawlError;
use crate::extract::{self, Page, Rule, element_text};
use crate::fetch::PageFetcher;
use crate::stages::parse_url;

/// Fetches `sample.url` and fills the attributes its table carries.
pub fn crawl<F: PageFetcher + ?Sized>(fetcher: &F, sample: &mut BioSample) -> Result<(), CrawlError> {
    info!("crawl biosample {}", sample.url);
    let url = parse_url(&sample.url)?;
    let page = fetcher.fetch_page(Stage::BioSample, &url)?;
    apply(&page, sample)
}

pub fn apply(page: &Page, sample: &mut BioSample) -> Result<(), CrawlError> {
    let rule = AttributeRowRule {
        selector: extract::selector("tbody tr")?,
        header: extract::selector("th")?,
        cell: extract::selector("td")?,
    };
    let rows = page.extract_all(&rule);
    debug!("biosample table has {} recognized attribute(s)", rows.len());
    for (attribute, value) in rows {
        sample.set(attribute, value);
    }
    Ok(())
}

struct AttributeRowRule {
    selector: Selector,
    header: Selector,
    cell: Selector,
}

impl Rule for AttributeRowRule {
    type Output = (BioSampleAttribute, String);

    fn selector(&self) -> &Selector {
        &self.selector
    }

    fn apply(&self, _page: &Page, element: ElementRef<'_>) -> Option<Self::Output> {
        let key = element_text(element.select(&self.header).next()?);
        let attribute = BioSampleAttribute::from_key(key.trim())?;
        let value = element
            .select(&self.cell)
            .next()
            .map(|cell| element_text(cell).trim().to_string())
            .unwrap_or_default();
        Some((attribute, value))
    }
}
