use scraper::{ElementRef, Selector};
use tracing::info;

use crate::domain::{AssemblyReport, Stage};
use crate::error::CrawlError;
use crate::extract::{self, Page, Rule, element_text};
use crate::fetch::PageFetcher;
use crate::stages::parse_url;

/// Listing entries carrying this substring are the GenBank flat-file annotation.
pub const GBFF_MARKER: &str = "genomic.gbff.gz";

/// Looks up the GBFF file in the FTP directory listing of `report.ftp_url`.
pub fn crawl<F: PageFetcher + ?Sized>(fetcher: &F, report: &mut AssemblyReport) -> Result<(), CrawlError> {
    info!("crawl ftp listing {}", report.ftp_url);
    let url = parse_url(&report.ftp_url)?;
    let page = fetcher.fetch_page(Stage::FtpListing, &url)?;
    if let Some(gbff_url) = extract(&page)? {
        report.gbff_url = gbff_url;
    } else {
        info!("no {GBFF_MARKER} file listed under {}", page.url());
    }
    Ok(())
}

pub fn extract(page: &Page) -> Result<Option<String>, CrawlError> {
    let rule = GbffLinkRule {
        selector: extract::selector("pre")?,
        anchor: extract::selector("a")?,
    };
    Ok(page.extract_first(&rule))
}

struct GbffLinkRule {
    selector: Selector,
    anchor: Selector,
}

impl Rule for GbffLinkRule {
    type Output = String;

    fn selector(&self) -> &Selector {
        &self.selector
    }

    fn apply(&self, page: &Page, element: ElementRef<'_>) -> Option<String> {
        element
            .select(&self.anchor)
            .filter(|link| element_text(*link).contains(GBFF_MARKER))
            .find_map(|link| link.value().attr("href"))
            .and_then(|href| page.resolve(href))
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    #[test]
    fn first_gbff_entry_resolves_against_listing() {
        let page = Page::parse(
            Url::parse("https://ftp.ncbi.nlm.nih.gov/genomes/all/GCF/000/005/845/GCF_000005845.2_ASM584v2/")
                .unwrap(),
            r#"<pre>
<a href="../">Parent Directory</a>
<a href="GCF_000005845.2_ASM584v2_genomic.fna.gz">GCF_000005845.2_ASM584v2_genomic.fna.gz</a>
<a href="GCF_000005845.2_ASM584v2_genomic.gbff.gz">GCF_000005845.2_ASM584v2_genomic.gbff.gz</a>
<a href="other_genomic.gbff.gz">other_genomic.gbff.gz</a>
</pre>"#,
        );

        assert_eq!(
            extract(&page).unwrap().as_deref(),
            Some(
                "https://ftp.ncbi.nlm.nih.gov/genomes/all/GCF/000/005/845/GCF_000005845.2_ASM584v2/GCF_000005845.2_ASM584v2_genomic.gbff.gz"
            )
        );
    }

    #[test]
    fn listing_without_gbff_yields_none() {
        let page = Page::parse(
            Url::parse("https://ftp.ncbi.nlm.nih.gov/genomes/all/").unwrap(),
            r#"<pre><a href="README.txt">README.txt</a></pre>"#,
        );
        assert_eq!(extract(&page).unwrap(), None);
    }
}
