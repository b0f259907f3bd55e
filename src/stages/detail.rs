use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::{debug, info};

use crate::domain::{AssemblyLink, AssemblyReport, Stage};
use crate::error::CrawlError;
use crate::extract::{self, Page, Rule, element_text, first_href};
use crate::fetch::PageFetcher;
use crate::stages::parse_url;

pub const FTP_DIRECTORY_MARKER: &str = "FTP directory";

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Fills the detail fields and FTP directory of `link.report`.
///
/// On [`CrawlError::MalformedDetailPage`] the report keeps whatever was
/// dispatched before the mismatch and the FTP link is not looked up.
pub fn crawl<F: PageFetcher + ?Sized>(fetcher: &F, link: &mut AssemblyLink) -> Result<(), CrawlError> {
    info!("crawl assembly {}", link.url);
    let url = parse_url(&link.url)?;
    let page = fetcher.fetch_page(Stage::AssemblyDetail, &url)?;
    apply(&page, &mut link.report)
}

pub fn apply(page: &Page, report: &mut AssemblyReport) -> Result<(), CrawlError> {
    let definitions = DefinitionListRule {
        selector: extract::selector("dl")?,
        term: extract::selector("dt")?,
        value: extract::selector("dd")?,
        anchor: extract::selector("a")?,
    };
    for list in page.extract_all(&definitions) {
        for field in list.fields {
            field.write_to(report);
        }
        if list.terms != list.values {
            return Err(CrawlError::MalformedDetailPage {
                url: page.url().to_string(),
                terms: list.terms,
                values: list.values,
            });
        }
    }

    let ftp = FtpDirectoryRule {
        selector: extract::selector(".portlet_content ul")?,
        anchor: extract::selector("a")?,
    };
    if let Some(ftp_url) = page.extract_first(&ftp) {
        debug!("ftp directory {ftp_url}");
        report.ftp_url = ftp_url;
    }
    Ok(())
}

/// Collapses whitespace, drops the trailing colon and lowercases, so
/// `"Organism name: "` and `"Organism  name"` look up the same field.
pub fn normalize_label(label: &str) -> String {
    WHITESPACE
        .replace_all(label, " ")
        .trim()
        .trim_end_matches(':')
        .trim_end()
        .to_lowercase()
}

/// Rewrites an `ftp://` link to the HTTPS mirror of the same path.
pub fn normalize_ftp_url(href: &str) -> String {
    match href.trim().strip_prefix("ftp://") {
        Some(rest) => format!("https://{rest}"),
        None => href.trim().to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetailLabel {
    OrganismName,
    InfraspecificName,
    BioSample,
    Submitter,
    Date,
}

impl DetailLabel {
    fn lookup(label: &str) -> Option<Self> {
        let label = match normalize_label(label).as_str() {
            "organism name" => DetailLabel::OrganismName,
            "infraspecific name" => DetailLabel::InfraspecificName,
            "biosample" => DetailLabel::BioSample,
            "submitter" => DetailLabel::Submitter,
            "date" => DetailLabel::Date,
            _ => return None,
        };
        Some(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DetailField {
    OrganismName { name: String, taxonomy_url: String },
    InfraspecificName(String),
    BioSample(String),
    Submitter(String),
    Date(String),
}

impl DetailField {
    fn write_to(self, report: &mut AssemblyReport) {
        match self {
            DetailField::OrganismName { name, taxonomy_url } => {
                report.organism_name = name;
                report.taxonomy_url = taxonomy_url;
            }
            DetailField::InfraspecificName(value) => report.infraspecific_name = value,
            DetailField::BioSample(url) => report.bio_sample.url = url,
            DetailField::Submitter(value) => report.submitter = value,
            DetailField::Date(value) => report.date = value,
        }
    }
}

/// Fields of one `dl`, paired `dt`/`dd` by index.
struct DefinitionList {
    fields: Vec<DetailField>,
    terms: usize,
    values: usize,
}

struct DefinitionListRule {
    selector: Selector,
    term: Selector,
    value: Selector,
    anchor: Selector,
}

impl DefinitionListRule {
    fn dispatch(&self, page: &Page, label: DetailLabel, value: ElementRef<'_>) -> DetailField {
        let text = element_text(value).trim().to_string();
        let href = || {
            first_href(value, &self.anchor)
                .and_then(|href| page.resolve(href))
                .unwrap_or_default()
        };
        match label {
            DetailLabel::OrganismName => DetailField::OrganismName {
                name: text,
                taxonomy_url: href(),
            },
            DetailLabel::InfraspecificName => DetailField::InfraspecificName(text),
            DetailLabel::BioSample => DetailField::BioSample(href()),
            DetailLabel::Submitter => DetailField::Submitter(text),
            DetailLabel::Date => DetailField::Date(text),
        }
    }
}

impl Rule for DefinitionListRule {
    type Output = DefinitionList;

    fn selector(&self) -> &Selector {
        &self.selector
    }

    fn apply(&self, page: &Page, element: ElementRef<'_>) -> Option<DefinitionList> {
        let terms: Vec<String> = element.select(&self.term).map(element_text).collect();
        let values: Vec<ElementRef<'_>> = element.select(&self.value).collect();
        let fields = terms
            .iter()
            .zip(&values)
            .filter_map(|(term, value)| {
                DetailLabel::lookup(term).map(|label| self.dispatch(page, label, *value))
            })
            .collect();
        Some(DefinitionList {
            fields,
            terms: terms.len(),
            values: values.len(),
        })
    }
}

struct FtpDirectoryRule {
    selector: Selector,
    anchor: Selector,
}

impl Rule for FtpDirectoryRule {
    type Output = String;

    fn selector(&self) -> &Selector {
        &self.selector
    }

    fn apply(&self, page: &Page, element: ElementRef<'_>) -> Option<String> {
        element
            .select(&self.anchor)
            .filter(|link| element_text(*link).contains(FTP_DIRECTORY_MARKER))
            .find_map(|link| link.value().attr("href"))
            .and_then(|href| page.resolve(&normalize_ftp_url(href)))
    }
}
