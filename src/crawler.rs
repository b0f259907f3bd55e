use camino::Utf8PathBuf;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{info, warn};
use url::Url;

use crate::config::CrawlConfig;
use crate::domain::{
    AssemblyLink, AssemblySearch, CrawlOutcome, CrawlResult, DownloadRecord, LinkFailure, Stage,
};
use crate::download;
use crate::error::CrawlError;
use crate::fetch::PageFetcher;
use crate::stages::{biosample, detail, ftp, parse_url, publication, search};

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub download_dir: Utf8PathBuf,
    pub download: bool,
    pub verify_downloads: bool,
    pub jobs: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        CrawlOptions::from(&CrawlConfig::default())
    }
}

impl From<&CrawlConfig> for CrawlOptions {
    fn from(config: &CrawlConfig) -> Self {
        Self {
            download_dir: config.download_dir.clone(),
            download: config.download,
            verify_downloads: config.verify_downloads,
            jobs: config.jobs.max(1),
        }
    }
}

#[derive(Default)]
struct LinkOutcome {
    download: Option<DownloadRecord>,
    failures: Vec<LinkFailure>,
}

impl LinkOutcome {
    fn fail(&mut self, index: usize, link: &AssemblyLink, stage: Stage, err: &CrawlError) {
        let stage = err.stage().unwrap_or(stage);
        warn!("link {index} ({}): {stage} failed: {err}", link.url);
        self.failures.push(LinkFailure {
            link_index: index,
            link_url: link.url.clone(),
            stage,
            message: err.to_string(),
        });
    }
}

pub struct Crawler<F: PageFetcher> {
    fetcher: F,
    options: CrawlOptions,
}

impl<F: PageFetcher> Crawler<F> {
    pub fn new(fetcher: F, options: CrawlOptions) -> Self {
        Self { fetcher, options }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Runs the whole chain from `seed`.
    ///
    /// Publication and search failures abort the run; anything that goes
    /// wrong for a single assembly is recorded in the outcome and the crawl
    /// moves on.
    pub fn run(&self, seed: &Url) -> Result<CrawlOutcome, CrawlError> {
        let publication = publication::crawl(&self.fetcher, seed)?;
        let search_url = parse_url(&publication.assembly_url)?;
        let links = search::crawl(&self.fetcher, &search_url)?
            .into_iter()
            .map(AssemblyLink::new)
            .collect::<Vec<_>>();

        let mut result = CrawlResult {
            abstract_text: publication.abstract_text,
            keywords: publication.keywords,
            doi: publication.doi,
            assembly: AssemblySearch {
                url: publication.assembly_url,
                links,
            },
        };

        if result.assembly.links.is_empty() {
            info!("no assembly records linked from {seed}");
        }

        let outcomes = self.crawl_links(&mut result.assembly.links)?;
        let mut downloads = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            downloads.extend(outcome.download);
            failures.extend(outcome.failures);
        }

        info!(
            "crawl finished: {} assembly record(s), {} download(s), {} failure(s)",
            result.assembly.links.len(),
            downloads.len(),
            failures.len()
        );

        Ok(CrawlOutcome {
            result,
            downloads,
            failures,
        })
    }

    fn crawl_links(&self, links: &mut [AssemblyLink]) -> Result<Vec<LinkOutcome>, CrawlError> {
        if self.options.jobs <= 1 || links.len() <= 1 {
            return Ok(links
                .iter_mut()
                .enumerate()
                .map(|(index, link)| self.crawl_link(index, link))
                .collect());
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.options.jobs)
            .thread_name(|index| format!("biocrawler-{index}"))
            .build()
            .map_err(|err| CrawlError::WorkerPool(err.to_string()))?;
        // Each worker owns one slot, so results stay in search-page order.
        Ok(pool.install(|| {
            links
                .par_iter_mut()
                .enumerate()
                .map(|(index, link)| self.crawl_link(index, link))
                .collect()
        }))
    }

    fn crawl_link(&self, index: usize, link: &mut AssemblyLink) -> LinkOutcome {
        let mut outcome = LinkOutcome::default();

        if let Err(err) = detail::crawl(&self.fetcher, link) {
            outcome.fail(index, link, Stage::AssemblyDetail, &err);
            return outcome;
        }

        if !link.report.bio_sample.url.is_empty() {
            if let Err(err) = biosample::crawl(&self.fetcher, &mut link.report.bio_sample) {
                outcome.fail(index, link, Stage::BioSample, &err);
            }
        }

        if link.report.ftp_url.is_empty() {
            return outcome;
        }
        if let Err(err) = ftp::crawl(&self.fetcher, &mut link.report) {
            outcome.fail(index, link, Stage::FtpListing, &err);
            return outcome;
        }

        if link.report.gbff_url.is_empty() || !self.options.download {
            return outcome;
        }
        match download::download_gbff(
            &self.fetcher,
            &link.report.gbff_url,
            &self.options.download_dir,
            self.options.verify_downloads,
        ) {
            Ok(record) => outcome.download = Some(record),
            Err(err) => outcome.fail(index, link, Stage::Download, &err),
        }
        outcome
    }
}
