use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::Stage;

#[derive(Debug, Error, Diagnostic)]
pub enum CrawlError {
    #[error("no Assembly cross-reference link found on publication page {url}")]
    #[diagnostic(help("the publication has no linked assembly records, nothing to crawl"))]
    MissingCrossReference { url: String },

    #[error("malformed assembly detail page {url}: {terms} labels for {values} values")]
    MalformedDetailPage {
        url: String,
        terms: usize,
        values: usize,
    },

    #[error("{stage} request to {url} failed: {message}")]
    FetchHttp {
        stage: Stage,
        url: String,
        message: String,
    },

    #[error("{stage} request to {url} returned status {status}")]
    FetchStatus {
        stage: Stage,
        url: String,
        status: u16,
    },

    #[error("{stage} response from {url} exceeds {limit} bytes")]
    BodyTooLarge {
        stage: Stage,
        url: String,
        limit: u64,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to serialize report: {0}")]
    Serialize(String),
}

impl CrawlError {
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            CrawlError::FetchHttp { .. }
                | CrawlError::FetchStatus { .. }
                | CrawlError::BodyTooLarge { .. }
        )
    }

    /// Stage the error originated from, when the error carries one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            CrawlError::MissingCrossReference { .. } => Some(Stage::Publication),
            CrawlError::MalformedDetailPage { .. } => Some(Stage::AssemblyDetail),
            CrawlError::FetchHttp { stage, .. }
            | CrawlError::FetchStatus { stage, .. }
            | CrawlError::BodyTooLarge { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
