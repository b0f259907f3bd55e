//! One module per page type in the crawl chain.
//!
//! Each stage builds its rules, fetches one page through a [`PageFetcher`],
//! and hands back (or writes into the link it was given) what the rules
//! extracted. The `apply`/`extract` halves take an already parsed [`Page`]
//! so they can be exercised on fixture HTML.
//!
//! [`PageFetcher`]: crate::fetch::PageFetcher
//! [`Page`]: crate::extract::Page

pub mod biosample;
pub mod detail;
pub mod ftp;
pub mod publication;
pub mod search;

use url::Url;

use crate::error::CrawlError;

pub fn parse_url(value: &str) -> Result<Url, CrawlError> {
    Url::parse(value).map_err(|err| CrawlError::InvalidUrl(format!("{value}: {err}")))
}
