use std::fs::File;
use std::io;
use std::time::Instant;

use camino::Utf8Path;
use flate2::read::MultiGzDecoder;
use tracing::{info, warn};

use crate::domain::DownloadRecord;
use crate::error::CrawlError;
use crate::fetch::PageFetcher;
use crate::stages::parse_url;

pub const COMPRESSED_SUFFIX: &str = ".gbff.gz";
pub const ARTIFACT_EXTENSION: &str = "gbff";

/// `.../GCF_000005845.2_ASM584v2_genomic.gbff.gz` → `GCF_000005845.2_ASM584v2_genomic.gbff`.
pub fn artifact_file_name(gbff_url: &str) -> Option<String> {
    let path = gbff_url.split(['?', '#']).next().unwrap_or_default();
    let segment = path.rsplit('/').find(|segment| !segment.is_empty())?;
    if segment.contains(':') {
        return None;
    }
    let stem = segment.replacen(COMPRESSED_SUFFIX, "", 1);
    Some(format!("{stem}.{ARTIFACT_EXTENSION}"))
}

/// Downloads `gbff_url` into `dir` as received, without decompressing.
pub fn download_gbff<F: PageFetcher + ?Sized>(
    fetcher: &F,
    gbff_url: &str,
    dir: &Utf8Path,
    verify: bool,
) -> Result<DownloadRecord, CrawlError> {
    let url = parse_url(gbff_url)?;
    let file_name = artifact_file_name(gbff_url)
        .ok_or_else(|| CrawlError::InvalidUrl(format!("{gbff_url}: no file name")))?;
    let path = dir.join(file_name);

    info!("download {gbff_url} to {path}");
    let start = Instant::now();
    let bytes = fetcher.download(&url, &path)?;
    let elapsed = start.elapsed();
    info!("saved {path} ({bytes} bytes) in {elapsed:.2?}");

    if verify {
        match verify_gzip(&path) {
            Ok(inflated) => info!("{path} inflates to {inflated} bytes"),
            Err(err) => warn!("{path} is not a readable gzip stream: {err}"),
        }
    }

    Ok(DownloadRecord {
        url: gbff_url.to_string(),
        path,
        bytes,
        elapsed,
    })
}

/// Streams `path` through a gzip decoder and returns the inflated size.
pub fn verify_gzip(path: &Utf8Path) -> Result<u64, CrawlError> {
    let file = File::open(path.as_std_path())
        .map_err(|err| CrawlError::Filesystem(format!("open {path}: {err}")))?;
    let mut decoder = MultiGzDecoder::new(file);
    io::copy(&mut decoder, &mut io::sink())
        .map_err(|err| CrawlError::Filesystem(format!("inflate {path}: {err}")))
}
