use std::io::{self, Write};

use camino::Utf8Path;
use tracing::info;

use crate::domain::{CrawlResult, LinkFailure};
use crate::error::CrawlError;
use crate::fetch::write_atomic;

/// Pretty JSON (two-space indent) with a trailing newline.
pub fn render(result: &CrawlResult) -> Result<String, CrawlError> {
    let mut json =
        serde_json::to_string_pretty(result).map_err(|err| CrawlError::Serialize(err.to_string()))?;
    json.push('\n');
    Ok(json)
}

pub fn write_report(path: &Utf8Path, result: &CrawlResult) -> Result<(), CrawlError> {
    let json = render(result)?;
    write_atomic(path, |file| {
        file.write_all(json.as_bytes())
            .map_err(|err| CrawlError::Filesystem(format!("write {path}: {err}")))
    })?;
    info!("report written to {path}");
    Ok(())
}

pub fn print_report(result: &CrawlResult) -> Result<(), CrawlError> {
    let json = render(result)?;
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(json.as_bytes())
        .and_then(|_| stdout.flush())
        .map_err(|err| CrawlError::Filesystem(err.to_string()))
}

/// End-of-run line; each failure was already logged when it happened.
pub fn failure_summary(failures: &[LinkFailure]) -> Option<String> {
    if failures.is_empty() {
        return None;
    }
    let mut links = failures
        .iter()
        .map(|failure| failure.link_index)
        .collect::<Vec<_>>();
    links.sort_unstable();
    links.dedup();
    Some(format!(
        "{} stage failure(s) across {} assembly record(s)",
        failures.len(),
        links.len()
    ))
}
