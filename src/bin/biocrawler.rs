use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use biocrawler::config::{ConfigLoader, CrawlConfig};
use biocrawler::crawler::{CrawlOptions, Crawler};
use biocrawler::error::CrawlError;
use biocrawler::fetch::HttpFetcher;
use biocrawler::report;
use biocrawler::stages::parse_url;

#[derive(Parser)]
#[command(name = "biocrawler")]
#[command(about = "Crawl a PubMed record through NCBI Assembly and download GBFF annotations")]
#[command(version, author)]
struct Cli {
    /// Publication page to start from
    #[arg(short, long)]
    url: Option<String>,

    /// Suppress log output below error level
    #[arg(short, long, alias = "quite")]
    quiet: bool,

    /// Also print the JSON report to stdout
    #[arg(short, long)]
    print: bool,

    /// Where to write the JSON report
    #[arg(short, long)]
    output: Option<Utf8PathBuf>,

    /// Directory for downloaded .gbff files
    #[arg(short, long)]
    download_dir: Option<Utf8PathBuf>,

    /// Assembly records crawled in parallel
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Crawl and report, but skip GBFF downloads
    #[arg(long)]
    no_download: bool,

    /// Check that each download is a readable gzip stream
    #[arg(long)]
    verify: bool,

    /// JSON config file (default: ./biocrawler.json, then the user config dir)
    #[arg(long)]
    config: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<CrawlError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CrawlError) -> u8 {
    match error {
        CrawlError::MissingCrossReference { .. } => 2,
        err if err.is_fetch_failure() && err.stage().is_some_and(|stage| stage.is_fatal()) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = apply_overrides(ConfigLoader::resolve(cli.config.as_deref())?, &cli);
    if config.jobs == 0 {
        return Err(miette::Report::msg("--jobs must be at least 1"));
    }
    let seed = parse_url(&config.seed_url)?;

    let fetcher = HttpFetcher::new(&config)?;
    let crawler = Crawler::new(fetcher, CrawlOptions::from(&config));
    let outcome = crawler.run(&seed)?;

    if cli.print {
        report::print_report(&outcome.result)?;
    }
    report::write_report(&config.output, &outcome.result)?;

    if let Some(summary) = report::failure_summary(&outcome.failures) {
        tracing::warn!("{summary}");
    }
    Ok(())
}

fn apply_overrides(mut config: CrawlConfig, cli: &Cli) -> CrawlConfig {
    if let Some(url) = &cli.url {
        config.seed_url = url.clone();
    }
    if let Some(output) = &cli.output {
        config.output = output.clone();
    }
    if let Some(dir) = &cli.download_dir {
        config.download_dir = dir.clone();
    }
    if let Some(jobs) = cli.jobs {
        config.jobs = jobs;
    }
    if cli.no_download {
        config.download = false;
    }
    if cli.verify {
        config.verify_downloads = true;
    }
    config
}
