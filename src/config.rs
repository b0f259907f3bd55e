use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::CrawlError;

pub const DEFAULT_SEED_URL: &str = "https://pubmed.ncbi.nlm.nih.gov/29708484/";
pub const CONFIG_FILE_NAME: &str = "biocrawler.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub seed_url: String,
    pub output: Utf8PathBuf,
    pub download_dir: Utf8PathBuf,
    pub page_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub max_body_bytes: u64,
    pub jobs: usize,
    pub download: bool,
    pub verify_downloads: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            seed_url: DEFAULT_SEED_URL.to_string(),
            output: Utf8PathBuf::from("data.json"),
            download_dir: Utf8PathBuf::from("."),
            page_timeout_secs: 60,
            download_timeout_secs: 600,
            max_body_bytes: 100 * 1024 * 1024,
            jobs: 1,
            download: true,
            verify_downloads: false,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path` if given, otherwise the first of `./biocrawler.json` and the
    /// per-user config file that exists, otherwise the defaults.
    pub fn resolve(path: Option<&str>) -> Result<CrawlConfig, CrawlError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::discover(),
        };
        let Some(config_path) = config_path else {
            return Ok(CrawlConfig::default());
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| CrawlError::ConfigRead(config_path.clone()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<CrawlConfig, CrawlError> {
        let config: CrawlConfig = serde_json::from_str(content)
            .map_err(|err| CrawlError::ConfigParse(err.to_string()))?;
        if config.jobs == 0 {
            return Err(CrawlError::ConfigParse("jobs must be at least 1".to_string()));
        }
        Ok(config)
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        ProjectDirs::from("", "", "biocrawler")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }
}
