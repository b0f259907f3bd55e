use std::fmt;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Publication,
    AssemblySearch,
    AssemblyDetail,
    BioSample,
    FtpListing,
    Download,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Publication => "publication",
            Stage::AssemblySearch => "assembly-search",
            Stage::AssemblyDetail => "assembly-detail",
            Stage::BioSample => "biosample",
            Stage::FtpListing => "ftp-listing",
            Stage::Download => "download",
        }
    }

    /// Failures in these stages leave nothing to crawl.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Stage::Publication | Stage::AssemblySearch)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root of the report written to `data.json`.
///
/// Absent text is always the empty string, never `null`, so the schema is the
/// same whether or not every stage found something.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResult {
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: Vec<String>,
    pub doi: String,
    pub assembly: AssemblySearch,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblySearch {
    pub url: String,
    pub links: Vec<AssemblyLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyLink {
    pub url: String,
    pub report: AssemblyReport,
}

impl AssemblyLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            report: AssemblyReport::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyReport {
    pub organism_name: String,
    pub taxonomy_url: String,
    pub infraspecific_name: String,
    pub bio_sample: BioSample,
    pub submitter: String,
    pub date: String,
    pub ftp_url: String,
    pub gbff_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BioSample {
    pub url: String,
    pub strain: String,
    pub collection_date: String,
    pub broad_scale_environmental_context: String,
    pub local_scale_environmental_context: String,
    pub environmental_medium: String,
    pub geographic_location: String,
    pub lat_long: String,
    pub host: String,
    pub isolation_and_growth_condition: String,
    pub number_of_replicons: String,
    pub ploidy: String,
    pub propagation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BioSampleAttribute {
    Strain,
    CollectionDate,
    BroadScaleEnvironmentalContext,
    LocalScaleEnvironmentalContext,
    EnvironmentalMedium,
    GeographicLocation,
    LatLong,
    Host,
    IsolationAndGrowthCondition,
    NumberOfReplicons,
    Ploidy,
    Propagation,
}

impl BioSampleAttribute {
    /// Maps a BioSample attribute table header to its field.
    pub fn from_key(key: &str) -> Option<Self> {
        let attribute = match key {
            "strain" => BioSampleAttribute::Strain,
            "collection date" => BioSampleAttribute::CollectionDate,
            "broad-scale environmental context" => {
                BioSampleAttribute::BroadScaleEnvironmentalContext
            }
            "local-scale environmental context" => {
                BioSampleAttribute::LocalScaleEnvironmentalContext
            }
            "environmental medium" => BioSampleAttribute::EnvironmentalMedium,
            "geographic location" => BioSampleAttribute::GeographicLocation,
            "latitude and longitude" => BioSampleAttribute::LatLong,
            "host" => BioSampleAttribute::Host,
            "isolation and growth condition" => BioSampleAttribute::IsolationAndGrowthCondition,
            "number of replicons" => BioSampleAttribute::NumberOfReplicons,
            "ploidy" => BioSampleAttribute::Ploidy,
            "propagation" => BioSampleAttribute::Propagation,
            _ => return None,
        };
        Some(attribute)
    }
}

impl BioSample {
    pub fn set(&mut self, attribute: BioSampleAttribute, value: String) {
        let slot = match attribute {
            BioSampleAttribute::Strain => &mut self.strain,
            BioSampleAttribute::CollectionDate => &mut self.collection_date,
            BioSampleAttribute::BroadScaleEnvironmentalContext => {
                &mut self.broad_scale_environmental_context
            }
            BioSampleAttribute::LocalScaleEnvironmentalContext => {
                &mut self.local_scale_environmental_context
            }
            BioSampleAttribute::EnvironmentalMedium => &mut self.environmental_medium,
            BioSampleAttribute::GeographicLocation => &mut self.geographic_location,
            BioSampleAttribute::LatLong => &mut self.lat_long,
            BioSampleAttribute::Host => &mut self.host,
            BioSampleAttribute::IsolationAndGrowthCondition => {
                &mut self.isolation_and_growth_condition
            }
            BioSampleAttribute::NumberOfReplicons => &mut self.number_of_replicons,
            BioSampleAttribute::Ploidy => &mut self.ploidy,
            BioSampleAttribute::Propagation => &mut self.propagation,
        };
        *slot = value;
    }
}

#[derive(Debug, Clone)]
pub struct DownloadRecord {
    pub url: String,
    pub path: Utf8PathBuf,
    pub bytes: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct LinkFailure {
    pub link_index: usize,
    pub link_url: String,
    pub stage: Stage,
    pub message: String,
}

/// Everything a run produced. Only `result` goes into the report.
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    pub result: CrawlResult,
    pub downloads: Vec<DownloadRecord>,
    pub failures: Vec<LinkFailure>,
}
