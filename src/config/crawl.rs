//! Crawl policy configuration: politeness, visit limits, blacklists and reporting

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::scraping::trap_detection::TrapDetectorConfig;

/// What to do with the links of a page whose content was already seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Return no links for a duplicate page
    #[default]
    DropLinks,
    /// Still return the page's valid links, without recording any statistics
    FollowLinks,
}

/// Which blacklist state filters the links of the page that is being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlacklistSnapshot {
    /// Links are checked against the blacklist as it was before this page's visit was counted
    #[default]
    BeforeUpdate,
    /// Links are checked after this page's visit was counted, so a URL blacklisted
    /// by this very visit is excluded from its own page's links
    AfterUpdate,
}

/// Crawl-wide configuration for the page-processing core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Minimum delay between two requests to the same host (seconds)
    pub min_politeness_delay_secs: f64,
    /// A URL counted more often than this is blacklisted
    pub max_visits_per_url: u32,
    /// Pages announcing a larger Content-Length are skipped
    pub max_page_size_bytes: usize,
    /// Number of most frequent words included in the report
    pub common_words_reported: usize,
    /// Hosts that are never crawled
    pub blacklisted_hosts: BTreeSet<String>,
    /// Path prefixes that are never crawled, on any host
    pub blacklisted_path_prefixes: Vec<String>,
    /// Link handling for duplicate content
    pub duplicate_policy: DuplicatePolicy,
    /// Blacklist state used when filtering a page's own links
    pub blacklist_snapshot: BlacklistSnapshot,
    /// Structural crawl trap heuristics
    pub trap_detector: TrapDetectorConfig,
    /// Where the text report is written after each processed page
    pub report_path: Option<PathBuf>,
}

impl CrawlConfig {
    /// Politeness delay as a `Duration`, clamped to zero for negative or non-finite values
    pub fn min_politeness_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.min_politeness_delay_secs).unwrap_or(Duration::ZERO)
    }

    /// Collect validation errors into `errors`
    pub(crate) fn validate_into(&self, errors: &mut Vec<String>) {
        if !self.min_politeness_delay_secs.is_finite() || self.min_politeness_delay_secs < 0.0 {
            errors.push("min_politeness_delay_secs must be a non-negative number".to_string());
        }
        if self.max_visits_per_url == 0 {
            errors.push("max_visits_per_url must be positive".to_string());
        }
        if self.max_page_size_bytes == 0 {
            errors.push("max_page_size_bytes must be positive".to_string());
        }
        if self.common_words_reported == 0 {
            errors.push("common_words_reported must be positive".to_string());
        }
        for prefix in &self.blacklisted_path_prefixes {
            if !prefix.starts_with('/') {
                errors.push(format!(
                    "blacklisted path prefix '{}' must start with '/'",
                    prefix
                ));
            }
        }
        for host in &self.blacklisted_hosts {
            if host.is_empty() {
                errors.push("blacklisted host must not be empty".to_string());
            }
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            min_politeness_delay_secs: 0.5,
            max_visits_per_url: 4,
            max_page_size_bytes: 2_000_000,
            common_words_reported: 50,
            blacklisted_hosts: BTreeSet::new(),
            blacklisted_path_prefixes: Vec::new(),
            duplicate_policy: DuplicatePolicy::default(),
            blacklist_snapshot: BlacklistSnapshot::default(),
            trap_detector: TrapDetectorConfig::default(),
            report_path: None,
        }
    }
}
