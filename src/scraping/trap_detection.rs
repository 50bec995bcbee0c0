//! Crawl trap detection
//!
//! A URL is a trap when its host or path prefix is statically blacklisted,
//! when it was dynamically blacklisted for being visited too often, or when
//! its shape matches a structural trap:
//! - Excessive path depth (e.g., /a/b/c/d/e/f/g/h)
//! - Repetitive path patterns (e.g., /a/b/a/b/a/b)
//! - Extremely long URLs
//! - Calendar traps (infinite date pagination)

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

use crate::config::CrawlConfig;

/// Configuration for structural crawl trap detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrapDetectorConfig {
    /// Apply the structural heuristics at all
    pub enabled: bool,
    /// Maximum URL path depth (number of segments)
    pub max_path_depth: usize,
    /// Maximum URL length in characters
    pub max_url_length: usize,
    /// Maximum number of repeated path segments
    pub max_repeated_segments: usize,
}

impl TrapDetectorConfig {
    pub(crate) fn validate_into(&self, errors: &mut Vec<String>) {
        if self.max_path_depth == 0 {
            errors.push("trap_detector.max_path_depth must be positive".to_string());
        }
        if self.max_url_length == 0 {
            errors.push("trap_detector.max_url_length must be positive".to_string());
        }
        if self.max_repeated_segments == 0 {
            errors.push("trap_detector.max_repeated_segments must be positive".to_string());
        }
    }
}

impl Default for TrapDetectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_path_depth: 15,
            max_url_length: 2048,
            max_repeated_segments: 3,
        }
    }
}

/// Static blacklists plus structural heuristics.
///
/// Immutable after construction. The dynamic blacklist of over-visited URLs
/// lives in the crawl state and is passed in by the caller.
#[derive(Debug, Clone, Default)]
pub struct TrapRegistry {
    blacklisted_hosts: HashSet<String>,
    blacklisted_path_prefixes: Vec<String>,
    detector: TrapDetectorConfig,
}

impl TrapRegistry {
    /// Create a registry; hosts and path prefixes are lowercased
    pub fn new<H, P>(hosts: H, path_prefixes: P, detector: TrapDetectorConfig) -> Self
    where
        H: IntoIterator,
        H::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        Self {
            blacklisted_hosts: hosts
                .into_iter()
                .map(|h| h.as_ref().trim().to_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
            blacklisted_path_prefixes: path_prefixes
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            detector,
        }
    }

    /// Build a registry from crawl configuration
    pub fn from_config(config: &CrawlConfig) -> Self {
        Self::new(
            &config.blacklisted_hosts,
            &config.blacklisted_path_prefixes,
            config.trap_detector.clone(),
        )
    }

    /// Whether `url` is a crawler trap given the current dynamic `blacklist`
    pub fn is_crawler_trap(&self, url: &Url, blacklist: &HashSet<String>) -> bool {
        if let Some(host) = url.host_str() {
            if self.blacklisted_hosts.contains(&host.to_lowercase()) {
                return true;
            }
        }

        let path = url.path().to_lowercase();
        if self
            .blacklisted_path_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return true;
        }

        if blacklist.contains(url.as_str()) {
            return true;
        }

        self.detector.enabled && is_structural_trap(url, &self.detector)
    }
}

/// Detect if a URL's shape is likely a crawl trap
pub fn is_structural_trap(url: &Url, config: &TrapDetectorConfig) -> bool {
    if url.as_str().len() > config.max_url_length {
        return true;
    }

    let path = url.path();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if segments.len() > config.max_path_depth {
        return true;
    }

    if has_repetitive_pattern(&segments, config.max_repeated_segments) {
        return true;
    }

    is_calendar_trap(&segments)
}

fn has_repetitive_pattern(segments: &[&str], max_repeats: usize) -> bool {
    if segments.len() < 4 {
        return false;
    }

    for window_size in 1..=segments.len() / 2 {
        let repeats = segments
            .iter()
            .zip(segments.iter().skip(window_size))
            .filter(|(a, b)| a == b)
            .count();
        if repeats >= max_repeats {
            return true;
        }
    }

    false
}

// Matches runs like /2024/01/15 or /calendar/2024/01/15
fn is_calendar_trap(segments: &[&str]) -> bool {
    let mut consecutive_numbers = 0;
    for segment in segments {
        if segment.parse::<u32>().is_ok() {
            consecutive_numbers += 1;
            if consecutive_numbers >= 3 {
                return true;
            }
        } else {
            consecutive_numbers = 0;
        }
    }
    false
}
