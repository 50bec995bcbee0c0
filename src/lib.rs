//! CrawlCore: page-processing core for a polite, trap-avoiding web crawler
//!
//! Given fetched pages, it:
//! - Extracts and normalizes outbound links
//! - Filters out crawler traps, non-HTML file types and blacklisted hosts/paths
//! - Skips near-duplicate content using a cheap checksum
//! - Maintains crawl-wide statistics (unique URLs, longest page, word
//!   frequencies, pages per subdomain) safely across worker threads
//! - Enforces a per-host politeness delay for the fetch layer

pub mod config;
pub mod scraping;

pub use config::Config;
pub use scraping::{CrawlState, PageOutcome, PageProcessor, PolitenessLimiter};
