//! Page-processing core of the crawler
//!
//! Turns one fetched page into crawl-wide statistics and a set of links worth
//! fetching next, while steering clear of crawler traps and duplicate content.
//!
//! Key components:
//! - `tokenizer`: ASCII word tokens plus a cheap content checksum
//! - `frequency`: crawl-wide word histogram with stop-word filtering
//! - `url_filter`: link resolution, fragment stripping and validation
//! - `TrapRegistry`: static host/path blacklists and structural trap heuristics
//! - `CrawlState`: the single lock-protected store of aggregate statistics
//! - `PolitenessLimiter`: per-host minimum delay between requests
//! - `PageProcessor`: runs a fetch result through all of the above

pub mod extractor;
pub mod fetcher;
pub mod frequency;
pub mod politeness;
pub mod report;
pub mod state;
pub mod tokenizer;
pub mod trap_detection;
pub mod url_filter;
pub mod worker;

pub use extractor::{DocumentParser, HtmlDocumentParser, ParsedDocument};
pub use fetcher::{FetchError, FetchResult};
pub use politeness::{FetchDecision, PolitenessLimiter};
pub use report::{CrawlReport, ReportError};
pub use state::{CrawlState, LongestPage, PageUpdate};
pub use tokenizer::{tokenize, ContentChecksum, Tokenized};
pub use trap_detection::{TrapDetectorConfig, TrapRegistry};
pub use url_filter::UrlError;
pub use worker::{PageOutcome, PageProcessor, SkipReason};
