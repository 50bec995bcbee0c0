//! Per-page processing pipeline
//!
//! One call handles one fetch result: usability gate, document parsing,
//! tokenization, link normalization, the crawl state update, and finally
//! the report write. Only the crawl state update takes the shared lock.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

use super::extractor::{DocumentParser, HtmlDocumentParser};
use super::fetcher::{FetchError, FetchResult};
use super::state::CrawlState;
use super::tokenizer::{tokenize_all, Tokenized};
use super::url_filter::{self, UrlError};
use crate::config::CrawlConfig;

/// Why a page contributed nothing
#[derive(Debug)]
pub enum SkipReason {
    /// Non-200, empty or oversized response
    Unusable(FetchError),
    /// Neither the final nor the requested URL parses, so links cannot be resolved
    InvalidPageUrl(UrlError),
}

/// Result of processing one fetch
#[derive(Debug)]
pub enum PageOutcome {
    /// Page was not processed at all
    Skipped(SkipReason),
    /// Content already seen; links are only present under the follow-links policy
    Duplicate { links: BTreeSet<String> },
    /// Page was recorded
    Processed {
        links: BTreeSet<String>,
        word_count: usize,
    },
}

impl PageOutcome {
    /// Links to hand to the frontier
    pub fn links(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::Skipped(_) => None,
            Self::Duplicate { links } | Self::Processed { links, .. } => Some(links),
        }
    }

    /// Consume the outcome, keeping only the links
    pub fn into_links(self) -> BTreeSet<String> {
        match self {
            Self::Skipped(_) => BTreeSet::new(),
            Self::Duplicate { links } | Self::Processed { links, .. } => links,
        }
    }
}

/// Turns fetch results into crawl state updates and outbound links
pub struct PageProcessor<P = HtmlDocumentParser> {
    state: Arc<CrawlState>,
    parser: P,
    max_page_size: usize,
    report_path: Option<PathBuf>,
    /// Held across snapshot and write so reports land on disk in state order
    report_writer: Mutex<()>,
}

impl PageProcessor<HtmlDocumentParser> {
    /// Processor using the HTML parser
    pub fn new(state: Arc<CrawlState>, config: &CrawlConfig) -> Self {
        Self::with_parser(state, config, HtmlDocumentParser::new())
    }
}

impl<P: DocumentParser> PageProcessor<P> {
    /// Processor with a custom document parser
    pub fn with_parser(state: Arc<CrawlState>, config: &CrawlConfig, parser: P) -> Self {
        Self {
            state,
            parser,
            max_page_size: config.max_page_size_bytes,
            report_path: config.report_path.clone(),
            report_writer: Mutex::new(()),
        }
    }

    /// Shared crawl state
    pub fn state(&self) -> &Arc<CrawlState> {
        &self.state
    }

    /// Process one fetch result
    pub fn process(&self, fetch: &FetchResult) -> PageOutcome {
        if let Err(e) = fetch.check_usable(self.max_page_size) {
            tracing::debug!(url = %fetch.requested_url, status = fetch.status_code, error = %e, "skipping page");
            return PageOutcome::Skipped(SkipReason::Unusable(e));
        }

        let page_url = match url_filter::parse(&fetch.final_url)
            .or_else(|_| url_filter::parse(&fetch.requested_url))
        {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(url = %fetch.final_url, error = %e, "skipping page with unparseable URL");
                return PageOutcome::Skipped(SkipReason::InvalidPageUrl(e));
            }
        };

        let document = self.parser.parse(&fetch.body);
        let base = effective_base(&page_url, document.base_href.as_deref());
        let page: Tokenized = tokenize_all(document.text.iter().map(String::as_str));
        let links = normalize_links(&base, &document.hrefs);

        let update = self.state.process_page(
            &fetch.requested_url,
            page_url.as_str(),
            &page,
            links.iter().map(String::as_str),
        );

        self.persist_report();

        if update.duplicate {
            PageOutcome::Duplicate {
                links: update.links,
            }
        } else {
            tracing::debug!(
                url = %page_url,
                words = page.word_count(),
                links = update.links.len(),
                "processed page"
            );
            PageOutcome::Processed {
                links: update.links,
                word_count: page.word_count(),
            }
        }
    }

    // Runs after the state lock is released; failures never stop the crawl.
    // The snapshot is taken under the writer lock, so whichever worker writes
    // last also writes the newest state.
    fn persist_report(&self) {
        let Some(path) = &self.report_path else {
            return;
        };
        let _writer = self.report_writer.lock();
        if let Err(e) = self.state.snapshot().write_to(path) {
            tracing::warn!(error = %e, "failed to persist crawl report");
        }
    }
}

/// `<base href>` resolved against the page URL, or the page URL itself
fn effective_base(page_url: &Url, base_href: Option<&str>) -> Url {
    match base_href.map(|href| url_filter::normalize(page_url, href)) {
        Some(Ok(base)) => base,
        Some(Err(e)) => {
            tracing::debug!(url = %page_url, error = %e, "ignoring malformed <base href>");
            page_url.clone()
        }
        None => page_url.clone(),
    }
}

/// Resolve every href against `base`; malformed ones are logged and dropped
fn normalize_links(base: &Url, hrefs: &[String]) -> Vec<String> {
    hrefs
        .iter()
        .filter_map(|href| match url_filter::normalize(base, href) {
            Ok(url) => Some(String::from(url)),
            Err(e) => {
                tracing::debug!(base = %base, error = %e, "dropping malformed link");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraping::extractor::ParsedDocument;

    struct FixedParser(ParsedDocument);

    impl DocumentParser for FixedParser {
        fn parse(&self, _body: &[u8]) -> ParsedDocument {
            self.0.clone()
        }
    }

    fn processor() -> PageProcessor {
        let config = CrawlConfig::default();
        PageProcessor::new(Arc::new(CrawlState::new(&config)), &config)
    }

    #[test]
    fn test_links_are_resolved_and_filtered() {
        let proc = processor();
        let fetch = FetchResult::ok(
            "http://x.edu/dir/page",
            r##"<p>Hello, World! 123</p>
                <a href="next#frag">n</a>
                <a href="/photo.JPG">p</a>
                <a href="mailto:me@x.edu">m</a>
                <a href="http://[bad">b</a>"##,
        );

        let outcome = proc.process(&fetch);
        let links: Vec<_> = outcome.into_links().into_iter().collect();
        assert_eq!(links, vec!["http://x.edu/dir/next"]);
        assert_eq!(proc.state().word_count("hello"), 1);
        assert_eq!(proc.state().word_count("world"), 1);
        assert_eq!(proc.state().word_count("123"), 0);
    }

    #[test]
    fn test_unusable_fetch_leaves_state_untouched() {
        let proc = processor();
        let mut fetch = FetchResult::ok("http://x.edu/", "<p>gone</p>");
        fetch.status_code = 404;

        let outcome = proc.process(&fetch);
        assert!(matches!(
            outcome,
            PageOutcome::Skipped(SkipReason::Unusable(FetchError::BadStatus(404)))
        ));
        assert!(outcome.links().is_none());
        assert_eq!(proc.state().snapshot(), CrawlState::new(&CrawlConfig::default()).snapshot());
    }

    #[test]
    fn test_oversized_header_rejected_before_parsing() {
        let proc = processor();
        let fetch = FetchResult::ok("http://x.edu/", "<p>big</p>")
            .with_header("Content-Length", "3000000");
        assert!(matches!(
            proc.process(&fetch),
            PageOutcome::Skipped(SkipReason::Unusable(FetchError::ContentTooLarge(3_000_000)))
        ));
        assert_eq!(proc.state().distinct_words(), 0);
    }

    #[test]
    fn test_base_href_used_for_resolution() {
        let config = CrawlConfig::default();
        let parser = FixedParser(ParsedDocument {
            base_href: Some("/mirror/".to_string()),
            hrefs: vec!["page.html".to_string()],
            text: vec!["mirror page".to_string()],
        });
        let proc = PageProcessor::with_parser(Arc::new(CrawlState::new(&config)), &config, parser);
        let links = proc.process(&FetchResult::ok("https://x.edu/a/b", "x")).into_links();
        assert!(links.contains("https://x.edu/mirror/page.html"));
    }

    #[test]
    fn test_redirect_counts_final_host() {
        let proc = processor();
        let fetch = FetchResult::ok("http://x.edu/old", "<p>moved</p>")
            .with_final_url("http://new.x.edu/here");
        proc.process(&fetch);
        assert_eq!(proc.state().subdomain_count("new.x.edu"), 1);
        assert_eq!(proc.state().visit_count("http://x.edu/old"), 1);
        assert_eq!(proc.state().longest_page().unwrap().url, "http://new.x.edu/here");
    }

    #[test]
    fn test_duplicate_page_outcome() {
        let proc = processor();
        proc.process(&FetchResult::ok("http://x.edu/a", "<p>same</p><a href='/z'>link</a>"));
        let outcome = proc.process(&FetchResult::ok("http://x.edu/b", "<p>same</p><a href='/y'>link</a>"));
        match outcome {
            PageOutcome::Duplicate { links } => assert!(links.is_empty()),
            other => panic!("Expected Duplicate, got {:?}", other),
        }
    }

    #[test]
    fn test_report_written_after_page() {
        let dir = tempfile::tempdir().unwrap();
        let config = CrawlConfig {
            report_path: Some(dir.path().join("report.txt")),
            ..Default::default()
        };
        let proc = PageProcessor::new(Arc::new(CrawlState::new(&config)), &config);
        proc.process(&FetchResult::ok("http://x.edu/a", "<p>report me</p>"));

        let text = std::fs::read_to_string(dir.path().join("report.txt")).unwrap();
        assert!(text.contains("Unique pages: 1"));
        assert!(text.contains("report, 1"));
        assert!(text.contains("x.edu, 1"));
    }

    #[test]
    fn test_report_matches_final_state_after_concurrent_workers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        let config = CrawlConfig {
            report_path: Some(path.clone()),
            ..Default::default()
        };
        let proc = Arc::new(PageProcessor::new(Arc::new(CrawlState::new(&config)), &config));

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let proc = Arc::clone(&proc);
                std::thread::spawn(move || {
                    for page in 0..40 {
                        let n = worker * 40 + page;
                        let body = format!("<p>page {}</p>", "pad ".repeat(n + 1));
                        let url = format!("http://w{}.x.edu/{}", worker, page);
                        proc.process(&FetchResult::ok(url, body));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let on_disk = std::fs::read_to_string(&path).unwrap();
        let report = proc.state().snapshot();
        assert_eq!(report.unique_urls, 320);
        assert_eq!(on_disk, report.to_string());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
