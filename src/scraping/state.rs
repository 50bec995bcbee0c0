//! Shared crawl state
//!
//! `CrawlState` owns every crawl-wide aggregate: the visit record, the dynamic
//! blacklist, the word histogram, the longest page, per-host page counts and
//! the set of content checksums already seen. All of them sit behind a single
//! mutex, and `process_page` holds it for the whole update of one page, so a
//! snapshot never observes half of a page.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use url::Url;

use super::frequency::{self, WordFrequency};
use super::report::CrawlReport;
use super::tokenizer::{ContentChecksum, Tokenized};
use super::trap_detection::TrapRegistry;
use super::url_filter;
use crate::config::{BlacklistSnapshot, CrawlConfig, DuplicatePolicy};

/// Longest page seen so far
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LongestPage {
    pub url: String,
    pub word_count: usize,
}

/// Result of recording one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageUpdate {
    /// The page's content checksum was already seen; nothing was recorded
    pub duplicate: bool,
    /// The page URL crossed the visit limit during this update
    pub newly_blacklisted: bool,
    /// Valid, deduplicated outbound links
    pub links: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct StateInner {
    url_record: HashMap<String, u64>,
    blacklist: HashSet<String>,
    word_frequency: WordFrequency,
    longest_page: Option<LongestPage>,
    subdomain_counts: HashMap<String, u64>,
    checksums: HashSet<ContentChecksum>,
    pages_processed: u64,
    duplicates_skipped: u64,
}

impl StateInner {
    /// Count a visit; returns true when the URL was blacklisted by this visit
    fn record_visit(&mut self, key: &str, max_visits: u64, defer_blacklist: bool) -> (u64, bool) {
        let count = self.url_record.entry(key.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        let over_limit = count > max_visits;
        let newly = over_limit && !self.blacklist.contains(key);
        if newly && !defer_blacklist {
            self.blacklist.insert(key.to_string());
        }
        (count, newly)
    }

    fn filter_links<'a, I>(&self, links: I, traps: &TrapRegistry) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        links
            .into_iter()
            .filter(|link| url_filter::is_valid(link, traps, &self.blacklist))
            .map(str::to_string)
            .collect()
    }
}

/// Crawl-wide aggregate state shared by every worker
pub struct CrawlState {
    traps: TrapRegistry,
    max_visits: u64,
    duplicate_policy: DuplicatePolicy,
    blacklist_snapshot: BlacklistSnapshot,
    common_words_reported: usize,
    inner: Mutex<StateInner>,
}

impl CrawlState {
    /// Create an empty crawl state from configuration
    pub fn new(config: &CrawlConfig) -> Self {
        Self {
            traps: TrapRegistry::from_config(config),
            max_visits: u64::from(config.max_visits_per_url),
            duplicate_policy: config.duplicate_policy,
            blacklist_snapshot: config.blacklist_snapshot,
            common_words_reported: config.common_words_reported,
            inner: Mutex::new(StateInner::default()),
        }
    }

    /// Record one page and return the links worth crawling next.
    ///
    /// Atomic with respect to every other call: the checksum check, the
    /// statistics update and the link filtering happen under one lock.
    pub fn process_page<'a, I>(
        &self,
        url: &str,
        final_url: &str,
        page: &Tokenized,
        links: I,
    ) -> PageUpdate
    where
        I: IntoIterator<Item = &'a str>,
    {
        let key = visit_key(url);
        let mut inner = self.inner.lock();

        if inner.checksums.contains(&page.checksum) {
            inner.duplicates_skipped += 1;
            let links = match self.duplicate_policy {
                DuplicatePolicy::DropLinks => BTreeSet::new(),
                DuplicatePolicy::FollowLinks => inner.filter_links(links, &self.traps),
            };
            tracing::debug!(url = %url, checksum = page.checksum.0, "duplicate content");
            return PageUpdate {
                duplicate: true,
                newly_blacklisted: false,
                links,
            };
        }
        inner.checksums.insert(page.checksum);
        inner.pages_processed += 1;

        let word_count = page.word_count();
        let is_longest = inner
            .longest_page
            .as_ref()
            .map_or(true, |longest| word_count > longest.word_count);
        if is_longest {
            inner.longest_page = Some(LongestPage {
                url: final_url.to_string(),
                word_count,
            });
        }

        frequency::accumulate(&page.tokens, &mut inner.word_frequency);

        let defer = self.blacklist_snapshot == BlacklistSnapshot::BeforeUpdate;
        let (visits, newly_blacklisted) = inner.record_visit(&key, self.max_visits, defer);
        if newly_blacklisted {
            tracing::info!(url = %key, visits, "visit limit exceeded, blacklisting");
        }

        match subdomain_of(final_url).or_else(|| subdomain_of(url)) {
            Some(host) => *inner.subdomain_counts.entry(host).or_insert(0) += 1,
            None => tracing::debug!(url = %final_url, "page has no host, not counted per subdomain"),
        }

        let links = inner.filter_links(links, &self.traps);

        if newly_blacklisted && defer {
            inner.blacklist.insert(key);
        }

        PageUpdate {
            duplicate: false,
            newly_blacklisted,
            links,
        }
    }

    /// Count a visit to `url` without a page body, e.g. a re-discovered link.
    ///
    /// Returns the new visit count.
    pub fn record_visit(&self, url: &str) -> u64 {
        let key = visit_key(url);
        let mut inner = self.inner.lock();
        let (visits, newly) = inner.record_visit(&key, self.max_visits, false);
        if newly {
            tracing::info!(url = %key, visits, "visit limit exceeded, blacklisting");
        }
        visits
    }

    /// Whether `url` is a crawler trap under the current blacklist
    pub fn is_crawler_trap(&self, url: &str) -> bool {
        match url_filter::parse(url) {
            Ok(parsed) => self.is_crawler_trap_url(&parsed),
            Err(e) => {
                tracing::debug!(error = %e, "cannot check malformed URL for traps");
                false
            }
        }
    }

    /// `is_crawler_trap` for an already parsed URL
    pub fn is_crawler_trap_url(&self, url: &Url) -> bool {
        let inner = self.inner.lock();
        self.traps.is_crawler_trap(url, &inner.blacklist)
    }

    /// Whether `url` may be crawled: http(s), not a file download, not a trap
    pub fn is_valid(&self, url: &str) -> bool {
        let inner = self.inner.lock();
        url_filter::is_valid(url, &self.traps, &inner.blacklist)
    }

    /// Visits recorded for `url`
    pub fn visit_count(&self, url: &str) -> u64 {
        let key = visit_key(url);
        self.inner.lock().url_record.get(&key).copied().unwrap_or(0)
    }

    /// Whether `url` was blacklisted for being visited too often
    pub fn is_blacklisted(&self, url: &str) -> bool {
        let key = visit_key(url);
        self.inner.lock().blacklist.contains(&key)
    }

    /// Number of distinct URLs visited
    pub fn unique_url_count(&self) -> usize {
        self.inner.lock().url_record.len()
    }

    /// Longest page so far
    pub fn longest_page(&self) -> Option<LongestPage> {
        self.inner.lock().longest_page.clone()
    }

    /// Occurrences of `word` across accepted pages
    pub fn word_count(&self, word: &str) -> u64 {
        self.inner.lock().word_frequency.get(word).copied().unwrap_or(0)
    }

    /// Number of distinct words in the histogram
    pub fn distinct_words(&self) -> usize {
        self.inner.lock().word_frequency.len()
    }

    /// Pages recorded for `host`
    pub fn subdomain_count(&self, host: &str) -> u64 {
        self.inner
            .lock()
            .subdomain_counts
            .get(&host.to_lowercase())
            .copied()
            .unwrap_or(0)
    }

    /// Consistent copy of the reportable statistics
    pub fn snapshot(&self) -> CrawlReport {
        let inner = self.inner.lock();
        let mut subdomains: Vec<(String, u64)> = inner
            .subdomain_counts
            .iter()
            .map(|(host, count)| (host.clone(), *count))
            .collect();
        subdomains.sort();

        CrawlReport {
            unique_urls: inner.url_record.len(),
            longest_page: inner.longest_page.clone(),
            top_words: frequency::top_words(&inner.word_frequency, self.common_words_reported),
            subdomains,
            pages_processed: inner.pages_processed,
            duplicates_skipped: inner.duplicates_skipped,
            blacklisted_urls: inner.blacklist.len(),
        }
    }
}

/// Key of the visit record: the defragmented URL, or the raw string if it does not parse
fn visit_key(url: &str) -> String {
    url_filter::defragment(url).unwrap_or_else(|_| url.to_string())
}

fn subdomain_of(url: &str) -> Option<String> {
    url_filter::parse(url)
        .ok()
        .and_then(|parsed| url_filter::authority_of(&parsed).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraping::tokenizer::tokenize;
    use std::sync::Arc;

    fn state_with(config: CrawlConfig) -> CrawlState {
        CrawlState::new(&config)
    }

    fn state() -> CrawlState {
        state_with(CrawlConfig::default())
    }

    #[test]
    fn test_first_page_is_recorded() {
        let state = state();
        let page = tokenize("Polite crawlers respect robots");
        let update = state.process_page(
            "http://x.edu/a",
            "http://x.edu/a",
            &page,
            ["http://x.edu/b", "http://x.edu/c.pdf", "ftp://x.edu/d"],
        );

        assert!(!update.duplicate);
        assert_eq!(update.links.into_iter().collect::<Vec<_>>(), vec!["http://x.edu/b"]);
        assert_eq!(state.visit_count("http://x.edu/a"), 1);
        assert_eq!(state.unique_url_count(), 1);
        assert_eq!(state.word_count("crawlers"), 1);
        assert_eq!(state.subdomain_count("x.edu"), 1);
        assert_eq!(
            state.longest_page(),
            Some(LongestPage {
                url: "http://x.edu/a".to_string(),
                word_count: 4
            })
        );
    }

    #[test]
    fn test_duplicate_content_records_nothing() {
        let state = state();
        let page = tokenize("same words on both pages");
        state.process_page("http://x.edu/a", "http://x.edu/a", &page, ["http://x.edu/n"]);

        let update = state.process_page(
            "http://x.edu/b",
            "http://x.edu/b",
            &page,
            ["http://x.edu/m"],
        );
        assert!(update.duplicate);
        assert!(update.links.is_empty());
        assert_eq!(state.word_count("words"), 1);
        assert_eq!(state.visit_count("http://x.edu/b"), 0);
        assert_eq!(state.longest_page().unwrap().url, "http://x.edu/a");
        assert_eq!(state.snapshot().duplicates_skipped, 1);
    }

    #[test]
    fn test_duplicate_follow_links_policy() {
        let state = state_with(CrawlConfig {
            duplicate_policy: DuplicatePolicy::FollowLinks,
            ..Default::default()
        });
        let page = tokenize("mirror content");
        state.process_page("http://x.edu/a", "http://x.edu/a", &page, std::iter::empty());
        let update = state.process_page(
            "http://mirror.x.edu/a",
            "http://mirror.x.edu/a",
            &page,
            ["http://x.edu/next", "http://x.edu/img.png"],
        );
        assert!(update.duplicate);
        assert_eq!(update.links.len(), 1);
        assert_eq!(state.subdomain_count("mirror.x.edu"), 0);
    }

    #[test]
    fn test_blacklisted_after_fifth_visit() {
        let state = state();
        for i in 1..=5u32 {
            assert!(!state.is_blacklisted("http://x.edu/a"), "blacklisted before visit {}", i);
            let page = tokenize(&format!("visit number {}", "v".repeat(i as usize + 1)));
            state.process_page("http://x.edu/a", "http://x.edu/a", &page, std::iter::empty());
            assert_eq!(state.visit_count("http://x.edu/a"), u64::from(i));
        }
        assert!(state.is_blacklisted("http://x.edu/a"));
        assert!(!state.is_valid("http://x.edu/a"));
        assert!(state.is_crawler_trap("http://x.edu/a"));

        // Blacklisting is permanent
        let page = tokenize("a sixth distinct page body");
        state.process_page("http://x.edu/a", "http://x.edu/a", &page, std::iter::empty());
        assert!(state.is_blacklisted("http://x.edu/a"));
        assert_eq!(state.visit_count("http://x.edu/a"), 6);
    }

    #[test]
    fn test_visit_key_ignores_fragment() {
        let state = state();
        state.record_visit("http://x.edu/a#one");
        state.record_visit("http://x.edu/a#two");
        assert_eq!(state.visit_count("http://x.edu/a"), 2);
        assert_eq!(state.unique_url_count(), 1);
    }

    fn fifth_visit_links(snapshot: BlacklistSnapshot) -> PageUpdate {
        let state = state_with(CrawlConfig {
            blacklist_snapshot: snapshot,
            ..Default::default()
        });
        for _ in 0..4 {
            state.record_visit("http://x.edu/a");
        }
        let page = tokenize("self referencing page");
        state.process_page(
            "http://x.edu/a",
            "http://x.edu/a",
            &page,
            ["http://x.edu/a", "http://x.edu/b"],
        )
    }

    #[test]
    fn test_self_link_kept_with_before_update_snapshot() {
        let update = fifth_visit_links(BlacklistSnapshot::BeforeUpdate);
        assert!(update.newly_blacklisted);
        assert!(update.links.contains("http://x.edu/a"));
        assert!(update.links.contains("http://x.edu/b"));
    }

    #[test]
    fn test_self_link_dropped_with_after_update_snapshot() {
        let update = fifth_visit_links(BlacklistSnapshot::AfterUpdate);
        assert!(update.newly_blacklisted);
        assert!(!update.links.contains("http://x.edu/a"));
        assert!(update.links.contains("http://x.edu/b"));
    }

    #[test]
    fn test_longest_page_requires_strictly_more_words() {
        let state = state();
        state.process_page("http://x.edu/1", "http://x.edu/1", &tokenize("one two"), std::iter::empty());
        state.process_page("http://x.edu/2", "http://x.edu/2", &tokenize("three four"), std::iter::empty());
        assert_eq!(state.longest_page().unwrap().url, "http://x.edu/1");
        state.process_page("http://x.edu/3", "http://x.edu/3", &tokenize("five six seven"), std::iter::empty());
        assert_eq!(state.longest_page().unwrap().word_count, 3);
    }

    #[test]
    fn test_subdomain_uses_final_url_host() {
        let state = state();
        state.process_page(
            "http://x.edu/old",
            "https://Vision.X.edu/new",
            &tokenize("redirected"),
            std::iter::empty(),
        );
        assert_eq!(state.subdomain_count("vision.x.edu"), 1);
        assert_eq!(state.subdomain_count("x.edu"), 0);
    }

    #[test]
    fn test_subdomain_keeps_explicit_port() {
        let state = state();
        let page = |url: &str, text: &str| {
            state.process_page(url, url, &tokenize(text), std::iter::empty());
        };
        page("http://x.edu/a", "plain");
        page("http://x.edu:80/b", "default port");
        page("http://x.edu:8080/c", "alternate port");

        assert_eq!(state.subdomain_count("x.edu"), 2);
        assert_eq!(state.subdomain_count("x.edu:8080"), 1);
        assert_eq!(state.snapshot().subdomains.len(), 2);
    }

    #[test]
    fn test_links_are_deduplicated() {
        let state = state();
        let update = state.process_page(
            "http://x.edu/a",
            "http://x.edu/a",
            &tokenize("links"),
            ["http://x.edu/b", "http://x.edu/b", "http://x.edu/c"],
        );
        assert_eq!(update.links.len(), 2);
    }

    #[test]
    fn test_concurrent_visits_are_not_lost() {
        let state = Arc::new(state_with(CrawlConfig {
            max_visits_per_url: 1_000_000,
            ..Default::default()
        }));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let page = tokenize(&format!("thread{} page{}", t, "z".repeat(i + 1)));
                        state.process_page("http://x.edu/hot", "http://x.edu/hot", &page, std::iter::empty());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let report = state.snapshot();
        assert_eq!(
            state.visit_count("http://x.edu/hot") + report.duplicates_skipped,
            400
        );
        assert_eq!(report.pages_processed + report.duplicates_skipped, 400);
        assert_eq!(state.subdomain_count("x.edu"), report.pages_processed);
    }
}
