//! Crawl report: snapshot of the aggregate statistics and its text file
//!
//! Snapshots are taken under the crawl state lock; writing them happens
//! afterwards, so the file is only eventually consistent with the state.

use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use super::state::LongestPage;

/// Errors while persisting a report
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Point-in-time copy of the crawl statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    /// Distinct URLs visited
    pub unique_urls: usize,
    /// Page with the most words
    pub longest_page: Option<LongestPage>,
    /// Most frequent words, by descending count
    pub top_words: Vec<(String, u64)>,
    /// Pages per host, sorted by host
    pub subdomains: Vec<(String, u64)>,
    /// Pages recorded
    pub pages_processed: u64,
    /// Pages skipped as duplicate content
    pub duplicates_skipped: u64,
    /// URLs blacklisted for exceeding the visit limit
    pub blacklisted_urls: usize,
}

impl fmt::Display for CrawlReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Unique pages: {}", self.unique_urls)?;
        match &self.longest_page {
            Some(page) => writeln!(f, "Longest page: {} - {} words", page.url, page.word_count)?,
            None => writeln!(f, "Longest page: none")?,
        }
        writeln!(f, "Pages processed: {}", self.pages_processed)?;
        writeln!(f, "Duplicate pages skipped: {}", self.duplicates_skipped)?;
        writeln!(f, "Blacklisted URLs: {}", self.blacklisted_urls)?;

        writeln!(f)?;
        writeln!(f, "Top {} words:", self.top_words.len())?;
        for (word, count) in &self.top_words {
            writeln!(f, "{}, {}", word, count)?;
        }

        writeln!(f)?;
        writeln!(f, "Subdomains ({}):", self.subdomains.len())?;
        for (host, count) in &self.subdomains {
            writeln!(f, "{}, {}", host, count)?;
        }
        Ok(())
    }
}

impl CrawlReport {
    /// Write the text report to `path`.
    ///
    /// The report goes to a fresh temporary file in the same directory, which
    /// then replaces `path`, so readers never see a partial report. Concurrent
    /// writers never share a temporary file; ordering between them is the
    /// caller's concern.
    pub fn write_to(&self, path: &Path) -> Result<(), ReportError> {
        let io_err = |source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                std::fs::create_dir_all(parent).map_err(io_err)?;
                parent
            }
            None => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(self.to_string().as_bytes()).map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CrawlReport {
        CrawlReport {
            unique_urls: 3,
            longest_page: Some(LongestPage {
                url: "http://x.edu/long".to_string(),
                word_count: 120,
            }),
            top_words: vec![("crawler".to_string(), 9), ("polite".to_string(), 4)],
            subdomains: vec![("a.x.edu".to_string(), 2), ("x.edu".to_string(), 1)],
            pages_processed: 3,
            duplicates_skipped: 1,
            blacklisted_urls: 0,
        }
    }

    #[test]
    fn test_text_layout() {
        let text = sample().to_string();
        assert!(text.starts_with("Unique pages: 3\n"));
        assert!(text.contains("Longest page: http://x.edu/long - 120 words"));
        assert!(text.contains("Top 2 words:\ncrawler, 9\npolite, 4\n"));
        assert!(text.contains("Subdomains (2):\na.x.edu, 2\nx.edu, 1\n"));
    }

    #[test]
    fn test_empty_report() {
        let text = CrawlReport::default().to_string();
        assert!(text.contains("Longest page: none"));
        assert!(text.contains("Top 0 words:"));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.txt");
        sample().write_to(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, sample().to_string());

        let entries = std::fs::read_dir(dir.path().join("out")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_rewrite_replaces_previous_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        sample().write_to(&path).unwrap();
        CrawlReport::default().write_to(&path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            CrawlReport::default().to_string()
        );
    }

    #[test]
    fn test_serializes_to_toml() {
        let text = toml::to_string(&sample()).unwrap();
        let value: toml::Value = toml::from_str(&text).unwrap();
        assert_eq!(value["unique_urls"].as_integer(), Some(3));
        assert_eq!(value["duplicates_skipped"].as_integer(), Some(1));
        assert_eq!(
            value["longest_page"]["url"].as_str(),
            Some("http://x.edu/long")
        );
        assert_eq!(value["top_words"][0][0].as_str(), Some("crawler"));
        assert_eq!(value["subdomains"][1][1].as_integer(), Some(1));
    }
}
