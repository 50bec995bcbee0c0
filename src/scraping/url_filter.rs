//! Link normalization and validation

use std::collections::HashSet;
use std::sync::OnceLock;
use thiserror::Error;
use url::Url;

use super::trap_detection::TrapRegistry;

/// Errors raised while turning an href into a crawlable URL
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL '{url}': {source}")]
    Parse {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("URL has no host: {0}")]
    MissingHost(String),
}

/// File extensions that never lead to an HTML page
const DENIED_EXTENSIONS: &[&str] = &[
    "css", "js", "bmp", "gif", "jpg", "jpeg", "ico", "png", "tif", "tiff", "mid", "mp2", "mp3",
    "mp4", "wav", "avi", "mov", "mpeg", "ram", "m4v", "mkv", "ogg", "ogv", "pdf", "ps", "eps",
    "tex", "ppt", "pptx", "doc", "docx", "xls", "xlsx", "names", "data", "dat", "exe", "bz2",
    "tar", "msi", "bin", "7z", "psd", "dmg", "iso", "epub", "dll", "cnf", "tgz", "sha1", "thmx",
    "mso", "arff", "rtf", "jar", "csv", "rm", "smil", "wmv", "swf", "wma", "zip", "rar", "gz",
];

fn denied_extensions() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| DENIED_EXTENSIONS.iter().copied().collect())
}

/// Parse an absolute URL, mapping failures to `UrlError`
pub fn parse(url: &str) -> Result<Url, UrlError> {
    Url::parse(url).map_err(|source| UrlError::Parse {
        url: url.to_string(),
        source,
    })
}

/// Resolve `href` against `base` and strip the fragment.
///
/// Host lowercasing and percent-encoding cleanup come from WHATWG URL
/// serialization, so normalizing an already-normalized URL is a no-op.
pub fn normalize(base: &Url, href: &str) -> Result<Url, UrlError> {
    let mut resolved = base.join(href.trim()).map_err(|source| UrlError::Parse {
        url: href.to_string(),
        source,
    })?;
    resolved.set_fragment(None);
    Ok(resolved)
}

/// `normalize` for string inputs
pub fn normalize_str(base: &str, href: &str) -> Result<String, UrlError> {
    let base = parse(base)?;
    normalize(&base, href).map(String::from)
}

/// Strip the fragment of an absolute URL string, e.g. to key the visit record
pub fn defragment(url: &str) -> Result<String, UrlError> {
    let mut parsed = parse(url)?;
    parsed.set_fragment(None);
    Ok(parsed.into())
}

/// Lowercased `host[:port]` of `url`; default ports are omitted
pub fn authority_of(url: &Url) -> Result<String, UrlError> {
    let host = url
        .host_str()
        .map(str::to_lowercase)
        .ok_or_else(|| UrlError::MissingHost(url.to_string()))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// Whether the scheme is exactly http or https
pub fn has_crawlable_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Whether the path ends in a non-HTML file extension (case-insensitive)
pub fn has_denied_extension(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    match path.rsplit_once('.') {
        Some((_, ext)) if !ext.contains('/') => denied_extensions().contains(ext),
        _ => false,
    }
}

/// Full link validation: scheme, extension, then crawler traps
pub fn is_valid_url(url: &Url, traps: &TrapRegistry, blacklist: &HashSet<String>) -> bool {
    has_crawlable_scheme(url)
        && url.host_str().is_some()
        && !has_denied_extension(url)
        && !traps.is_crawler_trap(url, blacklist)
}

/// `is_valid_url` for strings; anything that fails to parse is invalid
pub fn is_valid(url: &str, traps: &TrapRegistry, blacklist: &HashSet<String>) -> bool {
    match parse(url) {
        Ok(parsed) => is_valid_url(&parsed, traps, blacklist),
        Err(e) => {
            tracing::debug!(error = %e, "rejecting malformed URL");
            false
        }
    }
}
