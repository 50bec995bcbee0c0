//! Word tokenization and content checksums
//!
//! A token is a maximal run of ASCII alphanumeric characters, lowercased.
//! Every other character (punctuation, whitespace, any non-ASCII letter or
//! digit) ends the current token.
//!
//! The content checksum is the sum of the byte values of every character that
//! ends up in a token. It is a cheap fingerprint, not a hash: any two texts
//! whose tokens contain the same multiset of characters collide (anagrams,
//! reordered words, "ab" vs "ba"). Duplicate detection built on it is
//! best-effort and accepts those false positives.

use std::ops::AddAssign;

/// Cheap, non-cryptographic fingerprint of tokenized text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentChecksum(pub u64);

impl AddAssign for ContentChecksum {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}

/// Tokens of a text plus their checksum
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokenized {
    pub tokens: Vec<String>,
    pub checksum: ContentChecksum,
}

impl Tokenized {
    /// Number of words on the page
    pub fn word_count(&self) -> usize {
        self.tokens.len()
    }

    /// Append another tokenized chunk, e.g. the next visible-text string of a page
    pub fn extend(&mut self, other: Tokenized) {
        self.tokens.extend(other.tokens);
        self.checksum += other.checksum;
    }
}

/// Split `text` into lowercase ASCII alphanumeric tokens.
///
/// Runs in O(len(text)) and is deterministic.
pub fn tokenize(text: &str) -> Tokenized {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut checksum = ContentChecksum::default();

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            let lower = c.to_ascii_lowercase();
            checksum += ContentChecksum(lower as u64);
            current.push(lower);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    Tokenized { tokens, checksum }
}

/// Tokenize a stream of text fragments as one page
pub fn tokenize_all<'a, I>(fragments: I) -> Tokenized
where
    I: IntoIterator<Item = &'a str>,
{
    let mut page = Tokenized::default();
    for fragment in fragments {
        page.extend(tokenize(fragment));
    }
    page
}
