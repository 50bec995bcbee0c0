//! Crawl-wide word frequency histogram

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Word -> number of occurrences across every accepted page
pub type WordFrequency = HashMap<String, u64>;

/// English stop words excluded from the histogram
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "aren't", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can't", "cannot", "could", "couldn't", "did", "didn't", "do", "does",
    "doesn't", "doing", "don't", "down", "during", "each", "few", "for", "from", "further",
    "had", "hadn't", "has", "hasn't", "have", "haven't", "having", "he", "he'd", "he'll",
    "he's", "her", "here", "here's", "hers", "herself", "him", "himself", "his", "how",
    "how's", "i", "i'd", "i'll", "i'm", "i've", "if", "in", "into", "is", "isn't", "it",
    "it's", "its", "itself", "let's", "me", "more", "most", "mustn't", "my", "myself", "no",
    "nor", "not", "of", "off", "on", "once", "only", "or", "other", "ought", "our", "ours",
    "ourselves", "out", "over", "own", "same", "shan't", "she", "she'd", "she'll", "she's",
    "should", "shouldn't", "so", "some", "such", "than", "that", "that's", "the", "their",
    "theirs", "them", "themselves", "then", "there", "there's", "these", "they", "they'd",
    "they'll", "they're", "they've", "this", "those", "through", "to", "too", "under",
    "until", "up", "very", "was", "wasn't", "we", "we'd", "we'll", "we're", "we've", "were",
    "weren't", "what", "what's", "when", "when's", "where", "where's", "which", "while",
    "who", "who's", "whom", "why", "why's", "with", "won't", "would", "wouldn't", "you",
    "you'd", "you'll", "you're", "you've", "your", "yours", "yourself", "yourselves",
    // Contraction fragments left behind by the tokenizer ("don't" -> "don", "t")
    "aren", "couldn", "didn", "doesn", "don", "hadn", "hasn", "haven", "isn", "ll", "mustn",
    "re", "shan", "shouldn", "ve", "wasn", "weren", "won", "wouldn",
];

fn stop_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Whether `token` is a stop word
pub fn is_stop_word(token: &str) -> bool {
    stop_words().contains(token)
}

/// Whether a token is worth counting: not a stop word, longer than one
/// character and not purely numeric
pub fn is_countable(token: &str) -> bool {
    token.len() > 1 && !token.bytes().all(|b| b.is_ascii_digit()) && !is_stop_word(token)
}

/// Fold `tokens` into `histogram`, skipping uncountable tokens.
///
/// Entries are only ever added or incremented.
pub fn accumulate<S: AsRef<str>>(tokens: &[S], histogram: &mut WordFrequency) {
    for token in tokens {
        let token = token.as_ref();
        if !is_countable(token) {
            continue;
        }
        match histogram.get_mut(token) {
            Some(count) => *count += 1,
            None => {
                histogram.insert(token.to_string(), 1);
            }
        }
    }
}

/// The `n` most frequent words, by descending count then ascending word
pub fn top_words(histogram: &WordFrequency, n: usize) -> Vec<(String, u64)> {
    let mut entries: Vec<(&String, &u64)> = histogram.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    entries
        .into_iter()
        .take(n)
        .map(|(word, count)| (word.clone(), *count))
        .collect()
}
