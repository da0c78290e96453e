// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Keyword extraction for memory recall and write-back.
//!
//! Tokens are runs of ASCII alphanumerics plus `_` and `-`, with any
//! non-ASCII codepoint also treated as a token character so CJK and other
//! scripts survive extraction.  Tokens are case-folded, filtered by length
//! and stopword, deduplicated in order of first appearance, and capped.

const MAX_KEYWORDS: usize = 20;
const MIN_LEN: usize = 3;

/// Sorted for binary search.
const STOPWORDS: &[&str] = &[
    "about", "after", "all", "also", "and", "any", "are", "because", "been",
    "before", "being", "between", "both", "but", "can", "could", "did", "does",
    "doing", "down", "during", "each", "few", "for", "from", "further", "had",
    "has", "have", "having", "her", "here", "him", "his", "how", "into", "its",
    "just", "more", "most", "not", "now", "off", "once", "only", "other",
    "our", "out", "over", "own", "same", "she", "should", "some", "such",
    "than", "that", "the", "their", "them", "then", "there", "these", "they",
    "this", "those", "through", "too", "under", "until", "very", "was", "were",
    "what", "when", "where", "which", "while", "who", "whom", "why", "will",
    "with", "would", "you", "your",
];

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}

fn is_stopword(word: &str) -> bool {
    STOPWORDS.binary_search(&word).is_ok()
}

/// Extract up to twenty keywords from `text`.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for raw in text.split(|c| !is_token_char(c)) {
        if out.len() >= MAX_KEYWORDS {
            break;
        }
        if raw.is_empty() {
            continue;
        }
        let word = raw.to_lowercase();
        if word.chars().count() < MIN_LEN {
            continue;
        }
        if is_stopword(&word) {
            continue;
        }
        if out.contains(&word) {
            continue;
        }
        out.push(word);
    }
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
