//! Matching for the `~` operator
//!
//! `%` matches any run of characters and `_` exactly one; a backslash escapes
//! the next character. A pattern without wildcards is a substring test. All
//! matching is case-insensitive.

use lru::LruCache;
use regex::{Regex, RegexBuilder};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

const REGEX_CACHE_CAPACITY: usize = 200;

lazy_static::lazy_static! {
    static ref REGEX_LRU_CACHE: Mutex<LruCache<String, Arc<Regex>>> = Mutex::new(
        LruCache::new(NonZeroUsize::new(REGEX_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    );
}

/// Returns true when `text` matches `pattern`.
pub fn like_match(text: &str, pattern: &str) -> bool {
    if let Some(result) = fast_path(text, pattern) {
        return result;
    }
    match cached_regex(pattern) {
        Some(regex) => regex.is_match(text),
        None => false,
    }
}

fn has_wildcards(pattern: &str) -> bool {
    pattern.contains(['%', '_', '\\'])
}

/// Wildcard-free and single-`%` patterns, answered without a regex.
fn fast_path(text: &str, pattern: &str) -> Option<bool> {
    let text = text.to_lowercase();
    let pattern = pattern.to_lowercase();

    if !has_wildcards(&pattern) {
        return Some(text.contains(&pattern));
    }

    if let Some(prefix) = pattern.strip_suffix('%') {
        if !has_wildcards(prefix) {
            return Some(text.starts_with(prefix));
        }
    }

    if let Some(suffix) = pattern.strip_prefix('%') {
        if !has_wildcards(suffix) {
            return Some(text.ends_with(suffix));
        }
    }

    None
}

fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');

    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => regex.push_str(&regex::escape(&escaped.to_string())),
                None => regex.push_str(r"\\"),
            },
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
    }

    regex.push('$');
    regex
}

fn cached_regex(pattern: &str) -> Option<Arc<Regex>> {
    if let Ok(mut cache) = REGEX_LRU_CACHE.lock() {
        if let Some(regex) = cache.get(pattern) {
            return Some(Arc::clone(regex));
        }
    }

    let compiled = RegexBuilder::new(&like_to_regex(pattern))
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .ok()
        .map(Arc::new)?;

    if let Ok(mut cache) = REGEX_LRU_CACHE.lock() {
        cache.put(pattern.to_string(), Arc::clone(&compiled));
    }
    Some(compiled)
}
