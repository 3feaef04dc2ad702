use dashmap::DashMap;
use memchr::memmem::Finder;
use once_cell::sync::Lazy;
use regex::bytes::{Regex, RegexBuilder};
use std::sync::Arc;
use tracing::debug;

use crate::errors::{ScanError, ScanResult};
use crate::metrics::ScanMetrics;

const SIMPLE_PATTERN_THRESHOLD: usize = 32;

/// Compiled strategies keyed by pattern text and case sensitivity.
static PATTERN_CACHE: Lazy<DashMap<(String, bool), MatchStrategy>> = Lazy::new(DashMap::new);

/// Strategy for pattern matching
#[derive(Debug, Clone)]
pub enum MatchStrategy {
    Literal(Arc<Finder<'static>>),
    Regex(Arc<Regex>),
}

impl MatchStrategy {
    fn compile(pattern: &str, ignore_case: bool) -> ScanResult<Self> {
        if !ignore_case && PatternMatcher::is_simple_pattern(pattern) {
            return Ok(Self::Literal(Arc::new(
                Finder::new(pattern.as_bytes()).into_owned(),
            )));
        }
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|e| ScanError::invalid_pattern(format!("{pattern}: {e}")))?;
        Ok(Self::Regex(Arc::new(regex)))
    }

    fn find_into(&self, haystack: &[u8], out: &mut Vec<(usize, usize)>) {
        match self {
            MatchStrategy::Literal(finder) => {
                let len = finder.needle().len();
                out.extend(finder.find_iter(haystack).map(|start| (start, start + len)));
            }
            MatchStrategy::Regex(regex) => {
                out.extend(
                    regex
                        .find_iter(haystack)
                        .filter(|m| !m.is_empty())
                        .map(|m| (m.start(), m.end())),
                );
            }
        }
    }
}

/// Finds byte ranges matching any of a set of patterns
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    strategies: Vec<MatchStrategy>,
    metrics: ScanMetrics,
}

impl PatternMatcher {
    /// Compiles `patterns`. Empty patterns are skipped, so a matcher built
    /// from none matches nothing.
    pub fn new(patterns: &[String], ignore_case: bool) -> ScanResult<Self> {
        Self::with_metrics(patterns, ignore_case, ScanMetrics::new())
    }

    /// Creates a new PatternMatcher recording cache lookups into `metrics`
    pub fn with_metrics(
        patterns: &[String],
        ignore_case: bool,
        metrics: ScanMetrics,
    ) -> ScanResult<Self> {
        let mut strategies = Vec::with_capacity(patterns.len());

        for pattern in patterns.iter().filter(|p| !p.is_empty()) {
            let key = (pattern.clone(), ignore_case);
            let strategy = if let Some(entry) = PATTERN_CACHE.get(&key) {
                metrics.record_cache_operation(true);
                entry.clone()
            } else {
                let strategy = MatchStrategy::compile(pattern, ignore_case)?;
                debug!("Compiled pattern {:?} as {:?}", pattern, strategy_kind(&strategy));
                metrics.record_cache_operation(false);
                PATTERN_CACHE.insert(key, strategy.clone());
                strategy
            };
            strategies.push(strategy);
        }

        Ok(Self {
            strategies,
            metrics,
        })
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Determines if a pattern can use plain substring search
    fn is_simple_pattern(pattern: &str) -> bool {
        pattern.len() < SIMPLE_PATTERN_THRESHOLD
            && !pattern.contains(|c: char| c.is_ascii_punctuation() && c != '_' && c != '-')
    }

    /// Finds all matches in `haystack` as `(start, end)` byte offsets, sorted by start
    pub fn find_matches(&self, haystack: &[u8]) -> Vec<(usize, usize)> {
        let mut matches = Vec::new();
        for strategy in &self.strategies {
            strategy.find_into(haystack, &mut matches);
        }
        if self.strategies.len() > 1 {
            matches.sort_unstable();
            matches.dedup();
        }
        matches
    }
}

fn strategy_kind(strategy: &MatchStrategy) -> &'static str {
    match strategy {
        MatchStrategy::Literal(_) => "literal",
        MatchStrategy::Regex(_) => "regex",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_simple_pattern_matching() {
        let matcher = PatternMatcher::new(&patterns(&["test"]), false).unwrap();
        let text = b"this is a test string with test pattern";
        let matches = matcher.find_matches(text);
        assert_eq!(matches.len(), 2);

        // Verify the exact positions by checking the matched text
        assert_eq!(&text[matches[0].0..matches[0].1], b"test");
        assert_eq!(&text[matches[1].0..matches[1].1], b"test");
    }

    #[test]
    fn test_regex_pattern_matching() {
        let matcher = PatternMatcher::new(&patterns(&[r"\btest\w+"]), false).unwrap();
        let matches = matcher.find_matches(b"testing tests tested");
        assert_eq!(matches.len(), 3);
    }

    #[test]
    fn test_multiple_patterns_sorted() {
        let matcher = PatternMatcher::new(&patterns(&["test", r"\bword\b"]), false).unwrap();
        let text = b"test this word and test another word";
        let matches = matcher.find_matches(text);
        assert_eq!(matches.len(), 4);
        assert!(matches.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[test]
    fn test_ignore_case() {
        let matcher = PatternMatcher::new(&patterns(&["todo"]), true).unwrap();
        assert_eq!(matcher.find_matches(b"TODO: x\nToDo: y").len(), 2);

        let matcher = PatternMatcher::new(&patterns(&["todo"]), false).unwrap();
        assert!(matcher.find_matches(b"TODO: x").is_empty());
    }

    #[test]
    fn test_non_utf8_haystack() {
        let matcher = PatternMatcher::new(&patterns(&["needle"]), false).unwrap();
        let haystack = b"\xff\xfe needle \xc3\x28 needle";
        assert_eq!(matcher.find_matches(haystack), vec![(3, 9), (13, 19)]);
    }

    #[test]
    fn test_invalid_regex_is_an_error() {
        let result = PatternMatcher::new(&patterns(&["(unclosed"]), false);
        assert!(matches!(result, Err(ScanError::InvalidPattern(_))));
    }

    #[test]
    fn test_empty_patterns_match_nothing() {
        let matcher = PatternMatcher::new(&patterns(&[""]), false).unwrap();
        assert!(matcher.is_empty());
        assert!(matcher.find_matches(b"anything at all").is_empty());
    }

    #[test]
    fn test_same_match_from_two_patterns_reported_once() {
        let matcher = PatternMatcher::new(&patterns(&["abc", "a.c"]), false).unwrap();
        assert_eq!(matcher.find_matches(b"xabcx"), vec![(1, 4)]);
    }

    #[test]
    fn test_pattern_caching() {
        // Unique pattern so other tests cannot have populated the cache
        let unique_pattern = format!(
            "cache_probe_{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        );
        let metrics = ScanMetrics::new();

        let _first =
            PatternMatcher::with_metrics(&[unique_pattern.clone()], false, metrics.clone()).unwrap();
        let stats = metrics.get_stats();
        assert_eq!((stats.cache_hits, stats.cache_misses), (0, 1));

        let _second =
            PatternMatcher::with_metrics(&[unique_pattern.clone()], false, metrics.clone()).unwrap();
        let stats = metrics.get_stats();
        assert_eq!((stats.cache_hits, stats.cache_misses), (1, 1));

        // Case-insensitive compiles separately
        let _third =
            PatternMatcher::with_metrics(&[unique_pattern], true, metrics.clone()).unwrap();
        let stats = metrics.get_stats();
        assert_eq!((stats.cache_hits, stats.cache_misses), (1, 2));
    }

    #[test]
    fn test_is_simple_pattern() {
        assert!(PatternMatcher::is_simple_pattern("test"));
        assert!(PatternMatcher::is_simple_pattern("hello_world"));
        assert!(!PatternMatcher::is_simple_pattern(r"\btest\w+"));
        assert!(!PatternMatcher::is_simple_pattern("test.*pattern"));
    }
}
