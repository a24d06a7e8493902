// Copyright 2025 Janek Bevendorff
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Full-match regular expressions for filtering records by header value.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use regex::Regex;
use regex_syntax::hir::{Hir, Look};

use crate::{HeaderMap, Result, WarcError};

/// An ordered list of compiled patterns.
///
/// A value matches if any pattern matches the *whole* value.
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    patterns: Vec<(String, Regex)>,
}

impl PatternMatcher {
    /// Load patterns from a file with one regular expression per line.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Read patterns line by line.
    ///
    /// Trailing whitespace is trimmed and blank lines are skipped. A line that
    /// does not compile fails the whole load.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut patterns = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| WarcError::UnreadablePattern { line: i + 1, source })?;
            let pattern = line.trim_end();
            if pattern.is_empty() {
                continue;
            }
            patterns.push(compile(pattern, i + 1)?);
        }
        Ok(PatternMatcher { patterns })
    }

    /// Build a matcher from in-memory patterns.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .enumerate()
            .map(|(i, p)| compile(p.as_ref(), i + 1))
            .collect::<Result<Vec<_>>>()?;
        Ok(PatternMatcher { patterns })
    }

    /// Source patterns in load order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(p, _)| p.as_str())
    }

    /// Get the number of patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Check if no patterns were loaded.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether any pattern matches the whole of `value`.
    pub fn is_match(&self, value: &str) -> bool {
        self.patterns.iter().any(|(_, re)| re.is_match(value))
    }

    /// Whether the (case-insensitive) header `field` exists and its first
    /// value is matched by any pattern.
    pub fn matches(&self, field: &str, headers: &HeaderMap) -> bool {
        match headers.get(field) {
            Some(value) => self.is_match(&value),
            None => false,
        }
    }
}

fn compile(pattern: &str, line: usize) -> Result<(String, Regex)> {
    let invalid = |source| WarcError::InvalidPattern {
        line,
        pattern: pattern.to_string(),
        source,
    };
    Regex::new(pattern).map_err(invalid)?;

    // Anchor the parsed expression, not the text, so flags and comments in
    // the pattern cannot reach the anchors
    let hir = regex_syntax::Parser::new()
        .parse(pattern)
        .map_err(|e| invalid(regex::Error::Syntax(e.to_string())))?;
    let anchored = Hir::concat(vec![Hir::look(Look::Start), hir, Hir::look(Look::End)]);
    let regex = Regex::new(&anchored.to_string()).map_err(invalid)?;
    Ok((pattern.to_string(), regex))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeaderEncoding;

    fn headers(fields: &str) -> HeaderMap {
        let raw = format!("WARC/1.1\r\n{}\r\n", fields);
        HeaderMap::parse(raw.into_bytes(), HeaderEncoding::Unicode).unwrap()
    }

    #[test]
    fn loads_one_pattern_per_line() {
        let matcher = PatternMatcher::from_reader(&b"response  \n\n   \nre(quest|visit)\t\n"[..]).unwrap();
        assert_eq!(matcher.len(), 2);
        assert_eq!(matcher.patterns().collect::<Vec<_>>(), vec!["response", "re(quest|visit)"]);
    }

    #[test]
    fn values_must_match_fully() {
        let matcher = PatternMatcher::from_patterns(["response", "https?://example\\.com/.*"]).unwrap();
        assert!(matcher.is_match("response"));
        assert!(!matcher.is_match("responses"));
        assert!(!matcher.is_match("a response"));
        assert!(matcher.is_match("http://example.com/index.html"));
        assert!(!matcher.is_match("see http://example.com/"));
    }

    #[test]
    fn alternation_is_anchored_as_a_whole() {
        let matcher = PatternMatcher::from_patterns(["a|b"]).unwrap();
        assert!(matcher.is_match("a"));
        assert!(matcher.is_match("b"));
        assert!(!matcher.is_match("ab"));

        assert!(PatternMatcher::from_patterns(["a)|(b"]).is_err());
    }

    #[test]
    fn verbose_patterns_with_comments_are_anchored() {
        let matcher = PatternMatcher::from_patterns(["(?x)resp onse # the type", "a|ab"]).unwrap();
        assert!(matcher.is_match("response"));
        assert!(!matcher.is_match("responses"));
        assert!(!matcher.is_match("resp onse"));
        assert!(matcher.is_match("ab"));
        assert!(!matcher.is_match("abb"));
    }

    #[test]
    fn field_lookup_ignores_case_but_values_do_not() {
        let matcher = PatternMatcher::from_patterns(["response"]).unwrap();
        let h = headers("WARC-Type: response\r\n");
        assert!(matcher.matches("WARC-Type", &h));
        assert!(matcher.matches("warc-type", &h));
        assert!(!matcher.matches("WARC-Target-URI", &h));

        let h = headers("WARC-Type: Response\r\n");
        assert!(!matcher.matches("WARC-Type", &h));

        let matcher = PatternMatcher::from_patterns(["(?i)response"]).unwrap();
        assert!(matcher.matches("WARC-Type", &h));
    }

    #[test]
    fn empty_matcher_matches_nothing() {
        let matcher = PatternMatcher::from_reader(&b"\n\n"[..]).unwrap();
        assert!(matcher.is_empty());
        assert!(!matcher.matches("WARC-Type", &headers("WARC-Type: response\r\n")));
        assert!(!matcher.is_match(""));
    }

    #[test]
    fn invalid_pattern_names_line() {
        match PatternMatcher::from_reader(&b"response\n\nre(quest\n"[..]) {
            Err(WarcError::InvalidPattern { line, pattern, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(pattern, "re(quest");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn unreadable_line_is_reported_with_its_number() {
        match PatternMatcher::from_reader(&b"ok\n\xff\xfe\n"[..]) {
            Err(err @ WarcError::UnreadablePattern { line: 2, .. }) => {
                assert!(err.to_string().starts_with("Cannot read pattern line 2"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
