use std::path::{Path, PathBuf};

use regex::{Regex, RegexSet};
use serde::Serialize;
use tracing::debug;

use crate::utils::ContentReader;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamePresence {
    pub to_check: Vec<String>,
    pub found: Vec<String>,
    pub missing: Vec<String>,
}

impl NamePresence {
    pub fn record(&mut self, name: &str, found: bool) {
        if found {
            self.found.push(name.to_string());
        } else {
            self.missing.push(name.to_string());
        }
        self.to_check.push(name.to_string());
    }
}

fn is_word_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Literal `name` bounded by non-identifier characters. `\b` only applies
/// next to a word character, so an end like `@` or `$` is bounded by a
/// non-word character or the edge of the text instead.
pub fn name_pattern(name: &str) -> Option<Regex> {
    let first = name.chars().next()?;
    let last = name.chars().next_back()?;
    let before = if is_word_char(first) { r"\b" } else { r"(?:^|\W)" };
    let after = if is_word_char(last) { r"\b" } else { r"(?:\W|$)" };

    match Regex::new(&format!("{before}{}{after}", regex::escape(name))) {
        Ok(rx) => Some(rx),
        Err(e) => {
            debug!(name, error = %e, "name pattern failed to compile");
            None
        }
    }
}

/// Several patterns answered with one scan of each text.
#[derive(Debug, Clone)]
pub struct PatternSet {
    set: Option<RegexSet>,
    patterns: Vec<Regex>,
}

impl PatternSet {
    pub fn new(patterns: Vec<Regex>) -> Self {
        let set = match RegexSet::new(patterns.iter().map(Regex::as_str)) {
            Ok(set) => Some(set),
            Err(e) => {
                debug!(error = %e, "pattern set rejected, matching one by one");
                None
            }
        };
        Self { set, patterns }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Indices of the patterns matching `content`, ascending.
    pub fn matching(&self, content: &str) -> Vec<usize> {
        match &self.set {
            Some(set) => set.matches(content).into_iter().collect(),
            None => self
                .patterns
                .iter()
                .enumerate()
                .filter(|(_, rx)| rx.is_match(content))
                .map(|(idx, _)| idx)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ContentMatcher<'a> {
    files: &'a [PathBuf],
    reader: ContentReader,
}

impl<'a> ContentMatcher<'a> {
    pub fn new(files: &'a [PathBuf], reader: ContentReader) -> Self {
        Self { files, reader }
    }

    pub fn files(&self) -> &'a [PathBuf] {
        self.files
    }

    fn matches(&self, path: &Path, pattern: &Regex) -> bool {
        pattern.is_match(&self.reader.read(path))
    }

    /// Number of files whose content matches `pattern`.
    pub fn count_matching(&self, pattern: &Regex) -> usize {
        self.files
            .iter()
            .filter(|f| self.matches(f, pattern))
            .count()
    }

    /// Matching files in list order, stopping after `limit` hits.
    pub fn filter_matching(&self, pattern: &Regex, limit: Option<usize>) -> Vec<PathBuf> {
        let limit = limit.unwrap_or(usize::MAX);
        let mut matched = Vec::new();
        if limit == 0 {
            return matched;
        }
        for file in self.files {
            if self.matches(file, pattern) {
                matched.push(file.clone());
                if matched.len() >= limit {
                    break;
                }
            }
        }
        matched
    }

    pub fn any_matching(&self, pattern: &Regex) -> bool {
        self.files.iter().any(|f| self.matches(f, pattern))
    }

    /// Whole-word search, so `Foo` does not hit `FooBar`.
    pub fn presence(&self, name: &str) -> bool {
        name_pattern(name)
            .map(|rx| self.any_matching(&rx))
            .unwrap_or(false)
    }

    pub fn names_presence<S: AsRef<str>>(&self, names: &[S]) -> NamePresence {
        let mut presence = NamePresence::default();
        for name in names {
            let name = name.as_ref();
            presence.record(name, self.presence(name));
        }
        presence
    }
}
