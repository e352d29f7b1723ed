use std::collections::BTreeSet;
use std::path::PathBuf;

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::utils::ContentReader;

pub const DEFAULT_FACT_CAP: usize = 50;

/// Deduplicated values, never larger than its cap. Iteration is sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactSet {
    facts: BTreeSet<String>,
    cap: usize,
}

impl FactSet {
    pub fn new(cap: usize) -> Self {
        Self {
            facts: BTreeSet::new(),
            cap,
        }
    }

    /// Returns false once the set is full; duplicates are ignored.
    pub fn insert(&mut self, fact: impl Into<String>) -> bool {
        if self.is_full() {
            return false;
        }
        self.facts.insert(fact.into());
        true
    }

    pub fn is_full(&self) -> bool {
        self.facts.len() >= self.cap
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn contains(&self, fact: &str) -> bool {
        self.facts.contains(fact)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.facts.iter().map(String::as_str)
    }

    /// Adds capture group 1 (or the whole match when a pattern has no group)
    /// of every match in `content`, patterns tried in order. Returns whether
    /// the set is full.
    pub fn collect_from(&mut self, content: &str, patterns: &[Regex]) -> bool {
        for pattern in patterns {
            for caps in pattern.captures_iter(content) {
                if self.is_full() {
                    return true;
                }
                if let Some(value) = caps.get(1).or_else(|| caps.get(0)) {
                    self.insert(value.as_str());
                }
            }
        }
        self.is_full()
    }
}

impl Default for FactSet {
    fn default() -> Self {
        Self::new(DEFAULT_FACT_CAP)
    }
}

impl Serialize for FactSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.facts.iter())
    }
}

/// Stops reading files as soon as `cap` values are collected.
pub fn extract_facts(
    files: &[PathBuf],
    patterns: &[Regex],
    cap: usize,
    reader: &ContentReader,
) -> FactSet {
    let mut facts = FactSet::new(cap);
    if facts.is_full() {
        return facts;
    }

    for file in files {
        let content = reader.read(file);
        if !content.is_empty() && facts.collect_from(&content, patterns) {
            break;
        }
    }
    facts
}
