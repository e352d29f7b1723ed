use std::path::PathBuf;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::extract::FactSet;
use crate::utils::ContentReader;

/// A fact under `without_textual_evidence` has no literal occurrence in the
/// haystack; it may still be served under another spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossCheck {
    pub examined: Vec<String>,
    pub without_textual_evidence: Vec<String>,
}

/// Facts with no literal occurrence in any haystack file, in `facts` order.
///
/// A fact whose literal pattern cannot be built counts as matched.
pub fn unmatched(facts: &[String], haystack: &[PathBuf], reader: &ContentReader) -> Vec<String> {
    let mut pending: Vec<(usize, Regex)> = Vec::new();
    for (idx, fact) in facts.iter().enumerate() {
        match Regex::new(&regex::escape(fact)) {
            Ok(rx) => pending.push((idx, rx)),
            Err(e) => {
                debug!(fact_len = fact.len(), error = %e, "literal pattern rejected, counted as matched")
            }
        }
    }

    // One read per haystack file, however many facts are checked.
    for file in haystack {
        if pending.is_empty() {
            break;
        }
        let content = reader.read(file);
        if content.is_empty() {
            continue;
        }
        pending.retain(|(_, rx)| !rx.is_match(&content));
    }

    pending
        .into_iter()
        .map(|(idx, _)| facts[idx].clone())
        .collect()
}

/// Checks up to `limit` facts against `haystack`.
pub fn correlate(
    facts: &FactSet,
    haystack: &[PathBuf],
    limit: usize,
    reader: &ContentReader,
) -> CrossCheck {
    let examined: Vec<String> = facts.iter().take(limit).map(str::to_string).collect();
    let without_textual_evidence = unmatched(&examined, haystack, reader);
    CrossCheck {
        examined,
        without_textual_evidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn facts(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_absent_path_is_unmatched() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("DriverController.java");
        fs::write(&file, r#"@GetMapping("/api/drivers/{id}")"#).unwrap();

        let result = unmatched(
            &facts(&["/api/drivers/123"]),
            &[file],
            &ContentReader::default(),
        );
        assert_eq!(result, vec!["/api/drivers/123"]);
    }

    #[test]
    fn test_present_in_any_file_counts_as_matched() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("A.java");
        let b = dir.path().join("B.java");
        fs::write(&a, r#"@RequestMapping("/api/auth")"#).unwrap();
        fs::write(&b, r#"@PostMapping("/api/drivers/login")"#).unwrap();

        let result = unmatched(
            &facts(&["/api/drivers/login", "/api/auth", "/api/vehicles"]),
            &[a, b],
            &ContentReader::default(),
        );
        assert_eq!(result, vec!["/api/vehicles"]);
    }

    #[test]
    fn test_metacharacters_match_literally() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("Routes.java");
        fs::write(&file, "\"/api/search?q=a+b\"").unwrap();

        let result = unmatched(
            &facts(&["/api/search?q=a+b", "/api/search.q=a+b"]),
            &[file],
            &ContentReader::default(),
        );
        assert_eq!(result, vec!["/api/search.q=a+b"]);
    }

    #[test]
    fn test_empty_haystack_leaves_everything_unmatched() {
        let values = facts(&["/api/a", "/api/b"]);
        assert_eq!(unmatched(&values, &[], &ContentReader::default()), values);
    }

    #[test]
    fn test_fact_too_large_to_compile_counts_as_matched() {
        let oversized = format!("/api/{}", "a".repeat(20_000_000));
        let values = vec![oversized, "/api/small".to_string()];
        let result = unmatched(&values, &[], &ContentReader::default());
        assert_eq!(result, vec!["/api/small"]);
    }

    #[test]
    fn test_correlate_limits_examined() {
        let mut set = FactSet::new(10);
        for fact in ["/api/a", "/api/b", "/api/c"] {
            set.insert(fact);
        }
        let check = correlate(&set, &[], 2, &ContentReader::default());
        assert_eq!(check.examined, vec!["/api/a", "/api/b"]);
        assert_eq!(check.without_textual_evidence, check.examined);
    }
}
