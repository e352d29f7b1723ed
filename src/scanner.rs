use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

pub const DEFAULT_EXCLUDES: [&str; 5] = ["node_modules", ".git", "dist", "build", "target"];
pub const DEFAULT_PROGRESS_INTERVAL: usize = 1000;

/// A name is excluded when its lowercased form contains any token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    tokens: Vec<String>,
}

impl ExclusionSet {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for token in tokens {
            let token = token.as_ref().trim().to_lowercase();
            if !token.is_empty() && !set.tokens.contains(&token) {
                set.tokens.push(token);
            }
        }
        set
    }

    /// Defaults first, then the user's additions.
    pub fn with_defaults<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let defaults = DEFAULT_EXCLUDES.iter().map(|s| s.to_string());
        let extra = extra.into_iter().map(|s| s.as_ref().to_string());
        Self::new(defaults.chain(extra))
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn should_exclude(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        let name = name.to_lowercase();
        self.tokens
            .iter()
            .any(|token| name == *token || name.contains(token.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    pub files: usize,
    pub elapsed: Duration,
    pub done: bool,
}

#[derive(Debug)]
pub struct ScanResult {
    pub root: PathBuf,
    pub exists: bool,
    pub files: Vec<PathBuf>, // discovery order
    pub elapsed: Duration,
}

/// `on_progress` fires every `progress_every` files and once more with
/// `done` set. Symbolic links are not followed.
pub fn scan_dir(
    root: &Path,
    exclusions: &ExclusionSet,
    progress_every: usize,
    on_progress: &mut dyn FnMut(ScanProgress),
) -> ScanResult {
    let start = Instant::now();
    let mut files = Vec::new();
    let exists = root.exists();

    if !exists {
        debug!(root = %root.display(), "scan root does not exist");
        return ScanResult {
            root: root.to_path_buf(),
            exists,
            files,
            elapsed: start.elapsed(),
        };
    }

    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            if exclusions.should_exclude(&name.to_string_lossy()) {
                trace!(path = %entry.path().display(), "excluded");
                continue;
            }
            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(_) => continue,
            };

            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
                if progress_every > 0 && files.len() % progress_every == 0 {
                    on_progress(ScanProgress {
                        files: files.len(),
                        elapsed: start.elapsed(),
                        done: false,
                    });
                }
            }
        }
    }

    let elapsed = start.elapsed();
    on_progress(ScanProgress {
        files: files.len(),
        elapsed,
        done: true,
    });

    ScanResult {
        root: root.to_path_buf(),
        exists,
        files,
        elapsed,
    }
}
