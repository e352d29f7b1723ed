use std::fs;
use std::path::Path;

use anyhow::Result;
use encoding_rs::WINDOWS_1252;
use tracing::trace;

pub const DEFAULT_MAX_FILE_SIZE: &str = "10MB";

const BINARY_SNIFF_LEN: usize = 4096;

pub fn parse_size(s: &str) -> u64 {
    let s = s.trim().to_lowercase();
    let units = [
        ("gib", 1024u64.pow(3)),
        ("mib", 1024u64.pow(2)),
        ("kib", 1024),
        ("gb", 1000u64.pow(3)),
        ("mb", 1000u64.pow(2)),
        ("kb", 1000),
        ("g", 1000u64.pow(3)),
        ("m", 1000u64.pow(2)),
        ("k", 1000),
        ("b", 1),
    ];

    for (unit, mult) in units {
        if s.ends_with(unit) {
            if let Ok(val) = s.trim_end_matches(unit).trim().parse::<f64>() {
                return (val * mult as f64) as u64;
            }
        }
    }
    s.parse().unwrap_or(0)
}

/// NUL bytes near the start mean the file is not text.
pub fn looks_binary(bytes: &[u8]) -> bool {
    let n = bytes.len().min(BINARY_SNIFF_LEN);
    bytes[..n].contains(&0)
}

/// Reads a file as text. Binary or oversized files read as an empty string;
/// only I/O failures are errors. Non-UTF-8 text falls back to Windows-1252.
pub fn read_text_best_effort(path: &Path, max_bytes: u64) -> Result<String> {
    let size = fs::metadata(path)?.len();
    if size > max_bytes {
        trace!(path = %path.display(), size, "file over size limit, treated as empty");
        return Ok(String::new());
    }

    let bytes = fs::read(path)?;
    if looks_binary(&bytes) {
        trace!(path = %path.display(), "binary file, treated as empty");
        return Ok(String::new());
    }

    let content = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let (res, _, _) = WINDOWS_1252.decode(e.as_bytes());
            res.into_owned()
        }
    };
    Ok(content)
}

/// Defensive reader shared by every probe: a file that cannot be read
/// contributes empty content instead of failing the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentReader {
    pub max_bytes: u64,
}

impl Default for ContentReader {
    fn default() -> Self {
        Self {
            max_bytes: parse_size(DEFAULT_MAX_FILE_SIZE),
        }
    }
}

impl ContentReader {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn read(&self, path: &Path) -> String {
        match read_text_best_effort(path, self.max_bytes) {
            Ok(content) => content,
            Err(e) => {
                trace!(path = %path.display(), error = %e, "unreadable file, treated as empty");
                String::new()
            }
        }
    }
}
