//
// lib.rs
// RepoAudit-rs
//
// Library entry that re-exports the audit pipeline so the binary and tests
// share one implementation.
//
// Public crate interface: re-export modules used by the binary and tests.
pub mod audit;
pub mod cli;
pub mod config;
pub mod correlate;
pub mod extract;
pub mod logging;
pub mod matcher;
pub mod probes;
pub mod report;
pub mod scanner;
pub mod utils;

pub use audit::{audit_tree, cross_check, run_audit, AuditResult, Side, TreeAudit};
pub use cli::{build_config, Args};
pub use config::{AuditConfig, ProbeFile};
pub use correlate::{unmatched, CrossCheck};
pub use extract::{extract_facts, FactSet};
pub use matcher::ContentMatcher;
pub use scanner::{scan_dir, ExclusionSet, ScanProgress, ScanResult};
