use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::extract::DEFAULT_FACT_CAP;
use crate::probes::{builtin_client, builtin_server, ProfileSpec, TreeProfile};
use crate::scanner::{ExclusionSet, DEFAULT_PROGRESS_INTERVAL};
use crate::utils::ContentReader;

/// Everything one audit run needs. Built once and passed down explicitly.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub client_root: PathBuf,
    pub server_root: PathBuf,
    pub exclusions: ExclusionSet,
    pub progress_every: usize,
    pub reader: ContentReader,
    /// How many client facts are looked up in the server tree.
    pub cross_check_limit: usize,
    pub client: TreeProfile,
    pub server: TreeProfile,
}

impl AuditConfig {
    /// Builtin probes and default limits for the two roots.
    pub fn new(client_root: impl Into<PathBuf>, server_root: impl Into<PathBuf>) -> Result<Self> {
        let profiles = ProbeFile::default();
        Ok(Self {
            client_root: client_root.into(),
            server_root: server_root.into(),
            exclusions: ExclusionSet::with_defaults(Vec::<String>::new()),
            progress_every: DEFAULT_PROGRESS_INTERVAL,
            reader: ContentReader::default(),
            cross_check_limit: DEFAULT_FACT_CAP,
            client: profiles.client.compile().context("Invalid client profile")?,
            server: profiles.server.compile().context("Invalid server profile")?,
        })
    }
}

/// Probe overrides read from TOML. A missing `[client]` or `[server]` table
/// keeps the builtin profile for that side.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProbeFile {
    #[serde(default = "builtin_client")]
    pub client: ProfileSpec,
    #[serde(default = "builtin_server")]
    pub server: ProfileSpec,
}

impl Default for ProbeFile {
    fn default() -> Self {
        Self {
            client: builtin_client(),
            server: builtin_server(),
        }
    }
}

impl ProbeFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read probe file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid probe file {}", path.display()))
    }
}
