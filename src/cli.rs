use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::{AuditConfig, ProbeFile};
use crate::scanner::{ExclusionSet, DEFAULT_PROGRESS_INTERVAL};
use crate::utils::{parse_size, ContentReader, DEFAULT_MAX_FILE_SIZE};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Client-side tree (A)
    #[arg(long, visible_alias = "frontend", default_value = "frontend")]
    pub client: PathBuf,

    /// Server-side tree (B)
    #[arg(long, visible_alias = "backend", default_value = "backend")]
    pub server: PathBuf,

    /// Extra name tokens to skip while walking (can be repeated or comma separated)
    #[arg(short, long, value_delimiter = ',', num_args = 1..)]
    pub exclude: Vec<String>,

    /// Where audit-report.md and audit-report.json are written
    #[arg(short, long, default_value = "tools")]
    pub output_dir: PathBuf,

    /// TOML file replacing the builtin [client] and/or [server] probes
    #[arg(short, long)]
    pub profile: Option<PathBuf>,

    /// Log walk progress every N files (0 disables)
    #[arg(long, default_value_t = DEFAULT_PROGRESS_INTERVAL)]
    pub progress_every: usize,

    /// Files larger than this are treated as empty (e.g., 10MB, 512KiB)
    #[arg(short = 'S', long, default_value = DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: String,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn build_config(args: &Args) -> Result<AuditConfig> {
    let probes = match &args.profile {
        Some(path) => ProbeFile::load(path)?,
        None => ProbeFile::default(),
    };

    let max_bytes = parse_size(&args.max_file_size);
    if max_bytes == 0 {
        anyhow::bail!("Invalid --max-file-size: {}", args.max_file_size);
    }

    let mut config = AuditConfig::new(&args.client, &args.server)?;
    config.exclusions = ExclusionSet::with_defaults(&args.exclude);
    config.progress_every = args.progress_every;
    config.reader = ContentReader::new(max_bytes);
    config.client = probes.client.compile().context("Invalid client profile")?;
    config.server = probes.server.compile().context("Invalid server profile")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["repoaudit"]);
        assert_eq!(args.client, PathBuf::from("frontend"));
        assert_eq!(args.server, PathBuf::from("backend"));
        assert_eq!(args.output_dir, PathBuf::from("tools"));

        let config = build_config(&args).unwrap();
        assert_eq!(config.progress_every, 1000);
        assert_eq!(config.reader.max_bytes, 10_000_000);
    }

    #[test]
    fn test_aliases_and_excludes() {
        let args = Args::parse_from([
            "repoaudit",
            "--frontend=../web",
            "--backend",
            "../api",
            "--exclude=Coverage, tmp",
            "-e",
            "vendor",
        ]);
        assert_eq!(args.client, PathBuf::from("../web"));
        assert_eq!(args.server, PathBuf::from("../api"));

        let config = build_config(&args).unwrap();
        let tokens = config.exclusions.tokens();
        assert!(tokens.contains(&"coverage".to_string()));
        assert!(tokens.contains(&"tmp".to_string()));
        assert!(tokens.contains(&"vendor".to_string()));
        assert!(tokens.contains(&"node_modules".to_string()));
    }

    #[test]
    fn test_rejects_bad_size() {
        let args = Args::parse_from(["repoaudit", "--max-file-size", "lots"]);
        assert!(build_config(&args).is_err());
    }
}
