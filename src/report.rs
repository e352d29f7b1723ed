use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::audit::{AuditResult, TreeAudit};

pub const REPORT_MD: &str = "audit-report.md";
pub const REPORT_JSON: &str = "audit-report.json";

// Cross-check lines listed in the Markdown report; the JSON keeps everything.
const MD_SAMPLE_LINES: usize = 20;

fn or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items.join(", ")
    }
}

fn push_list(md: &mut Vec<String>, items: &[String]) {
    if items.is_empty() {
        md.push("  - None".to_string());
    }
    for item in items {
        md.push(format!("  - {item}"));
    }
}

fn render_tree(md: &mut Vec<String>, title: &str, tree: &TreeAudit) {
    md.push(format!("## {title}"));
    md.push(format!("- Directory: {}", tree.dir));
    md.push(format!("- Exists: {}", tree.exists));
    md.push(format!("- Total files: {}", tree.total_files));
    for (name, count) in &tree.counts {
        md.push(format!("- {name}: {count}"));
    }
    md.push(String::new());

    md.push("- Expected names presence:".to_string());
    md.push(format!("  - Found: {}", or_none(&tree.expected_names.found)));
    md.push(format!("  - Missing: {}", or_none(&tree.expected_names.missing)));
    md.push(String::new());

    for (group, flags) in &tree.markers {
        md.push(format!("- {group}:"));
        for (name, hit) in flags {
            md.push(format!("  - {name}: {hit}"));
        }
        md.push(String::new());
    }

    for (name, configs) in &tree.config_files {
        md.push(format!("- {name}:"));
        for (selector, present) in &configs.present {
            md.push(format!("  - {selector} present: {present}"));
        }
        md.push("  - Flags (values redacted):".to_string());
        for (flag, set) in &configs.flags {
            md.push(format!("    - {flag}: {set}"));
        }
        md.push(String::new());
    }

    for (name, files) in &tree.samples {
        md.push(format!("- {name} ({}):", files.len()));
        push_list(md, files);
        md.push(String::new());
    }

    if let Some(extracted) = &tree.extracted {
        md.push(format!(
            "- {}: {} extracted (cap {})",
            extracted.name,
            extracted.facts.len(),
            extracted.facts.cap()
        ));
        md.push(String::new());
    }
}

pub fn render_markdown(result: &AuditResult) -> String {
    let mut md = Vec::new();
    let info = &result.run_info;

    md.push("# Repo Audit Report".to_string());
    md.push(String::new());
    md.push(format!("- Generated: {}", info.run_at.to_rfc3339()));
    md.push(format!("- CWD: {}", info.cwd));
    md.push(format!(
        "- Options: client={}, server={}, exclude={}",
        info.client_root,
        info.server_root,
        info.exclusions.join(",")
    ));
    md.push(String::new());

    render_tree(&mut md, "Client", &result.client);
    render_tree(&mut md, "Server", &result.server);

    let check = &result.cross_check;
    md.push("## Cross-check: client facts vs server sources".to_string());
    if check.examined.is_empty() {
        md.push("- No facts extracted from the client.".to_string());
    } else {
        md.push(format!("- Client samples ({} examined):", check.examined.len()));
        for fact in check.examined.iter().take(MD_SAMPLE_LINES) {
            md.push(format!("  - {fact}"));
        }
    }
    md.push(String::new());
    if check.without_textual_evidence.is_empty() {
        md.push("- Every examined fact appears literally in server sources.".to_string());
    } else {
        md.push(
            "- No textual evidence found in server sources (string-level match only; \
             the route may still exist under another spelling):"
                .to_string(),
        );
        for fact in &check.without_textual_evidence {
            md.push(format!("  - {fact}"));
        }
    }
    md.push(String::new());

    md.push("## Recommendations / Next Steps".to_string());
    md.push("- Review missing expected names on both sides.".to_string());
    md.push("- Verify token handling matches the intended auth strategy.".to_string());
    md.push("- Investigate \"mock\" keywords or hard-coded arrays left in code.".to_string());
    md.push(
        "- For facts without textual evidence, confirm the server mapping or adjust the client."
            .to_string(),
    );
    md.push("- Consider wiring this audit into CI to catch drift early.".to_string());

    md.join("\n")
}

// Absolute form of a path that may not exist yet: the deepest existing
// ancestor is canonicalized and the missing tail appended.
fn resolve_for_compare(path: &Path) -> Result<PathBuf> {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = abs.as_path();
    let mut tail = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = existing
        .canonicalize()
        .unwrap_or_else(|_| existing.to_path_buf());
    for name in tail.iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

/// Creates `out_dir` unless it is, or lies inside, one of the scanned roots.
pub fn prepare_output_dir(out_dir: &Path, roots: &[&Path]) -> Result<PathBuf> {
    let out_abs = resolve_for_compare(out_dir)
        .with_context(|| format!("Invalid output directory {}", out_dir.display()))?;

    for root in roots {
        let Ok(root_abs) = root.canonicalize() else {
            continue;
        };
        if out_abs.starts_with(&root_abs) {
            bail!(
                "output_dir {} cannot be inside scanned directory {}",
                out_abs.display(),
                root_abs.display()
            );
        }
    }

    fs::create_dir_all(&out_abs)
        .with_context(|| format!("Failed to create output directory {}", out_abs.display()))?;
    Ok(out_abs)
}

pub struct ReportPaths {
    pub markdown: PathBuf,
    pub json: PathBuf,
}

pub fn write_reports(result: &AuditResult, out_dir: &Path) -> Result<ReportPaths> {
    let markdown = out_dir.join(REPORT_MD);
    let json = out_dir.join(REPORT_JSON);

    fs::write(&markdown, render_markdown(result))
        .with_context(|| format!("Failed to write {}", markdown.display()))?;
    let body = serde_json::to_string_pretty(result).context("Failed to serialize audit result")?;
    fs::write(&json, body).with_context(|| format!("Failed to write {}", json.display()))?;

    Ok(ReportPaths { markdown, json })
}
