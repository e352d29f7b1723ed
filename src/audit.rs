use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::AuditConfig;
use crate::correlate::{correlate, CrossCheck};
use crate::extract::FactSet;
use crate::matcher::{name_pattern, ContentMatcher, NamePresence, PatternSet};
use crate::probes::{ConfigFilesProbe, TreeProfile};
use crate::scanner::{scan_dir, ScanProgress, ScanResult};
use crate::utils::ContentReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Client,
    Server,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Client => f.write_str("client"),
            Side::Server => f.write_str("server"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFilesResult {
    pub present: BTreeMap<String, bool>,
    /// Only whether a key is set; values are never read into the report.
    pub flags: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFacts {
    pub name: String,
    pub facts: FactSet,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeAudit {
    pub dir: String,
    pub exists: bool,
    pub total_files: usize,
    pub counts: BTreeMap<String, usize>,
    pub markers: BTreeMap<String, BTreeMap<String, bool>>,
    pub expected_names: NamePresence,
    /// Paths relative to `dir`.
    pub samples: BTreeMap<String, Vec<String>>,
    pub config_files: BTreeMap<String, ConfigFilesResult>,
    pub extracted: Option<ExtractedFacts>,
    #[serde(skip)]
    pub files: Vec<PathBuf>,
}

impl TreeAudit {
    pub fn facts(&self) -> Option<&FactSet> {
        self.extracted.as_ref().map(|e| &e.facts)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInfo {
    pub run_at: DateTime<Utc>,
    pub cwd: String,
    pub client_root: String,
    pub server_root: String,
    pub exclusions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    pub run_info: RunInfo,
    pub client: TreeAudit,
    pub server: TreeAudit,
    pub cross_check: CrossCheck,
}

fn relative_display(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn run_config_probe(
    probe: &ConfigFilesProbe,
    files: &[PathBuf],
    reader: ContentReader,
) -> ConfigFilesResult {
    let mut result = ConfigFilesResult::default();
    let mut selected: Vec<PathBuf> = Vec::new();

    for selector in &probe.files {
        let hits: Vec<&PathBuf> = files
            .iter()
            .filter(|f| {
                f.file_name()
                    .map(|n| selector.matches(&n.to_string_lossy()))
                    .unwrap_or(false)
            })
            .collect();
        result.present.insert(selector.name.clone(), !hits.is_empty());
        for hit in hits {
            if !selected.contains(hit) {
                selected.push(hit.clone());
            }
        }
    }

    let matcher = ContentMatcher::new(&selected, reader);
    for flag in &probe.flags {
        result
            .flags
            .insert(flag.name.clone(), matcher.any_matching(&flag.regex));
    }
    result
}

/// Runs every probe of `profile` over an already walked tree. Each file is
/// read once; config probes re-read only the files their selectors pick.
pub fn audit_files(scan: &ScanResult, profile: &TreeProfile, reader: ContentReader) -> TreeAudit {
    let count_set = PatternSet::new(profile.counts.iter().map(|p| p.regex.clone()).collect());
    let marker_set = PatternSet::new(
        profile
            .markers
            .iter()
            .flat_map(|g| &g.patterns)
            .map(|p| p.regex.clone())
            .collect(),
    );

    let mut name_regexes = Vec::new();
    let name_slots: Vec<Option<usize>> = profile
        .expected_names
        .iter()
        .map(|name| {
            name_pattern(name).map(|rx| {
                name_regexes.push(rx);
                name_regexes.len() - 1
            })
        })
        .collect();
    let name_set = PatternSet::new(name_regexes);

    let mut count_hits = vec![0usize; count_set.len()];
    let mut marker_hits = vec![false; marker_set.len()];
    let mut name_hits = vec![false; name_set.len()];
    let mut sample_hits: Vec<Vec<String>> = vec![Vec::new(); profile.samples.len()];
    let mut facts = profile.extraction.as_ref().map(|e| FactSet::new(e.cap));

    for file in &scan.files {
        let content = reader.read(file);

        for idx in count_set.matching(&content) {
            count_hits[idx] += 1;
        }
        for idx in marker_set.matching(&content) {
            marker_hits[idx] = true;
        }
        for idx in name_set.matching(&content) {
            name_hits[idx] = true;
        }
        for (probe, hits) in profile.samples.iter().zip(sample_hits.iter_mut()) {
            let limit = probe.limit.unwrap_or(usize::MAX);
            if hits.len() < limit && probe.regex.is_match(&content) {
                hits.push(relative_display(file, &scan.root));
            }
        }
        if let (Some(extraction), Some(facts)) = (&profile.extraction, facts.as_mut()) {
            if !content.is_empty() && !facts.is_full() {
                facts.collect_from(&content, &extraction.patterns);
            }
        }
    }

    let counts: BTreeMap<String, usize> = profile
        .counts
        .iter()
        .zip(count_hits)
        .map(|(p, hits)| (p.name.clone(), hits))
        .collect();

    let mut marker_hits = marker_hits.into_iter();
    let markers: BTreeMap<String, BTreeMap<String, bool>> = profile
        .markers
        .iter()
        .map(|group| {
            let flags: BTreeMap<String, bool> = group
                .patterns
                .iter()
                .map(|p| (p.name.clone(), marker_hits.next().unwrap_or(false)))
                .collect();
            (group.name.clone(), flags)
        })
        .collect();

    let mut expected_names = NamePresence::default();
    for (name, slot) in profile.expected_names.iter().zip(&name_slots) {
        expected_names.record(name, slot.map(|idx| name_hits[idx]).unwrap_or(false));
    }

    let samples: BTreeMap<String, Vec<String>> = profile
        .samples
        .iter()
        .zip(sample_hits)
        .map(|(s, hits)| (s.name.clone(), hits))
        .collect();

    let config_files: BTreeMap<String, ConfigFilesResult> = profile
        .config_files
        .iter()
        .map(|c| (c.name.clone(), run_config_probe(c, &scan.files, reader)))
        .collect();

    let extracted = profile
        .extraction
        .as_ref()
        .zip(facts)
        .map(|(e, facts)| ExtractedFacts {
            name: e.name.clone(),
            facts,
        });

    TreeAudit {
        dir: scan.root.display().to_string(),
        exists: scan.exists,
        total_files: scan.files.len(),
        counts,
        markers,
        expected_names,
        samples,
        config_files,
        extracted,
        files: scan.files.clone(),
    }
}

/// Walks `root` and probes it. A missing root yields an all-empty record.
pub fn audit_tree(
    root: &Path,
    profile: &TreeProfile,
    config: &AuditConfig,
    on_progress: &mut dyn FnMut(ScanProgress),
) -> TreeAudit {
    let scan = scan_dir(root, &config.exclusions, config.progress_every, on_progress);
    debug!(root = %root.display(), files = scan.files.len(), "probing tree");
    audit_files(&scan, profile, config.reader)
}

/// Looks for the facts extracted from `source` in the files of `haystack`.
pub fn cross_check(source: &TreeAudit, haystack: &TreeAudit, config: &AuditConfig) -> CrossCheck {
    let empty = FactSet::default();
    let facts = source.facts().unwrap_or(&empty);
    correlate(facts, &haystack.files, config.cross_check_limit, &config.reader)
}

pub fn run_audit(
    config: &AuditConfig,
    on_progress: &mut dyn FnMut(Side, ScanProgress),
) -> AuditResult {
    let run_info = RunInfo {
        run_at: Utc::now(),
        cwd: std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        client_root: config.client_root.display().to_string(),
        server_root: config.server_root.display().to_string(),
        exclusions: config.exclusions.tokens().to_vec(),
    };

    let client = audit_tree(
        &config.client_root,
        &config.client,
        config,
        &mut |p: ScanProgress| on_progress(Side::Client, p),
    );
    let server = audit_tree(
        &config.server_root,
        &config.server,
        config,
        &mut |p: ScanProgress| on_progress(Side::Server, p),
    );
    let cross_check = cross_check(&client, &server, config);

    info!(
        examined = cross_check.examined.len(),
        without_evidence = cross_check.without_textual_evidence.len(),
        "cross-check finished"
    );

    AuditResult {
        run_info,
        client,
        server,
        cross_check,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_facts;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn create_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let web = dir.path().join("web");
        let api = dir.path().join("api");

        write(
            &web,
            "src/app/login/driver-login.component.ts",
            "@Component({selector: 'app-login'})\nexport class DriverLoginComponent {\n  login() { localStorage.setItem('token', t); return fetch('/api/drivers/login'); }\n}",
        );
        write(
            &web,
            "src/app/drivers/driver.service.ts",
            "@Injectable()\nexport class DriverService {\n  get(id) { return fetch('/api/drivers/123'); }\n}",
        );
        write(&web, "node_modules/lib/vehicle.component.ts", "export class VehicleComponent {}");

        write(
            &api,
            "src/main/java/app/DriverController.java",
            "@RestController\n@RequestMapping(\"/api/drivers\")\npublic class DriverController {\n  @PostMapping(\"/api/drivers/login\") void login() {}\n  @GetMapping(\"/{id}\") void get() {}\n}",
        );
        write(
            &api,
            "src/main/resources/application.properties",
            "spring.datasource.username=app\njwt.secret=changeme\n",
        );
        dir
    }

    fn config_for(dir: &TempDir) -> AuditConfig {
        AuditConfig::new(dir.path().join("web"), dir.path().join("api")).unwrap()
    }

    #[test]
    fn test_client_tree_audit() {
        let dir = create_project();
        let config = config_for(&dir);
        let audit = audit_tree(&config.client_root, &config.client, &config, &mut |_| {});

        assert!(audit.exists);
        assert_eq!(audit.total_files, 2);
        assert_eq!(audit.counts["componentCount"], 1);
        assert_eq!(audit.counts["injectableCount"], 1);
        assert!(audit.markers["jwtPatterns"]["localStorageSetToken"]);
        assert!(!audit.markers["jwtPatterns"]["sessionStorageSetToken"]);
        assert_eq!(audit.expected_names.found, vec!["DriverLoginComponent"]);
        assert!(audit
            .expected_names
            .missing
            .contains(&"VehicleComponent".to_string()));
        assert_eq!(
            audit.samples["sampleComponentFiles"],
            vec!["src/app/login/driver-login.component.ts"]
        );

        let facts: Vec<&str> = audit.facts().unwrap().iter().collect();
        assert_eq!(facts, vec!["/api/drivers/123", "/api/drivers/login"]);
    }

    #[test]
    fn test_server_tree_audit() {
        let dir = create_project();
        let config = config_for(&dir);
        let audit = audit_tree(&config.server_root, &config.server, &config, &mut |_| {});

        assert_eq!(audit.counts["postMapping"], 1);
        assert_eq!(audit.counts["deleteMapping"], 0);
        assert_eq!(audit.samples["controllerFiles"].len(), 1);
        assert_eq!(audit.expected_names.found, vec!["DriverController"]);

        let configs = &audit.config_files["configs"];
        assert!(configs.present["applicationProperties"]);
        assert!(!configs.present["applicationYml"]);
        assert!(configs.flags["jwtSecret"]);
        assert!(configs.flags["datasourceUser"]);
        assert!(!configs.flags["postgresJdbc"]);
        assert!(audit.facts().is_none());
    }

    #[test]
    fn test_run_audit_cross_check() {
        let dir = create_project();
        let config = config_for(&dir);
        let mut done = Vec::new();
        let result = run_audit(&config, &mut |side: Side, p: ScanProgress| {
            if p.done {
                done.push(side);
            }
        });

        assert_eq!(done, vec![Side::Client, Side::Server]);
        assert_eq!(
            result.cross_check.examined,
            vec!["/api/drivers/123", "/api/drivers/login"]
        );
        assert_eq!(
            result.cross_check.without_textual_evidence,
            vec!["/api/drivers/123"]
        );
    }

    #[test]
    fn test_missing_roots_produce_empty_records() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);
        let result = run_audit(&config, &mut |_: Side, _: ScanProgress| {});

        for tree in [&result.client, &result.server] {
            assert!(!tree.exists);
            assert_eq!(tree.total_files, 0);
            assert!(tree.expected_names.found.is_empty());
            assert_eq!(tree.expected_names.missing, tree.expected_names.to_check);
            assert!(tree.counts.values().all(|c| *c == 0));
            assert!(tree.markers.values().flat_map(|m| m.values()).all(|b| !b));
        }
        assert!(result.client.facts().unwrap().is_empty());
        assert!(result.cross_check.examined.is_empty());
    }

    #[test]
    fn test_facts_against_absent_tree_are_all_unmatched() {
        let dir = create_project();
        fs::remove_dir_all(dir.path().join("api")).unwrap();
        let config = config_for(&dir);
        let result = run_audit(&config, &mut |_: Side, _: ScanProgress| {});

        assert_eq!(
            result.cross_check.without_textual_evidence,
            result.cross_check.examined
        );
        assert_eq!(result.cross_check.examined.len(), 2);
    }

    #[test]
    fn test_single_pass_matches_per_probe_matching() {
        let dir = create_project();
        let config = config_for(&dir);
        let audit = audit_tree(&config.client_root, &config.client, &config, &mut |_| {});
        let matcher = ContentMatcher::new(&audit.files, config.reader);

        for probe in &config.client.counts {
            assert_eq!(audit.counts[&probe.name], matcher.count_matching(&probe.regex));
        }
        for group in &config.client.markers {
            for probe in &group.patterns {
                assert_eq!(
                    audit.markers[&group.name][&probe.name],
                    matcher.any_matching(&probe.regex)
                );
            }
        }
        assert_eq!(
            audit.expected_names,
            matcher.names_presence(&config.client.expected_names)
        );
        let extraction = config.client.extraction.as_ref().unwrap();
        assert_eq!(
            audit.facts().unwrap(),
            &extract_facts(&audit.files, &extraction.patterns, extraction.cap, &config.reader)
        );
    }

    #[test]
    fn test_sample_limit_keeps_walk_order() {
        let dir = TempDir::new().unwrap();
        let web = dir.path().join("web");
        write(&web, "top.component.ts", "@Component({})");
        write(&web, "a/one.component.ts", "@Component({})");
        write(&web, "a/b/two.component.ts", "@Component({})");

        let mut config = config_for(&dir);
        config.client.samples[0].limit = Some(2);
        let audit = audit_tree(&config.client_root, &config.client, &config, &mut |_| {});

        assert_eq!(audit.counts["componentCount"], 3);
        assert_eq!(
            audit.samples["sampleComponentFiles"],
            vec!["top.component.ts", "a/one.component.ts"]
        );
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let dir = create_project();
        let config = config_for(&dir);
        let result = run_audit(&config, &mut |_: Side, _: ScanProgress| {});
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["client"]["totalFiles"], 2);
        assert_eq!(json["client"]["extracted"]["name"], "apiSamples");
        assert!(json["crossCheck"]["withoutTextualEvidence"].is_array());
        assert!(json["runInfo"]["runAt"].is_string());
        assert!(json["client"].get("files").is_none());
    }
}
