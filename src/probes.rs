//! Probe tables: which patterns to count, which markers to look for, which
//! names must exist and what to extract, for one side of the audit.
//!
//! Profiles are plain data (`ProfileSpec`) so they can come from a TOML file;
//! `compile` turns them into ready-to-run regexes and globs.

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern as GlobPattern};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extract::DEFAULT_FACT_CAP;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSpec {
    pub name: String,
    pub pattern: String,
}

/// Each marker is true when at least one file matches it on its own. Files
/// are not joined, so a pattern cannot match text spanning two files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerGroupSpec {
    pub name: String,
    pub patterns: Vec<PatternSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSpec {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSelectorSpec {
    pub name: String,
    pub globs: Vec<String>,
}

/// Files picked by name, plus flags that hold when any picked file matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFilesSpec {
    pub name: String,
    pub files: Vec<FileSelectorSpec>,
    #[serde(default)]
    pub flags: Vec<PatternSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSpec {
    pub name: String,
    /// Most specific first.
    pub patterns: Vec<String>,
    #[serde(default = "default_cap")]
    pub cap: usize,
}

fn default_cap() -> usize {
    DEFAULT_FACT_CAP
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSpec {
    pub counts: Vec<PatternSpec>,
    pub markers: Vec<MarkerGroupSpec>,
    pub expected_names: Vec<String>,
    pub samples: Vec<SampleSpec>,
    pub config_files: Vec<ConfigFilesSpec>,
    pub extraction: Option<ExtractionSpec>,
}

#[derive(Debug, Clone)]
pub struct NamedPattern {
    pub name: String,
    pub regex: Regex,
}

#[derive(Debug, Clone)]
pub struct MarkerGroup {
    pub name: String,
    pub patterns: Vec<NamedPattern>,
}

#[derive(Debug, Clone)]
pub struct SampleProbe {
    pub name: String,
    pub regex: Regex,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct FileSelector {
    pub name: String,
    pub globs: Vec<GlobPattern>,
}

impl FileSelector {
    /// Matched against the file name only, ignoring case.
    pub fn matches(&self, file_name: &str) -> bool {
        let opts = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };
        self.globs.iter().any(|g| g.matches_with(file_name, opts))
    }
}

#[derive(Debug, Clone)]
pub struct ConfigFilesProbe {
    pub name: String,
    pub files: Vec<FileSelector>,
    pub flags: Vec<NamedPattern>,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub name: String,
    pub patterns: Vec<Regex>,
    pub cap: usize,
}

/// Compiled probes for one tree.
#[derive(Debug, Clone, Default)]
pub struct TreeProfile {
    pub counts: Vec<NamedPattern>,
    pub markers: Vec<MarkerGroup>,
    pub expected_names: Vec<String>,
    pub samples: Vec<SampleProbe>,
    pub config_files: Vec<ConfigFilesProbe>,
    pub extraction: Option<Extraction>,
}

fn compile_regex(probe: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).with_context(|| format!("Invalid pattern for probe '{probe}': {pattern}"))
}

fn compile_named(specs: &[PatternSpec]) -> Result<Vec<NamedPattern>> {
    specs
        .iter()
        .map(|s| {
            Ok(NamedPattern {
                name: s.name.clone(),
                regex: compile_regex(&s.name, &s.pattern)?,
            })
        })
        .collect()
}

impl ProfileSpec {
    pub fn compile(&self) -> Result<TreeProfile> {
        let markers = self
            .markers
            .iter()
            .map(|g| {
                Ok(MarkerGroup {
                    name: g.name.clone(),
                    patterns: compile_named(&g.patterns)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let samples = self
            .samples
            .iter()
            .map(|s| {
                Ok(SampleProbe {
                    name: s.name.clone(),
                    regex: compile_regex(&s.name, &s.pattern)?,
                    limit: s.limit,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let config_files = self
            .config_files
            .iter()
            .map(|c| {
                let files = c
                    .files
                    .iter()
                    .map(|sel| {
                        let globs = sel
                            .globs
                            .iter()
                            .map(|g| {
                                GlobPattern::new(g).with_context(|| {
                                    format!("Invalid glob pattern for '{}': {g}", sel.name)
                                })
                            })
                            .collect::<Result<Vec<_>>>()?;
                        Ok(FileSelector {
                            name: sel.name.clone(),
                            globs,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ConfigFilesProbe {
                    name: c.name.clone(),
                    files,
                    flags: compile_named(&c.flags)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let extraction = match &self.extraction {
            Some(e) => Some(Extraction {
                name: e.name.clone(),
                patterns: e
                    .patterns
                    .iter()
                    .map(|p| compile_regex(&e.name, p))
                    .collect::<Result<Vec<_>>>()?,
                cap: e.cap,
            }),
            None => None,
        };

        Ok(TreeProfile {
            counts: compile_named(&self.counts)?,
            markers,
            expected_names: self.expected_names.clone(),
            samples,
            config_files,
            extraction,
        })
    }
}

fn patterns(table: &[(&str, &str)]) -> Vec<PatternSpec> {
    table
        .iter()
        .map(|(name, pattern)| PatternSpec {
            name: name.to_string(),
            pattern: pattern.to_string(),
        })
        .collect()
}

fn names(table: &[&str]) -> Vec<String> {
    table.iter().map(|s| s.to_string()).collect()
}

// Characters allowed in an extracted API path.
const API_PATH: &str = r"(/api/[\w\-/.?=&%:;@+\[\]~]*)";

/// Angular-style client: components, services, token handling and the API
/// paths it calls.
pub fn builtin_client() -> ProfileSpec {
    ProfileSpec {
        counts: patterns(&[
            ("componentCount", r"@Component\s*\("),
            ("injectableCount", r"@Injectable\s*\("),
        ]),
        markers: vec![
            MarkerGroupSpec {
                name: "jwtPatterns".into(),
                patterns: patterns(&[
                    ("localStorageSetToken", r#"(?i)localStorage\.setItem\(\s*['"]token['"]"#),
                    ("sessionStorageSetToken", r#"(?i)sessionStorage\.setItem\(\s*['"]token['"]"#),
                    ("authorizationHeader", r"(?i)Authorization\s*[:=]"),
                ]),
            },
            MarkerGroupSpec {
                name: "mockOrHardcoded".into(),
                patterns: patterns(&[
                    ("hasMockKeyword", r"(?i)\bmock\b"),
                    ("hasConstArray", r"(?i)const\s+\w+\s*=\s*\[[^\]]*\]"),
                ]),
            },
        ],
        expected_names: names(&[
            "DriverLoginComponent",
            "DriverDashboardComponent",
            "DriverProfileComponent",
            "VehicleComponent",
            "ConsignmentComponent",
            "HistoryComponent",
            "DocumentUploadComponent",
            "ReviewComponent",
        ]),
        samples: vec![SampleSpec {
            name: "sampleComponentFiles".into(),
            pattern: r"@Component\s*\(".into(),
            limit: Some(10),
        }],
        config_files: Vec::new(),
        extraction: Some(ExtractionSpec {
            name: "apiSamples".into(),
            patterns: vec![
                format!(r#"fetch\(\s*['"`]\s*{API_PATH}['"`]"#),
                format!(r#"(?i)axios\.(?:get|post|put|delete)\([^'"`]*['"`]\s*{API_PATH}['"`]"#),
                format!(r#"(?i)HttpClient\.(?:get|post|put|delete)\([^'"`]*['"`]\s*{API_PATH}['"`]"#),
                format!(r#"['"`]\s*{API_PATH}['"`]"#),
            ],
            cap: DEFAULT_FACT_CAP,
        }),
    }
}

/// Spring-style server: controllers, request mappings, security classes,
/// datasource settings and realtime/migration libraries.
pub fn builtin_server() -> ProfileSpec {
    ProfileSpec {
        counts: patterns(&[
            ("getMapping", r"@GetMapping\b"),
            ("postMapping", r"@PostMapping\b"),
            ("putMapping", r"@PutMapping\b"),
            ("deleteMapping", r"@DeleteMapping\b"),
            ("requestMapping", r"@RequestMapping\b"),
        ]),
        markers: vec![MarkerGroupSpec {
            name: "realtimeOrMigrations".into(),
            patterns: patterns(&[
                ("websocket", r"(?i)@EnableWebSocket|WebSocket"),
                ("stomp", r"(?i)STOMP|SimpMessagingTemplate|@EnableWebSocketMessageBroker"),
                ("fcm", r"(?i)Firebase|FCM"),
                ("flyway", r"(?i)Flyway"),
                ("liquibase", r"(?i)Liquibase"),
            ]),
        }],
        expected_names: names(&[
            "DriverAuthController",
            "DriverController",
            "DriverAuthService",
            "DriverService",
            "JWTFilter",
            "SecurityConfig",
        ]),
        samples: vec![
            SampleSpec {
                name: "controllerFiles".into(),
                pattern: r"@(RestController|Controller)\b".into(),
                limit: None,
            },
            SampleSpec {
                name: "sampleControllerFiles".into(),
                pattern: r"@(RestController|Controller)\b".into(),
                limit: Some(10),
            },
        ],
        config_files: vec![ConfigFilesSpec {
            name: "configs".into(),
            files: vec![
                FileSelectorSpec {
                    name: "applicationProperties".into(),
                    globs: names(&["*application.properties"]),
                },
                FileSelectorSpec {
                    name: "applicationYml".into(),
                    globs: names(&["*application.yml", "*application.yaml"]),
                },
            ],
            flags: patterns(&[
                ("jwtSecret", r"(?i)jwt\.secret\s*[=:]"),
                ("datasourceUser", r"(?i)spring\.datasource\.username\s*[=:]"),
                ("datasourcePass", r"(?i)spring\.datasource\.password\s*[=:]"),
                ("postgresJdbc", r"(?i)jdbc:postgresql"),
            ]),
        }],
        extraction: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles_compile() {
        let client = builtin_client().compile().unwrap();
        let server = builtin_server().compile().unwrap();
        assert_eq!(client.extraction.as_ref().unwrap().patterns.len(), 4);
        assert_eq!(client.expected_names.len(), 8);
        assert!(server.extraction.is_none());
        assert_eq!(server.counts.len(), 5);
    }

    #[test]
    fn test_invalid_pattern_names_probe() {
        let spec = ProfileSpec {
            counts: patterns(&[("broken", r"@Component\s*(")]),
            ..Default::default()
        };
        let err = spec.compile().unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_file_selector_ignores_case() {
        let server = builtin_server().compile().unwrap();
        let yml = &server.config_files[0].files[1];
        assert!(yml.matches("application.yaml"));
        assert!(yml.matches("Application.YML"));
        assert!(yml.matches("test-application.yml"));
        assert!(!yml.matches("application.properties"));
    }

    #[test]
    fn test_profile_from_toml() {
        let spec: ProfileSpec = toml::from_str(
            r#"
expected_names = ["OrderService"]

[[counts]]
name = "handlers"
pattern = 'app\.(get|post)\('

[extraction]
name = "routes"
patterns = ['"(/v1/[a-z/]+)"']
"#,
        )
        .unwrap();

        let profile = spec.compile().unwrap();
        assert_eq!(profile.counts[0].name, "handlers");
        assert_eq!(profile.extraction.unwrap().cap, DEFAULT_FACT_CAP);
        assert!(profile.markers.is_empty());
    }
}
