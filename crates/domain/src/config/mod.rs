mod chaos;
mod governance;
mod memory;
mod providers;
mod server;
mod telemetry;

pub use chaos::*;
pub use governance::*;
pub use memory::*;
pub use providers::*;
pub use server::*;
pub use telemetry::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub governance: GovernanceConfig,
    #[serde(default)]
    pub chaos: ChaosConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues. An empty
    /// vec means everything looks good; the caller decides whether any
    /// `Warning` entries are worth surfacing and whether any `Error`
    /// entries should abort startup.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }
        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.requests_per_second".into(),
                    message: "requests_per_second must be greater than 0".into(),
                });
            }
            if rl.burst_size == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.burst_size".into(),
                    message: "burst_size must be greater than 0".into(),
                });
            }
        }
        if self.server.cors.allowed_origins.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.cors.allowed_origins".into(),
                message: "allowed_origins must not be empty".into(),
            });
        }

        // ── Providers ────────────────────────────────────────────────
        if self.providers.llm.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "providers.llm".into(),
                message: "no LLM providers configured".into(),
            });
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        for (i, provider) in self.providers.llm.iter().enumerate() {
            validate_provider(&mut errors, &format!("providers.llm[{i}]"), provider);
            if !provider.id.is_empty() && !seen_ids.insert(&provider.id) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("providers.llm[{i}].id"),
                    message: format!(
                        "duplicate provider id \"{}\" — later provider will shadow earlier one",
                        provider.id
                    ),
                });
            }
        }
        validate_provider(&mut errors, "providers.stt", &self.providers.stt);
        validate_provider(&mut errors, "providers.tts", &self.providers.tts);

        if self.providers.reconnect_backoff_secs.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "providers.reconnect_backoff_secs".into(),
                message: "reconnect backoff schedule must not be empty".into(),
            });
        }

        // ── Chaos ────────────────────────────────────────────────────
        for (field, value) in [
            ("chaos.rate_limit_probability", self.chaos.rate_limit_probability),
            ("chaos.tool_failure_rate", self.chaos.tool_failure_rate),
            ("chaos.persistence_failure_rate", self.chaos.persistence_failure_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: field.into(),
                    message: format!("must be between 0.0 and 1.0 (got {value})"),
                });
            }
        }
        if self.chaos.max_consecutive_failures == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "chaos.max_consecutive_failures".into(),
                message: "must be greater than 0".into(),
            });
        }

        // ── Memory ───────────────────────────────────────────────────
        if self.memory.local_store_path.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "memory.local_store_path".into(),
                message: "local_store_path must not be empty".into(),
            });
        }
        if self.memory.cloud_sync.enabled
            && !self.memory.cloud_sync.base_url.starts_with("http://")
            && !self.memory.cloud_sync.base_url.starts_with("https://")
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "memory.cloud_sync.base_url".into(),
                message: format!(
                    "base_url must start with http:// or https:// (got \"{}\")",
                    self.memory.cloud_sync.base_url
                ),
            });
        }

        errors
    }
}

fn validate_provider(errors: &mut Vec<ConfigError>, field: &str, provider: &ProviderConfig) {
    if provider.id.is_empty() {
        errors.push(ConfigError {
            severity: ConfigSeverity::Error,
            field: format!("{field}.id"),
            message: "provider id must not be empty".into(),
        });
    }
    if provider.base_url.is_empty() {
        errors.push(ConfigError {
            severity: ConfigSeverity::Error,
            field: format!("{field}.base_url"),
            message: "provider base_url must not be empty".into(),
        });
    } else if !provider.base_url.starts_with("http://") && !provider.base_url.starts_with("https://") {
        errors.push(ConfigError {
            severity: ConfigSeverity::Error,
            field: format!("{field}.base_url"),
            message: format!(
                "base_url must start with http:// or https:// (got \"{}\")",
                provider.base_url
            ),
        });
    }

    let needs_credentials = matches!(provider.auth.mode, AuthMode::ApiKey | AuthMode::QueryParam);
    if needs_credentials {
        let has_env = provider.auth.env.as_ref().is_some_and(|v| !v.is_empty());
        let has_key = provider.auth.key.as_ref().is_some_and(|v| !v.is_empty());
        if !has_env && !has_key {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: format!("{field}.auth"),
                message: format!(
                    "uses {:?} auth mode but has no auth.env or auth.key configured",
                    provider.auth.mode
                ),
            });
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            providers: ProvidersConfig {
                llm: vec![ProviderConfig {
                    id: "openai".into(),
                    kind: ProviderKind::OpenaiCompat,
                    base_url: "https://api.openai.com/v1".into(),
                    auth: AuthConfig {
                        mode: AuthMode::ApiKey,
                        env: Some("OPENAI_API_KEY".into()),
                        ..AuthConfig::default()
                    },
                    default_model: None,
                }],
                ..ProvidersConfig::default()
            },
            ..Config::default()
        }
    }

    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn valid_config_has_no_errors() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn server_port_zero_is_error() {
        let mut cfg = valid_config();
        cfg.server.port = 0;
        let issue = find_issue(&cfg.validate(), "server.port").expect("expected error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn no_llm_providers_is_warning() {
        let mut cfg = valid_config();
        cfg.providers.llm.clear();
        let issue = find_issue(&cfg.validate(), "providers.llm").expect("expected warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn duplicate_llm_provider_ids_is_warning() {
        let mut cfg = valid_config();
        let dup = cfg.providers.llm[0].clone();
        cfg.providers.llm.push(dup);
        let issues = cfg.validate();
        let dup_issues: Vec<_> = issues.iter().filter(|e| e.message.contains("duplicate")).collect();
        assert_eq!(dup_issues.len(), 1);
        assert_eq!(dup_issues[0].severity, ConfigSeverity::Warning);
    }

    #[test]
    fn provider_api_key_mode_without_credentials_is_error() {
        let mut cfg = valid_config();
        cfg.providers.llm[0].auth = AuthConfig {
            mode: AuthMode::ApiKey,
            env: None,
            key: None,
            ..AuthConfig::default()
        };
        let issue = find_issue(&cfg.validate(), "providers.llm[0].auth").expect("expected error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn stt_and_tts_providers_validated_by_default() {
        let cfg = valid_config();
        let issues = cfg.validate();
        assert!(find_issue(&issues, "providers.stt").is_none());
        assert!(find_issue(&issues, "providers.tts").is_none());
    }

    #[test]
    fn chaos_probability_out_of_range_is_error() {
        let mut cfg = valid_config();
        cfg.chaos.tool_failure_rate = 1.5;
        let issue = find_issue(&cfg.validate(), "chaos.tool_failure_rate").expect("expected error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn chaos_max_consecutive_failures_zero_is_error() {
        let mut cfg = valid_config();
        cfg.chaos.max_consecutive_failures = 0;
        let issue =
            find_issue(&cfg.validate(), "chaos.max_consecutive_failures").expect("expected error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn cloud_sync_disabled_skips_url_check() {
        let mut cfg = valid_config();
        cfg.memory.cloud_sync.enabled = false;
        cfg.memory.cloud_sync.base_url = "not-a-url".into();
        assert!(find_issue(&cfg.validate(), "memory.cloud_sync.base_url").is_none());
    }

    #[test]
    fn cloud_sync_enabled_with_bad_url_is_error() {
        let mut cfg = valid_config();
        cfg.memory.cloud_sync.enabled = true;
        cfg.memory.cloud_sync.base_url = "ftp://localhost:5000".into();
        let issue =
            find_issue(&cfg.validate(), "memory.cloud_sync.base_url").expect("expected error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "server.port".into(),
            message: "port must be greater than 0".into(),
        };
        assert_eq!(format!("{err}"), "[ERROR] server.port: port must be greater than 0");

        let warn = ConfigError {
            severity: ConfigSeverity::Warning,
            field: "providers.llm".into(),
            message: "no LLM providers configured".into(),
        };
        assert_eq!(format!("{warn}"), "[WARN] providers.llm: no LLM providers configured");
    }

    #[test]
    fn empty_toml_deserializes_to_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.server.port, 3210);
        assert!(cfg.providers.llm.is_empty());
        assert!(!cfg.chaos.enabled);
    }
}
