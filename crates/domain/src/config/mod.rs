mod bus;
mod context;
mod llm;
mod run;
mod sandbox;
mod search;
mod server;
mod tools;

pub use bus::*;
pub use context::*;
pub use llm::*;
pub use run::*;
pub use sandbox::*;
pub use search::*;
pub use server::*;
pub use tools::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub billing: BillingConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Billing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BillingConfig {
    /// Daily token ceiling per account. `None` = unlimited.
    #[serde(default)]
    pub daily_token_limit: Option<u64>,
    /// Daily run-count ceiling per account. `None` = unlimited.
    #[serde(default)]
    pub daily_run_limit: Option<u64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
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
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
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
        if self.run.max_iterations == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "run.max_iterations".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.run.heartbeat_seconds == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "run.heartbeat_seconds".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.tools.parallel_safe_limit == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "tools.parallel_safe_limit".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.bus.log_max_entries == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "bus.log_max_entries".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.llm.providers.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.providers".into(),
                message: "no LLM providers configured; runs will fail at start".into(),
            });
        }
        if self.context.tail_preserve_turns == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "context.tail_preserve_turns".into(),
                message: "0 allows compression to rewrite the latest turn".into(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        let config = Config::default();
        let issues = config.validate();
        assert!(
            issues
                .iter()
                .all(|i| i.severity != ConfigSeverity::Error),
            "default config should have no errors: {issues:?}"
        );
    }

    #[test]
    fn zero_port_is_an_error() {
        let mut config = Config::default();
        config.server.port = 0;
        let issues = config.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "server.port" && i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn spec_defaults() {
        let config = Config::default();
        assert_eq!(config.run.max_iterations, 100);
        assert_eq!(config.run.native_max_auto_continues, 25);
        assert_eq!(config.run.heartbeat_seconds, 30);
        assert_eq!(config.bus.log_ttl_seconds, 86_400);
        assert_eq!(config.bus.log_max_entries, 10_000);
        assert_eq!(config.tools.parallel_safe_limit, 4);
    }

    #[test]
    fn parses_partial_toml() {
        let toml_src = r#"
            [server]
            port = 9000

            [run]
            max_iterations = 10
        "#;
        let config: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.run.max_iterations, 10);
        // Untouched sections keep their defaults.
        assert_eq!(config.run.heartbeat_seconds, 30);
        assert_eq!(config.tools.default_timeout_seconds, 30);
    }
}
