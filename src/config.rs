//! Dashboard configuration: credentials from the environment, everything else
//! from an optional YAML file with built-in defaults.
//!
//! ```yaml
//! github:
//!   organization: gramo-org
//! heroku:
//!   app_prefix: gramo
//! snapci:
//!   user: kjellm
//!   branch: master
//! metrics: [in_progress, pull_requests, dynos_down, failing_pipelines]
//! thresholds:
//!   pull_requests: { warn: 2, crit: 5 }
//! summary_path: /tmp/bev
//! refresh_interval_secs: 60
//! http:
//!   timeout_secs: 20
//! todos:
//!   root: /srv/checkout
//! ```

use crate::metrics::{Metric, MetricSet};
use crate::summary::DEFAULT_SUMMARY_PATH;
use crate::thresholds::{ThresholdPair, Thresholds};
use crate::transport::{HttpSettings, GITHUB_API, HEROKU_API, SNAPCI_API};
use crate::{Error, ErrorContext, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const HEROKU_TOKEN_ENV: &str = "HEROKU_TOKEN";
pub const SNAPCI_TOKEN_ENV: &str = "SNAPCI_TOKEN";
pub const SNAPCI_USER_ENV: &str = "SNAPCI_USER";

pub const DEFAULT_REFRESH_SECS: u64 = 60;

/// API credentials. All three tokens are required.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub github_token: String,
    pub heroku_token: String,
    pub snapci_token: String,
    pub snapci_user: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("github_token", &"***")
            .field("heroku_token", &"***")
            .field("snapci_token", &"***")
            .field("snapci_user", &self.snapci_user)
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve credentials through `lookup`; a missing or blank token is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    Error::configuration_with_context(
                        format!("environment variable {} is not set", key),
                        ErrorContext::new()
                            .with_field_path(key)
                            .with_source("credentials"),
                    )
                })
        };
        Ok(Self {
            github_token: required(GITHUB_TOKEN_ENV)?,
            heroku_token: required(HEROKU_TOKEN_ENV)?,
            snapci_token: required(SNAPCI_TOKEN_ENV)?,
            snapci_user: lookup(SNAPCI_USER_ENV).filter(|u| !u.trim().is_empty()),
        })
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GithubConfig {
    pub api_url: String,
    pub organization: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: GITHUB_API.to_string(),
            organization: "gramo-org".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HerokuConfig {
    pub api_url: String,
    pub app_prefix: String,
}

impl Default for HerokuConfig {
    fn default() -> Self {
        Self {
            api_url: HEROKU_API.to_string(),
            app_prefix: "gramo".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SnapCiConfig {
    pub api_url: String,
    pub user: String,
    pub branch: String,
}

impl Default for SnapCiConfig {
    fn default() -> Self {
        Self {
            api_url: SNAPCI_API.to_string(),
            user: "kjellm".to_string(),
            branch: "master".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TodoConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    pub github: GithubConfig,
    pub heroku: HerokuConfig,
    pub snapci: SnapCiConfig,
    /// Tracked metrics in display order. Defaults to the network metrics, plus
    /// `todos` when a scan root is configured.
    pub metrics: Option<Vec<Metric>>,
    pub thresholds: HashMap<Metric, ThresholdPair>,
    pub summary_path: PathBuf,
    pub refresh_interval_secs: u64,
    pub http: HttpConfig,
    pub todos: Option<TodoConfig>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            github: GithubConfig::default(),
            heroku: HerokuConfig::default(),
            snapci: SnapCiConfig::default(),
            metrics: None,
            thresholds: HashMap::new(),
            summary_path: PathBuf::from(DEFAULT_SUMMARY_PATH),
            refresh_interval_secs: DEFAULT_REFRESH_SECS,
            http: HttpConfig::default(),
            todos: None,
        }
    }
}

impl DashboardConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                e.to_string(),
                ErrorContext::new().with_source("config"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read config file: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config"),
            )
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("github.api_url", &self.github.api_url),
            ("heroku.api_url", &self.heroku.api_url),
            ("snapci.api_url", &self.snapci.api_url),
        ] {
            url::Url::parse(value).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid URL '{}': {}", value, e),
                    ErrorContext::new()
                        .with_field_path(field)
                        .with_source("config"),
                )
            })?;
        }

        if self.github.organization.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "organization must not be empty",
                ErrorContext::new()
                    .with_field_path("github.organization")
                    .with_source("config"),
            ));
        }

        if self.refresh_interval_secs == 0 {
            return Err(Error::configuration_with_context(
                "refresh interval must be at least one second",
                ErrorContext::new()
                    .with_field_path("refresh_interval_secs")
                    .with_source("config"),
            ));
        }

        if matches!(&self.metrics, Some(m) if m.is_empty()) {
            return Err(Error::configuration_with_context(
                "at least one metric must be tracked",
                ErrorContext::new()
                    .with_field_path("metrics")
                    .with_source("config"),
            ));
        }

        for (metric, pair) in &self.thresholds {
            if !pair.is_ordered() {
                warn!(
                    metric = metric.key(),
                    warn = pair.warn,
                    crit = pair.crit,
                    "crit threshold is below warn threshold"
                );
            }
        }
        Ok(())
    }

    pub fn tracked_metrics(&self) -> MetricSet {
        match &self.metrics {
            Some(list) => MetricSet::new(list.iter().copied()),
            None if self.todos.is_some() => MetricSet::network().with(Metric::Todos),
            None => MetricSet::network(),
        }
    }

    /// Metrics counted in the summary file. Without an explicit list this is
    /// every metric, so an unconfigured `todos` contributes a steady `ok`.
    pub fn summary_metrics(&self) -> MetricSet {
        match &self.metrics {
            Some(_) => self.tracked_metrics(),
            None => MetricSet::new(Metric::ALL),
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
            .iter()
            .fold(Thresholds::default(), |t, (m, pair)| t.with(*m, *pair))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Env-derived HTTP settings, with the config file's timeout taking precedence.
    pub fn http_settings(&self) -> HttpSettings {
        let mut settings = HttpSettings::from_env();
        if let Some(secs) = self.http.timeout_secs {
            settings.timeout = Duration::from_secs(secs.max(1));
        }
        settings
    }
}
