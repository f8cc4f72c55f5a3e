use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::ClientConfig;

/// Prefix for environment overrides, e.g. `HARNESS__POLLING__DEADLINE_SECS=600`
pub const ENV_PREFIX: &str = "HARNESS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub daemon: DaemonSettings,
    pub launch: LaunchSettings,
    pub polling: PollingSettings,
    pub diagnostics: DiagnosticsSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub sync_timeout_secs: u64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:52720".to_string(),
            timeout_secs: 30,
            sync_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchSettings {
    /// Number of doubling calculations, submitted with inputs `1..=calculations`
    pub calculations: usize,
    /// Number of plain nested workflows, submitted with inputs `0..workflows`
    pub workflows: usize,
    /// Code label the doubling calculations run with
    pub calculation_code: String,
    /// Code label of the adder used by the restart workflow
    pub add_code: String,
    /// Entry point caching is enabled for during the re-run
    pub caching_identifier: String,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            calculations: 15,
            workflows: 8,
            calculation_code: "doubler".to_string(),
            add_code: "add@localhost".to_string(),
            caching_identifier: "calculations:templatereplacer".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub interval_secs: u64,
    pub deadline_secs: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_secs: 15,
            deadline_secs: 4 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daemon_log_file: Option<PathBuf>,
    pub process_list_command: Vec<String>,
    pub daemon_status_command: Vec<String>,
    /// The task handle is appended as the last argument
    pub process_report_command: Vec<String>,
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        let command = |parts: &[&str]| parts.iter().map(|s| s.to_string()).collect();
        Self {
            daemon_log_file: None,
            process_list_command: command(&["verdi", "process", "list", "-a"]),
            daemon_status_command: command(&["verdi", "daemon", "status"]),
            process_report_command: command(&["verdi", "process", "report"]),
        }
    }
}

/// Values given on the command line; they win over every other source
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub endpoint: Option<String>,
    pub calculations: Option<usize>,
    pub workflows: Option<usize>,
    pub interval_secs: Option<u64>,
    pub deadline_secs: Option<u64>,
    pub daemon_log_file: Option<PathBuf>,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.daemon.endpoint.trim().is_empty() {
            return Err(anyhow::anyhow!("daemon.endpoint must not be empty"));
        }

        if self.daemon.timeout_secs == 0 || self.daemon.sync_timeout_secs == 0 {
            return Err(anyhow::anyhow!("daemon timeouts must be greater than 0"));
        }

        if self.launch.calculations == 0 {
            return Err(anyhow::anyhow!("launch.calculations must be greater than 0"));
        }

        if self.launch.workflows == 0 {
            return Err(anyhow::anyhow!("launch.workflows must be greater than 0"));
        }

        if self.polling.interval_secs == 0 {
            return Err(anyhow::anyhow!("polling.interval_secs must be greater than 0"));
        }

        if self.polling.deadline_secs < self.polling.interval_secs {
            return Err(anyhow::anyhow!(
                "polling.deadline_secs ({}) must not be shorter than polling.interval_secs ({})",
                self.polling.deadline_secs,
                self.polling.interval_secs
            ));
        }

        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &SettingsOverrides) {
        if let Some(endpoint) = &overrides.endpoint {
            self.daemon.endpoint = endpoint.clone();
        }

        if let Some(calculations) = overrides.calculations {
            self.launch.calculations = calculations;
        }

        if let Some(workflows) = overrides.workflows {
            self.launch.workflows = workflows;
        }

        if let Some(interval) = overrides.interval_secs {
            self.polling.interval_secs = interval;
        }

        if let Some(deadline) = overrides.deadline_secs {
            self.polling.deadline_secs = deadline;
        }

        if let Some(path) = &overrides.daemon_log_file {
            self.diagnostics.daemon_log_file = Some(path.clone());
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.daemon.endpoint.clone(),
            timeout: Duration::from_secs(self.daemon.timeout_secs),
            sync_timeout: Duration::from_secs(self.daemon.sync_timeout_secs),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_secs)
    }

    pub fn poll_deadline(&self) -> Duration {
        Duration::from_secs(self.polling.deadline_secs)
    }
}

/// Load settings: CLI args > env vars > config file > defaults
pub fn load_settings(config_path: Option<&Path>, overrides: &SettingsOverrides) -> Result<Settings> {
    let mut builder = config::Config::builder().add_source(
        config::Config::try_from(&Settings::default())
            .context("Failed to build default settings")?,
    );

    if let Some(path) = config_path {
        if path.exists() {
            log::info!("Loading configuration from file: {}", path.display());
        } else {
            log::info!("Config file not found: {}, using defaults", path.display());
        }
        builder = builder.add_source(config::File::from(path).required(false));
    }

    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut settings: Settings = builder
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Failed to parse configuration")?;

    settings.apply_overrides(overrides);
    settings
        .validate()
        .with_context(|| "Configuration validation failed")?;

    log::debug!("Final settings: {settings:?}");
    Ok(settings)
}

/// Render settings the way a config file would hold them
pub fn render_settings(settings: &Settings) -> Result<String> {
    toml::to_string_pretty(settings).context("Failed to serialize settings")
}
