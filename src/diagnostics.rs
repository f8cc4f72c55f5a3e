use async_trait::async_trait;
use std::path::PathBuf;

use crate::config::DiagnosticsSettings;
use crate::task::TaskHandle;

/// Best-effort windows into the daemon for humans reading the run log.
///
/// Every call may fail; failure is reported as `None` and never stops a run.
#[async_trait]
pub trait Diagnostics: Send + Sync {
    async fn daemon_log(&self) -> Option<String>;

    async fn process_list(&self) -> Option<String>;

    async fn daemon_status(&self) -> Option<String>;

    /// The daemon's own report for one task
    async fn process_report(&self, handle: TaskHandle) -> Option<String>;
}

/// Diagnostics gathered through the daemon's command-line front end
#[derive(Debug, Clone)]
pub struct ShellDiagnostics {
    daemon_log_file: Option<PathBuf>,
    process_list_command: Vec<String>,
    daemon_status_command: Vec<String>,
    process_report_command: Vec<String>,
}

impl ShellDiagnostics {
    pub fn new(settings: &DiagnosticsSettings) -> Self {
        Self {
            daemon_log_file: settings.daemon_log_file.clone(),
            process_list_command: settings.process_list_command.clone(),
            daemon_status_command: settings.daemon_status_command.clone(),
            process_report_command: settings.process_report_command.clone(),
        }
    }

    async fn run(command: &[String]) -> Option<String> {
        let (program, args) = command.split_first()?;
        let rendered = command.join(" ");

        match tokio::process::Command::new(program)
            .args(args)
            .output()
            .await
        {
            Ok(output) if output.status.success() => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                Some(text)
            }
            Ok(output) => {
                log::warn!(
                    "Note: the command '{rendered}' failed ({}), message: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                None
            }
            Err(e) => {
                log::warn!("Note: the command '{rendered}' could not be started: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl Diagnostics for ShellDiagnostics {
    async fn daemon_log(&self) -> Option<String> {
        let path = self.daemon_log_file.as_ref()?;
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Some(content),
            Err(e) => {
                log::warn!("Note: reading {} failed, message: {e}", path.display());
                None
            }
        }
    }

    async fn process_list(&self) -> Option<String> {
        Self::run(&self.process_list_command).await
    }

    async fn daemon_status(&self) -> Option<String> {
        Self::run(&self.daemon_status_command).await
    }

    async fn process_report(&self, handle: TaskHandle) -> Option<String> {
        if self.process_report_command.is_empty() {
            return None;
        }
        let mut command = self.process_report_command.clone();
        command.push(handle.to_string());
        Self::run(&command).await
    }
}

/// Log a diagnostic dump under a heading, or note that it is unavailable
pub fn log_dump(heading: &str, dump: Option<String>) {
    match dump {
        Some(text) => log::info!("Output of {heading}:\n{}", text.trim_end()),
        None => log::info!("Output of {heading}: <unavailable>"),
    }
}
