//! PM2 command-line adapter

use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::PlatformError;
use crate::filesys::dir::Dir;
use crate::supervisor::{ProcessDescription, ProcessStatus, ProcessSupervisor, StartConfig};
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Supervisor backed by the `pm2` binary
pub struct Pm2Supervisor {
    binary: String,
    ecosystem_dir: Dir,
    connect_attempts: u32,
    cooldown: CooldownOptions,
}

#[derive(Serialize)]
struct Ecosystem<'a> {
    apps: [&'a StartConfig; 1],
}

#[derive(Debug, Deserialize)]
struct JlistEntry {
    name: String,
    #[serde(default)]
    pid: Option<u32>,
    #[serde(default)]
    monit: Option<JlistMonit>,
    pm2_env: JlistEnv,
}

#[derive(Debug, Deserialize)]
struct JlistMonit {
    #[serde(default)]
    memory: u64,
    #[serde(default)]
    cpu: f64,
}

#[derive(Debug, Deserialize)]
struct JlistEnv {
    status: ProcessStatus,
    #[serde(default)]
    pm_uptime: Option<i64>,
    #[serde(default)]
    restart_time: u32,
    #[serde(default)]
    pm_out_log_path: Option<PathBuf>,
    #[serde(default)]
    pm_err_log_path: Option<PathBuf>,
}

impl From<JlistEntry> for ProcessDescription {
    fn from(entry: JlistEntry) -> Self {
        let online = entry.pm2_env.status == ProcessStatus::Online;
        let uptime_ms = entry
            .pm2_env
            .pm_uptime
            .filter(|_| online)
            .map(|started| (crate::utils::epoch_millis() - started).max(0) as u64);
        let monit = entry.monit.unwrap_or(JlistMonit { memory: 0, cpu: 0.0 });

        ProcessDescription {
            name: entry.name,
            status: entry.pm2_env.status,
            // pm2 reports pid 0 for processes that are not running
            pid: entry.pid.filter(|pid| *pid != 0),
            uptime_ms,
            restart_count: entry.pm2_env.restart_time,
            memory: monit.memory,
            cpu: monit.cpu,
            out_log_path: entry.pm2_env.pm_out_log_path,
            err_log_path: entry.pm2_env.pm_err_log_path,
        }
    }
}

impl Pm2Supervisor {
    pub fn new(binary: impl Into<String>, ecosystem_dir: Dir, connect_attempts: u32) -> Self {
        Self {
            binary: binary.into(),
            ecosystem_dir,
            connect_attempts: connect_attempts.max(1),
            cooldown: CooldownOptions::default(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<Output, PlatformError> {
        debug!("{} {}", self.binary, args.join(" "));
        Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                PlatformError::SupervisorConnection(format!("failed to run {}: {}", self.binary, e))
            })
    }

    async fn run_checked(&self, args: &[&str]) -> Result<Output, PlatformError> {
        let output = self.run(args).await?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(PlatformError::SupervisorError(format!(
                "pm2 {} failed: {}",
                args.join(" "),
                combined_output(&output)
            )))
        }
    }

    async fn jlist(&self) -> Result<Vec<JlistEntry>, PlatformError> {
        let output = self.run_checked(&["jlist"]).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        // pm2 may print banners before the JSON array
        let json = stdout
            .find('[')
            .map(|start| &stdout[start..])
            .unwrap_or("[]");
        Ok(serde_json::from_str(json)?)
    }
}

fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(stdout.trim());
    }
    text
}

#[async_trait]
impl ProcessSupervisor for Pm2Supervisor {
    async fn connect(&self) -> Result<(), PlatformError> {
        let mut last_error = String::new();

        for attempt in 0..self.connect_attempts {
            match self.run(&["ping"]).await {
                Ok(output) if output.status.success() => {
                    info!("Connected to pm2");
                    return Ok(());
                }
                Ok(output) => last_error = combined_output(&output),
                Err(e) => last_error = e.to_string(),
            }

            if attempt + 1 < self.connect_attempts {
                let delay: Duration = calc_exp_backoff(&self.cooldown, attempt);
                warn!(
                    "pm2 ping failed (attempt {}/{}): {}. Retrying in {:?}",
                    attempt + 1,
                    self.connect_attempts,
                    last_error,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(PlatformError::SupervisorConnection(last_error))
    }

    async fn start(&self, config: &StartConfig) -> Result<String, PlatformError> {
        let file = self.ecosystem_dir.file(&format!("{}.json", config.name));
        file.write_json(&Ecosystem { apps: [config] }).await?;

        let path = file.path().to_string_lossy().to_string();
        let output = self.run(&["start", &path]).await?;
        if !output.status.success() {
            return Err(PlatformError::ProcessStartFailure(combined_output(&output)));
        }

        info!("pm2 started {}", config.name);
        Ok(config.name.clone())
    }

    async fn stop(&self, handle: &str) -> Result<(), PlatformError> {
        self.run_checked(&["stop", handle]).await?;
        Ok(())
    }

    async fn restart(&self, handle: &str) -> Result<(), PlatformError> {
        self.run_checked(&["restart", handle]).await?;
        Ok(())
    }

    async fn describe(&self, handle: &str) -> Result<Option<ProcessDescription>, PlatformError> {
        let entries = self.jlist().await?;
        Ok(entries
            .into_iter()
            .find(|e| e.name == handle)
            .map(ProcessDescription::from))
    }

    async fn delete(&self, handle: &str) -> Result<(), PlatformError> {
        let output = self.run(&["delete", handle]).await?;
        if output.status.success() {
            return Ok(());
        }

        let text = combined_output(&output);
        if text.to_lowercase().contains("not found") {
            debug!("pm2 process {} already gone", handle);
            return Ok(());
        }
        Err(PlatformError::SupervisorError(format!(
            "pm2 delete {} failed: {}",
            handle, text
        )))
    }

    async fn persist(&self) -> Result<(), PlatformError> {
        self.run_checked(&["save"]).await?;
        Ok(())
    }

    async fn resurrect(&self) -> Result<(), PlatformError> {
        self.run_checked(&["resurrect"]).await?;
        info!("pm2 process list resurrected");
        Ok(())
    }
}
