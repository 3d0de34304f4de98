//! Repository acquisition

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

use crate::deploy::process::{run_streaming, StageSink};
use crate::errors::PlatformError;
use crate::models::log::Severity;

/// Clone timeout used when none is configured
pub const DEFAULT_CLONE_TIMEOUT: Duration = Duration::from_secs(300);

/// Embed the access token as the URL user for github.com HTTPS remotes.
///
/// Other URLs are returned unchanged.
pub fn authenticated_url(
    clone_url: &str,
    token: Option<&SecretString>,
) -> Result<String, PlatformError> {
    let Some(token) = token else {
        return Ok(clone_url.to_string());
    };

    let mut url = Url::parse(clone_url)
        .map_err(|e| PlatformError::ValidationError(format!("invalid clone url: {}", e)))?;

    if url.scheme() != "https" || url.host_str() != Some("github.com") {
        return Ok(clone_url.to_string());
    }

    url.set_username(token.expose_secret())
        .map_err(|_| PlatformError::ValidationError("cannot set clone credentials".to_string()))?;
    Ok(url.to_string())
}

/// Masks the access token in forwarded git output
struct Redacted<'a> {
    inner: &'a dyn StageSink,
    secret: Option<&'a str>,
}

#[async_trait]
impl StageSink for Redacted<'_> {
    async fn line(&self, severity: Severity, message: String) {
        let message = match self.secret {
            Some(secret) if !secret.is_empty() => message.replace(secret, "***"),
            _ => message,
        };
        self.inner.line(severity, message).await;
    }
}

/// Clone `clone_url` at `branch` into `target`.
///
/// `target` must not exist. The child is killed when `timeout` elapses.
pub async fn clone_repository(
    git_program: &str,
    clone_url: &str,
    token: Option<&SecretString>,
    branch: &str,
    target: &Path,
    timeout: Duration,
    sink: &dyn StageSink,
) -> Result<(), PlatformError> {
    let remote = authenticated_url(clone_url, token)?;
    info!("Cloning {} (branch: {}) into {}", clone_url, branch, target.display());

    let mut command = Command::new(git_program);
    command
        .arg("clone")
        .arg("--branch")
        .arg(branch)
        .arg(&remote)
        .arg(target)
        .env("GIT_TERMINAL_PROMPT", "0");

    let sink = Redacted {
        inner: sink,
        secret: token.map(|t| t.expose_secret()),
    };
    let status = match tokio::time::timeout(timeout, run_streaming(command, &sink)).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            return Err(PlatformError::CloneFailure(format!(
                "failed to run {}: {}",
                git_program, e
            )));
        }
        Err(_) => return Err(PlatformError::CloneTimeout(timeout.as_secs())),
    };

    if !status.success() {
        return Err(PlatformError::CloneFailure(format!(
            "git clone exited with {}",
            status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string())
        )));
    }

    debug!("Clone of {} complete", clone_url);
    Ok(())
}
