//! Deployment pipeline coordinator
//!
//! The orchestrator is the only writer of an application's status. Every
//! pipeline run and lifecycle operation holds the application's busy guard.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::SecretString;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::alloc::ResourceAllocator;
use crate::applogs::{LogAggregator, LogPage, LogStats, Pagination};
use crate::deploy::fsm::{next_app_status, next_attempt_status, AppEvent, AttemptEvent};
use crate::deploy::git::{self, DEFAULT_CLONE_TIMEOUT};
use crate::deploy::guard::{BusyApps, BusyGuard};
use crate::deploy::install;
use crate::deploy::process::StageSink;
use crate::errors::PlatformError;
use crate::events::{Broadcaster, DeploymentStatus};
use crate::http::SourceControl;
use crate::models::application::{AppStatus, Application, LastCommit};
use crate::models::deployment::DeploymentAttempt;
use crate::models::log::{AppLogLine, LogEntry, LogSource, Severity};
use crate::storage::layout::StorageLayout;
use crate::store::{AppFilter, AppStore};
use crate::supervisor::{ProcessDescription, ProcessStatus, ProcessSupervisor, StartConfig};

/// Attempts shown when an application has no running process
const FALLBACK_ATTEMPTS: usize = 5;

/// Attempt log lines shown when an application has no running process
const FALLBACK_LOG_LINES: usize = 100;

/// Error recorded on builds cut short by a daemon exit
const INTERRUPTED: &str = "Deployment interrupted by daemon restart";

/// Orchestrator options
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Git binary used for cloning
    pub git_program: String,

    /// Clone stage timeout
    pub clone_timeout: Duration,

    /// Delay between start and status verification
    pub settle_delay: Duration,

    /// Memory ceiling passed to the supervisor
    pub max_memory_restart: String,

    /// Default size of the recent-attempts listing
    pub recent_attempts: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            git_program: "git".to_string(),
            clone_timeout: DEFAULT_CLONE_TIMEOUT,
            settle_delay: Duration::from_secs(2),
            max_memory_restart: "500M".to_string(),
            recent_attempts: 10,
        }
    }
}

/// Acknowledgement of a deployment request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployAck {
    pub app_id: String,
    pub message: String,
}

/// Process details attached to application logs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub pid: Option<u32>,
    pub uptime_ms: Option<u64>,
    pub restarts: u32,
    pub memory: u64,
    pub cpu: f64,
}

/// Application logs with the process status they were read under
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppLogs {
    pub status: String,
    #[serde(flatten)]
    pub page: LogPage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_info: Option<ProcessInfo>,
}

/// Stats of both output streams
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogFileStats {
    pub stdout: LogStats,
    pub stderr: LogStats,
}

/// Appends stage output to the attempt and broadcasts it
struct AttemptLog<'a> {
    store: &'a dyn AppStore,
    broadcaster: &'a Broadcaster,
    app_id: &'a str,
    attempt_id: &'a str,
}

#[async_trait]
impl StageSink for AttemptLog<'_> {
    async fn line(&self, severity: Severity, message: String) {
        debug!("[{}] {}: {}", self.app_id, severity, message);
        self.broadcaster
            .deployment_log(self.app_id, self.attempt_id, severity, &message);

        let entry = LogEntry::new(severity, message);
        if let Err(e) = self.store.append_attempt_log(self.attempt_id, entry).await {
            warn!("Failed to append log to attempt {}: {}", self.attempt_id, e);
        }
    }
}

/// Deployment orchestrator
pub struct Orchestrator {
    store: Arc<dyn AppStore>,
    supervisor: Arc<dyn ProcessSupervisor>,
    scm: Arc<dyn SourceControl>,
    allocator: Arc<ResourceAllocator>,
    broadcaster: Arc<Broadcaster>,
    aggregator: LogAggregator,
    layout: StorageLayout,
    options: OrchestratorOptions,
    busy: Arc<BusyApps>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn AppStore>,
        supervisor: Arc<dyn ProcessSupervisor>,
        scm: Arc<dyn SourceControl>,
        allocator: Arc<ResourceAllocator>,
        broadcaster: Arc<Broadcaster>,
        aggregator: LogAggregator,
        layout: StorageLayout,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            store,
            supervisor,
            scm,
            allocator,
            broadcaster,
            aggregator,
            layout,
            options,
            busy: Arc::new(BusyApps::new()),
        }
    }

    /// Whether an operation is in flight for the application
    pub fn is_busy(&self, app_id: &str) -> bool {
        self.busy.is_busy(app_id)
    }

    async fn load_app(&self, app_id: &str) -> Result<Application, PlatformError> {
        self.store
            .get_app(app_id)
            .await?
            .ok_or_else(|| PlatformError::NotFound(format!("app {}", app_id)))
    }

    /// Start a pipeline in the background and return immediately
    pub async fn request_deploy(
        self: &Arc<Self>,
        app_id: &str,
        user_id: &str,
        token: Option<SecretString>,
    ) -> Result<DeployAck, PlatformError> {
        let guard = self.busy.try_acquire(app_id)?;
        self.load_app(app_id).await?;

        let orchestrator = Arc::clone(self);
        let user_id = user_id.to_string();
        tokio::spawn(async move {
            let app_id = guard.app_id().to_string();
            if let Err(e) = orchestrator
                .deploy_guarded(&guard, &user_id, token.as_ref())
                .await
            {
                error!("Deployment of app {} failed: {}", app_id, e);
            }
        });

        Ok(DeployAck {
            app_id: app_id.to_string(),
            message: "Deployment started".to_string(),
        })
    }

    /// Run a pipeline to completion
    pub async fn deploy(
        &self,
        app_id: &str,
        user_id: &str,
        token: Option<&SecretString>,
    ) -> Result<DeploymentAttempt, PlatformError> {
        let guard = self.busy.try_acquire(app_id)?;
        self.deploy_guarded(&guard, user_id, token).await
    }

    async fn deploy_guarded(
        &self,
        guard: &BusyGuard,
        user_id: &str,
        token: Option<&SecretString>,
    ) -> Result<DeploymentAttempt, PlatformError> {
        let app_id = guard.app_id();
        let mut app = self.load_app(app_id).await?;
        info!("Deploying app {} ({})", app.name, app_id);

        // Rejected before any attempt is recorded
        let building = next_app_status(app.status(), &AppEvent::Deploy)?;

        let mut attempt = DeploymentAttempt::new(app_id, user_id, &app.repository.branch);
        attempt.status = next_attempt_status(attempt.status, &AttemptEvent::Start)?;
        self.store.save_attempt(&attempt).await?;

        app.deployment.status = building;
        app.touch();
        self.store.save_app(&app).await?;
        self.broadcaster.deployment_status(app_id, DeploymentStatus::Building);

        let attempt_id = attempt.id.clone();
        let log = AttemptLog {
            store: self.store.as_ref(),
            broadcaster: self.broadcaster.as_ref(),
            app_id,
            attempt_id: &attempt_id,
        };
        log.line(
            Severity::Info,
            format!("Starting deployment of {}", app.repository.full_name),
        )
        .await;

        match self.run_stages(&mut app, &mut attempt, token, &log).await {
            Ok(()) => {
                log.line(Severity::Info, "Deployment completed successfully".to_string())
                    .await;
                let attempt = self
                    .complete_attempt(&attempt, AttemptEvent::Succeed, None)
                    .await?;

                self.broadcaster.deployment_status(app_id, DeploymentStatus::Success);
                self.broadcaster.app_status(app_id, AppStatus::Running);
                self.broadcaster.notification(
                    user_id,
                    "Deployment successful",
                    &format!("{} is live at {}", app.name, app.url.as_deref().unwrap_or("")),
                    Severity::Info,
                );
                info!("App {} deployed", app_id);
                Ok(attempt)
            }
            Err(e) => {
                self.fail_pipeline(app_id, user_id, &attempt, &log, &e).await;
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        app: &mut Application,
        attempt: &mut DeploymentAttempt,
        token: Option<&SecretString>,
        log: &AttemptLog<'_>,
    ) -> Result<(), PlatformError> {
        // Commit metadata is informational; failures never abort the run
        if let Some(token) = token {
            let repo = &app.repository;
            match self
                .scm
                .fetch_latest_commit(token, &repo.owner, &repo.name, &repo.branch)
                .await
            {
                Ok(commit) => {
                    let summary = commit.message.lines().next().unwrap_or_default().to_string();
                    log.line(
                        Severity::Info,
                        format!("Deploying commit {}: {}", commit.short_sha(), summary),
                    )
                    .await;
                    attempt.commit_hash = Some(commit.sha.clone());
                    app.repository.last_commit = Some(LastCommit {
                        sha: commit.sha,
                        message: commit.message,
                        author: commit.author_name,
                        date: commit.author_date,
                        url: commit.url,
                    });
                }
                Err(e) => {
                    log.line(Severity::Warn, format!("Could not fetch latest commit: {}", e))
                        .await;
                }
            }
        }

        // Acquire source
        let workspace = self.layout.workspace_dir(&app.id);
        workspace.delete().await?;
        self.layout.deployments_dir().create().await?;

        log.line(
            Severity::Info,
            format!("Cloning repository {}", app.repository.clone_url),
        )
        .await;
        git::clone_repository(
            &self.options.git_program,
            &app.repository.clone_url,
            token,
            &app.repository.branch,
            workspace.path(),
            self.options.clone_timeout,
            log,
        )
        .await?;
        log.line(Severity::Info, "Repository cloned successfully".to_string())
            .await;

        // Build
        log.line(
            Severity::Info,
            format!("Running build command: {}", app.runtime.build_command),
        )
        .await;
        install::run_build(&app.runtime.build_command, workspace.path(), log).await?;
        log.line(Severity::Info, "Build completed".to_string()).await;

        // Start
        {
            let _alloc = self.allocator.lock().await;
            if let Some(port) = self.allocator.reassign_port_if_taken(app).await? {
                log.line(
                    Severity::Warn,
                    format!("Port {} is in use, reassigned to {}", app.runtime.port, port),
                )
                .await;
                app.runtime.port = port;
                app.touch();
                self.store.save_app(app).await?;
            }
        }

        let logs_dir = self.layout.app_logs_dir();
        logs_dir.create().await?;
        let config = StartConfig::for_app(
            app,
            workspace.path(),
            logs_dir.path(),
            &self.options.max_memory_restart,
        )?;

        if let Err(e) = self.supervisor.delete(&config.name).await {
            debug!("Removing previous process {} failed: {}", config.name, e);
        }

        log.line(
            Severity::Info,
            format!("Starting process {} on port {}", config.name, app.runtime.port),
        )
        .await;
        let handle = self.supervisor.start(&config).await.map_err(|e| match e {
            PlatformError::ProcessStartFailure(_) | PlatformError::SupervisorConnection(_) => e,
            other => PlatformError::ProcessStartFailure(other.to_string()),
        })?;

        app.deployment.process_handle = Some(handle.clone());
        app.touch();
        self.store.save_app(app).await?;

        // Verify
        tokio::time::sleep(self.options.settle_delay).await;
        match self.supervisor.describe(&handle).await? {
            None => {
                return Err(PlatformError::ProcessStartFailure(format!(
                    "process {} not found after start",
                    handle
                )));
            }
            Some(desc) if desc.status.is_start_failure() => {
                return Err(PlatformError::ProcessStartFailure(format!(
                    "process {} is {} after start",
                    handle,
                    desc.status.as_str()
                )));
            }
            Some(desc) => {
                log.line(
                    Severity::Info,
                    format!(
                        "Process online (pid {})",
                        desc.pid.map(|p| p.to_string()).unwrap_or_else(|| "?".to_string())
                    ),
                )
                .await;
            }
        }

        self.persist_best_effort().await;

        // Commit
        let now = Utc::now();
        app.deployment.status = next_app_status(app.status(), &AppEvent::DeploySuccess)?;
        app.deployment.deployed_at = Some(now);
        app.deployment.last_deployment = Some(now);
        app.deployment.deployment_count += 1;
        app.url = Some(self.allocator.app_url(app));
        app.touch();
        self.store.save_app(app).await?;

        Ok(())
    }

    /// Write the terminal status onto the stored attempt, keeping its logs
    async fn complete_attempt(
        &self,
        attempt: &DeploymentAttempt,
        event: AttemptEvent,
        error: Option<String>,
    ) -> Result<DeploymentAttempt, PlatformError> {
        let mut stored = self
            .store
            .get_attempt(&attempt.id)
            .await?
            .unwrap_or_else(|| attempt.clone());

        stored.status = next_attempt_status(stored.status, &event)?;
        stored.completed_at = Some(Utc::now());
        stored.commit_hash = attempt.commit_hash.clone();
        stored.error = error;
        self.store.save_attempt(&stored).await?;
        Ok(stored)
    }

    /// Record a failed run. Secondary failures are logged, never returned.
    async fn fail_pipeline(
        &self,
        app_id: &str,
        user_id: &str,
        attempt: &DeploymentAttempt,
        log: &AttemptLog<'_>,
        err: &PlatformError,
    ) {
        error!("Pipeline for app {} failed: {}", app_id, err);
        log.line(Severity::Error, format!("Deployment failed: {}", err))
            .await;

        if let Err(e) = self
            .complete_attempt(attempt, AttemptEvent::Fail, Some(err.to_string()))
            .await
        {
            warn!("Failed to record failure on attempt {}: {}", attempt.id, e);
        }

        let mut app = match self.store.get_app(app_id).await {
            Ok(Some(app)) => app,
            Ok(None) => {
                warn!("App {} vanished during deployment", app_id);
                return;
            }
            Err(e) => {
                warn!("Failed to reload app {}: {}", app_id, e);
                return;
            }
        };

        if let Some(handle) = app.deployment.process_handle.take() {
            match self.supervisor.delete(&handle).await {
                Ok(()) => self.persist_best_effort().await,
                Err(e) => warn!("Cleanup of process {} failed: {}", handle, e),
            }
        }

        app.deployment.status = next_app_status(app.status(), &AppEvent::DeployFailed)
            .unwrap_or(AppStatus::Failed);
        app.deployment.last_error = Some(err.to_string());
        app.deployment.last_error_at = Some(Utc::now());
        app.touch();
        if let Err(e) = self.store.save_app(&app).await {
            warn!("Failed to record failure on app {}: {}", app_id, e);
        }

        self.broadcaster.deployment_status(app_id, DeploymentStatus::Failed);
        self.broadcaster.app_status(app_id, AppStatus::Failed);
        self.broadcaster.notification(
            user_id,
            "Deployment failed",
            &format!("{}: {}", app.name, err),
            Severity::Error,
        );
    }

    fn require_handle(app: &Application) -> Result<String, PlatformError> {
        app.deployment.process_handle.clone().ok_or_else(|| {
            PlatformError::ValidationError(format!("app {} has no running process", app.id))
        })
    }

    async fn persist_best_effort(&self) {
        if let Err(e) = self.supervisor.persist().await {
            warn!("Failed to persist supervisor process list: {}", e);
        }
    }

    /// Stop the application's process
    pub async fn stop(&self, app_id: &str) -> Result<Application, PlatformError> {
        let _guard = self.busy.try_acquire(app_id)?;
        let mut app = self.load_app(app_id).await?;
        let handle = Self::require_handle(&app)?;

        self.supervisor.stop(&handle).await?;
        app.deployment.status = next_app_status(app.status(), &AppEvent::Stop)?;
        app.touch();
        self.store.save_app(&app).await?;
        self.persist_best_effort().await;

        self.broadcaster.app_status(app_id, AppStatus::Stopped);
        info!("Stopped app {}", app_id);
        Ok(app)
    }

    /// Restart the application's process
    pub async fn restart(&self, app_id: &str) -> Result<Application, PlatformError> {
        let _guard = self.busy.try_acquire(app_id)?;
        let mut app = self.load_app(app_id).await?;
        let handle = Self::require_handle(&app)?;

        self.supervisor.restart(&handle).await?;
        app.deployment.status = next_app_status(app.status(), &AppEvent::Restart)?;
        app.touch();
        self.store.save_app(&app).await?;
        self.persist_best_effort().await;

        self.broadcaster.app_status(app_id, AppStatus::Running);
        info!("Restarted app {}", app_id);
        Ok(app)
    }

    /// Delete the application with its process, workspace, and attempts.
    ///
    /// A failure part-way leaves the record in place so the call can be
    /// repeated.
    pub async fn delete(&self, app_id: &str) -> Result<(), PlatformError> {
        let _guard = self.busy.try_acquire(app_id)?;
        let app = self.load_app(app_id).await?;

        if let Some(subdomain) = &app.subdomain {
            if let Err(e) = self.allocator.release_subdomain(subdomain).await {
                warn!("Failed to release subdomain {}: {}", subdomain, e);
            }
        }

        if let Some(handle) = &app.deployment.process_handle {
            self.supervisor.delete(handle).await?;
        }

        self.layout.workspace_dir(app_id).delete().await?;
        let attempts = self.store.delete_attempts(app_id).await?;
        self.store.delete_app(app_id).await?;
        self.persist_best_effort().await;

        info!("Deleted app {} ({} attempt(s))", app_id, attempts);
        Ok(())
    }

    /// Align stored statuses with what the supervisor reports.
    ///
    /// Returns the number of applications updated.
    pub async fn reconcile(&self) -> Result<usize, PlatformError> {
        let mut updated = self.fail_interrupted_builds().await?;

        let apps = self
            .store
            .list_apps(&AppFilter::new().with_process_handle(true))
            .await?;

        for mut app in apps {
            // An operation in flight owns the status
            if self.busy.is_busy(&app.id) {
                continue;
            }
            let Some(handle) = app.deployment.process_handle.clone() else {
                continue;
            };

            let observed = match self.supervisor.describe(&handle).await {
                Ok(None) => AppStatus::Stopped,
                Ok(Some(desc)) => match desc.status {
                    ProcessStatus::Online => AppStatus::Running,
                    ProcessStatus::Errored => AppStatus::Failed,
                    _ => AppStatus::Stopped,
                },
                Err(e) => {
                    warn!("Could not describe {} during reconciliation: {}", handle, e);
                    continue;
                }
            };

            if observed == app.status() {
                continue;
            }

            let previous = app.status();
            app.deployment.status = next_app_status(previous, &AppEvent::Observed(observed))?;
            app.touch();
            match self.store.save_app(&app).await {
                Ok(()) => {
                    info!("Reconciled app {}: {} -> {}", app.id, previous, observed);
                    self.broadcaster.app_status(&app.id, observed);
                    updated += 1;
                }
                Err(e) => warn!("Failed to reconcile app {}: {}", app.id, e),
            }
        }

        Ok(updated)
    }

    /// Mark builds cut short by a daemon exit as failed, along with their
    /// unfinished attempts. Builds still running in this process are left
    /// alone.
    async fn fail_interrupted_builds(&self) -> Result<usize, PlatformError> {
        let apps = self
            .store
            .list_apps(&AppFilter::new().with_status(AppStatus::Building))
            .await?;
        let mut updated = 0;

        for app in apps {
            let Ok(_guard) = self.busy.try_acquire(&app.id) else {
                continue;
            };

            let attempts = self.store.list_attempts(&app.id, None).await?;
            for attempt in attempts.iter().filter(|a| !a.status.is_terminal()) {
                if let Err(e) = self
                    .complete_attempt(attempt, AttemptEvent::Fail, Some(INTERRUPTED.to_string()))
                    .await
                {
                    warn!("Failed to close attempt {}: {}", attempt.id, e);
                }
            }

            // Reload, the attempts above do not touch the app record
            let Some(mut app) = self.store.get_app(&app.id).await? else {
                continue;
            };
            app.deployment.status = next_app_status(app.status(), &AppEvent::DeployFailed)?;
            app.deployment.last_error = Some(INTERRUPTED.to_string());
            app.deployment.last_error_at = Some(Utc::now());
            app.touch();
            match self.store.save_app(&app).await {
                Ok(()) => {
                    warn!("App {} was building when the daemon stopped, marked failed", app.id);
                    self.broadcaster.app_status(&app.id, AppStatus::Failed);
                    updated += 1;
                }
                Err(e) => warn!("Failed to mark app {} failed: {}", app.id, e),
            }
        }

        Ok(updated)
    }

    /// Most recent attempts, newest first
    pub async fn recent_attempts(
        &self,
        app_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<DeploymentAttempt>, PlatformError> {
        let limit = limit.unwrap_or(self.options.recent_attempts);
        self.store.list_attempts(app_id, Some(limit)).await
    }

    /// One attempt by ID
    pub async fn attempt(&self, attempt_id: &str) -> Result<DeploymentAttempt, PlatformError> {
        self.store
            .get_attempt(attempt_id)
            .await?
            .ok_or_else(|| PlatformError::NotFound(format!("attempt {}", attempt_id)))
    }

    /// Paginated logs for an application.
    ///
    /// Without a process handle the latest attempt logs are returned as a
    /// single page.
    pub async fn app_logs(
        &self,
        app_id: &str,
        page: usize,
        page_size: usize,
    ) -> Result<AppLogs, PlatformError> {
        let app = self.load_app(app_id).await?;

        let Some(handle) = app.deployment.process_handle.clone() else {
            return self.attempt_logs_page(&app).await;
        };

        let Some(desc) = self.supervisor.describe(&handle).await? else {
            return Ok(AppLogs {
                status: "not_found".to_string(),
                page: LogPage::empty(page, page_size),
                process_info: None,
            });
        };

        let (out, err) = self.log_paths(&app, Some(&desc));

        let page = self
            .aggregator
            .merge(
                vec![(LogSource::Stdout, out), (LogSource::Stderr, err)],
                page,
                page_size,
            )
            .await?;

        Ok(AppLogs {
            status: desc.status.as_str().to_string(),
            page,
            process_info: Some(ProcessInfo {
                pid: desc.pid,
                uptime_ms: desc.uptime_ms,
                restarts: desc.restart_count,
                memory: desc.memory,
                cpu: desc.cpu,
            }),
        })
    }

    /// stdout and stderr paths, preferring what the supervisor reports
    fn log_paths(
        &self,
        app: &Application,
        desc: Option<&ProcessDescription>,
    ) -> (PathBuf, PathBuf) {
        let name = app.process_name();
        let logs_dir = self.layout.app_logs_dir();
        let out = desc
            .and_then(|d| d.out_log_path.clone())
            .unwrap_or_else(|| logs_dir.path().join(format!("{}.out", name)));
        let err = desc
            .and_then(|d| d.err_log_path.clone())
            .unwrap_or_else(|| logs_dir.path().join(format!("{}.err", name)));
        (out, err)
    }

    /// Paginated logs of one stream
    pub async fn stream_logs(
        &self,
        app_id: &str,
        source: LogSource,
        page: usize,
        page_size: usize,
    ) -> Result<LogPage, PlatformError> {
        let app = self.load_app(app_id).await?;
        let (out, err) = self.log_paths(&app, None);
        let path = match source {
            LogSource::Stdout => out,
            LogSource::Stderr => err,
            LogSource::Deployment => {
                return Err(PlatformError::ValidationError(
                    "deployment logs are read through attempts".to_string(),
                ))
            }
        };
        self.aggregator
            .paginate_file(&path, source, page, page_size)
            .await
    }

    /// Size and line counts of the application's log files
    pub async fn log_stats(&self, app_id: &str) -> Result<LogFileStats, PlatformError> {
        let app = self.load_app(app_id).await?;
        let (out, err) = self.log_paths(&app, None);
        Ok(LogFileStats {
            stdout: self.aggregator.log_stats(&out).await?,
            stderr: self.aggregator.log_stats(&err).await?,
        })
    }

    async fn attempt_logs_page(&self, app: &Application) -> Result<AppLogs, PlatformError> {
        let attempts = self
            .store
            .list_attempts(&app.id, Some(FALLBACK_ATTEMPTS))
            .await?;

        let mut lines: Vec<AppLogLine> = attempts
            .iter()
            .flat_map(|a| a.logs.iter())
            .map(|entry| AppLogLine {
                id: 0,
                timestamp: entry.timestamp,
                severity: entry.severity,
                message: entry.message.clone(),
                source: LogSource::Deployment,
            })
            .collect();

        lines.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        lines.truncate(FALLBACK_LOG_LINES);
        for (id, line) in lines.iter_mut().enumerate() {
            line.id = id;
        }

        let total = lines.len();
        Ok(AppLogs {
            status: app.status().to_string(),
            page: LogPage {
                logs: lines,
                pagination: Pagination {
                    page: 1,
                    page_size: total,
                    total_lines: total,
                    total_pages: usize::from(total > 0),
                    has_next: false,
                    has_prev: false,
                },
            },
            process_info: None,
        })
    }
}
