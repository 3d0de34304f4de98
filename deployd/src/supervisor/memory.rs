//! In-process supervisor for tests and dry runs

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::PlatformError;
use crate::supervisor::{ProcessDescription, ProcessStatus, ProcessSupervisor, StartConfig};

/// What the next `start` call does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Process comes up online
    Online,
    /// Process is registered but reports errored
    Errored,
    /// Process is registered but reports stopped
    Stopped,
    /// Process is registered but vanishes before it can be described
    Vanish,
    /// Supervisor rejects the start
    Reject(String),
}

#[derive(Debug, Clone)]
struct Process {
    config: StartConfig,
    status: ProcessStatus,
    pid: u32,
    restarts: u32,
    started: Instant,
    visible: bool,
}

#[derive(Debug, Default)]
struct Inner {
    processes: HashMap<String, Process>,
    saved: Vec<String>,
    next_outcome: Option<StartOutcome>,
    calls: Vec<String>,
    connected: bool,
}

/// Supervisor keeping its process table in memory
#[derive(Debug)]
pub struct MemorySupervisor {
    inner: Mutex<Inner>,
    next_pid: AtomicU32,
}

impl MemorySupervisor {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            next_pid: AtomicU32::new(1000),
        }
    }

    /// Whether `connect` has been called
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Process names captured by the last `persist`
    pub fn saved(&self) -> Vec<String> {
        let mut names = self.lock().saved.clone();
        names.sort();
        names
    }

    /// Script the outcome of subsequent `start` calls
    pub fn set_start_outcome(&self, outcome: StartOutcome) {
        self.lock().next_outcome = Some(outcome);
    }

    /// Operations performed so far, e.g. `start app_1`
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Names of processes the supervisor currently knows
    pub fn process_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.lock().processes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Launch config a process was started with
    pub fn config_of(&self, handle: &str) -> Option<StartConfig> {
        self.lock().processes.get(handle).map(|p| p.config.clone())
    }

    /// Force a process into a status, as if it crashed or was stopped externally
    pub fn set_status(&self, handle: &str, status: ProcessStatus) {
        if let Some(process) = self.lock().processes.get_mut(handle) {
            process.status = status;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: String) {
        debug!("memory supervisor: {}", call);
        self.lock().calls.push(call);
    }
}

impl Default for MemorySupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessSupervisor for MemorySupervisor {
    async fn connect(&self) -> Result<(), PlatformError> {
        self.record("connect".to_string());
        self.lock().connected = true;
        Ok(())
    }

    async fn start(&self, config: &StartConfig) -> Result<String, PlatformError> {
        self.record(format!("start {}", config.name));
        let mut inner = self.lock();

        let outcome = inner.next_outcome.clone().unwrap_or(StartOutcome::Online);
        let (status, visible) = match outcome {
            StartOutcome::Online => (ProcessStatus::Online, true),
            StartOutcome::Errored => (ProcessStatus::Errored, true),
            StartOutcome::Stopped => (ProcessStatus::Stopped, true),
            StartOutcome::Vanish => (ProcessStatus::Online, false),
            StartOutcome::Reject(reason) => {
                return Err(PlatformError::ProcessStartFailure(reason));
            }
        };

        let process = Process {
            config: config.clone(),
            status,
            pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
            restarts: 0,
            started: Instant::now(),
            visible,
        };
        inner.processes.insert(config.name.clone(), process);
        Ok(config.name.clone())
    }

    async fn stop(&self, handle: &str) -> Result<(), PlatformError> {
        self.record(format!("stop {}", handle));
        let mut inner = self.lock();
        let process = inner
            .processes
            .get_mut(handle)
            .ok_or_else(|| PlatformError::SupervisorError(format!("process {} not found", handle)))?;
        process.status = ProcessStatus::Stopped;
        Ok(())
    }

    async fn restart(&self, handle: &str) -> Result<(), PlatformError> {
        self.record(format!("restart {}", handle));
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.lock();
        let process = inner
            .processes
            .get_mut(handle)
            .ok_or_else(|| PlatformError::SupervisorError(format!("process {} not found", handle)))?;
        process.status = ProcessStatus::Online;
        process.restarts += 1;
        process.pid = pid;
        process.started = Instant::now();
        Ok(())
    }

    async fn describe(&self, handle: &str) -> Result<Option<ProcessDescription>, PlatformError> {
        let inner = self.lock();
        Ok(inner
            .processes
            .get(handle)
            .filter(|p| p.visible)
            .map(|p| {
                let online = p.status == ProcessStatus::Online;
                ProcessDescription {
                    name: p.config.name.clone(),
                    status: p.status,
                    pid: online.then_some(p.pid),
                    uptime_ms: online.then(|| p.started.elapsed().as_millis() as u64),
                    restart_count: p.restarts,
                    memory: 0,
                    cpu: 0.0,
                    out_log_path: Some(p.config.out_file.clone()),
                    err_log_path: Some(p.config.error_file.clone()),
                }
            }))
    }

    async fn delete(&self, handle: &str) -> Result<(), PlatformError> {
        self.record(format!("delete {}", handle));
        self.lock().processes.remove(handle);
        Ok(())
    }

    async fn persist(&self) -> Result<(), PlatformError> {
        self.record("persist".to_string());
        let mut inner = self.lock();
        inner.saved = inner.processes.keys().cloned().collect();
        Ok(())
    }

    async fn resurrect(&self) -> Result<(), PlatformError> {
        self.record("resurrect".to_string());
        Ok(())
    }
}
