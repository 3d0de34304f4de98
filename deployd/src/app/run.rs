//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::PlatformError;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::workers::{log_tail, retention};

/// Run the deployd daemon
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), PlatformError> {
    info!("Initializing deployd...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start deployd: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<Arc<AppState>, PlatformError> {
    let app_state = Arc::new(AppState::init(options).await?);
    shutdown_manager.with_app_state(app_state.clone())?;

    // A supervisor outage must not keep the control API down
    if let Err(e) = app_state.recover().await {
        error!("Supervisor recovery failed: {}", e);
    }

    if options.enable_retention_worker {
        init_retention_worker(options, shutdown_manager, shutdown_tx.subscribe())?;
    }

    init_log_tail_worker(
        options,
        app_state.clone(),
        shutdown_manager,
        shutdown_tx.subscribe(),
    )?;

    if options.enable_server {
        init_socket_server(
            options,
            app_state.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )
        .await?;
    }

    Ok(app_state)
}

fn init_retention_worker(
    options: &AppOptions,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), PlatformError> {
    info!("Initializing log retention worker...");

    let worker_options = options.retention_worker.clone();
    let logs_dir = options.layout.app_logs_dir();

    let handle = tokio::spawn(async move {
        retention::run(
            &worker_options,
            &logs_dir,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_retention_worker_handle(handle)
}

fn init_log_tail_worker(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), PlatformError> {
    info!("Initializing log tail worker...");

    let worker_options = options.log_tail_worker.clone();
    let logs_dir = options.layout.app_logs_dir();

    let handle = tokio::spawn(async move {
        log_tail::run(
            &worker_options,
            app_state.store.as_ref(),
            app_state.broadcaster.as_ref(),
            &logs_dir,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_log_tail_worker_handle(handle)
}

async fn init_socket_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), PlatformError> {
    info!("Initializing local HTTP server...");

    let server_state = ServerState::new(
        app_state.store.clone(),
        app_state.orchestrator.clone(),
        app_state.registry.clone(),
        app_state.allocator.clone(),
        app_state.broadcaster.clone(),
        app_state.log_limiter.clone(),
        options.layout.app_logs_dir(),
        options.retention_worker.max_age,
    );

    let server_handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_socket_server_handle(server_handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    socket_server_handle: Option<JoinHandle<Result<(), PlatformError>>>,
    retention_worker_handle: Option<JoinHandle<()>>,
    log_tail_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            socket_server_handle: None,
            retention_worker_handle: None,
            log_tail_worker_handle: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), PlatformError> {
        if self.app_state.is_some() {
            return Err(PlatformError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_retention_worker_handle(
        &mut self,
        handle: JoinHandle<()>,
    ) -> Result<(), PlatformError> {
        if self.retention_worker_handle.is_some() {
            return Err(PlatformError::ShutdownError(
                "retention_handle already set".to_string(),
            ));
        }
        self.retention_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_log_tail_worker_handle(
        &mut self,
        handle: JoinHandle<()>,
    ) -> Result<(), PlatformError> {
        if self.log_tail_worker_handle.is_some() {
            return Err(PlatformError::ShutdownError(
                "log_tail_handle already set".to_string(),
            ));
        }
        self.log_tail_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_socket_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), PlatformError>>,
    ) -> Result<(), PlatformError> {
        if self.socket_server_handle.is_some() {
            return Err(PlatformError::ShutdownError("server_handle already set".to_string()));
        }
        self.socket_server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), PlatformError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), PlatformError> {
        info!("Shutting down deployd...");

        // 1. Socket server
        if let Some(handle) = self.socket_server_handle.take() {
            handle
                .await
                .map_err(|e| PlatformError::ShutdownError(e.to_string()))??;
        }

        // 2. Workers
        if let Some(handle) = self.log_tail_worker_handle.take() {
            handle
                .await
                .map_err(|e| PlatformError::ShutdownError(e.to_string()))?;
        }
        if let Some(handle) = self.retention_worker_handle.take() {
            handle
                .await
                .map_err(|e| PlatformError::ShutdownError(e.to_string()))?;
        }

        // 3. App state. Running applications stay up under the supervisor.
        if let Some(app_state) = self.app_state.take() {
            if let Err(e) = app_state.shutdown().await {
                warn!("App state shutdown failed: {}", e);
            }
        }

        info!("Shutdown complete");
        Ok(())
    }
}
