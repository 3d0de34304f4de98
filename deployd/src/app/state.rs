//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::alloc::ResourceAllocator;
use crate::app::options::AppOptions;
use crate::applogs::LogAggregator;
use crate::cache::rate_limit::RateLimiter;
use crate::deploy::orchestrator::Orchestrator;
use crate::deploy::registry::AppRegistry;
use crate::errors::PlatformError;
use crate::events::Broadcaster;
use crate::http::client::HttpClient;
use crate::http::SourceControl;
use crate::server::state::{LOG_RATE_CAPACITY, LOG_RATE_LIMIT, LOG_RATE_WINDOW};
use crate::storage::settings::SupervisorKind;
use crate::store::{AppStore, FileStore};
use crate::supervisor::memory::MemorySupervisor;
use crate::supervisor::pm2::Pm2Supervisor;
use crate::supervisor::ProcessSupervisor;

/// Main application state
pub struct AppState {
    /// Application and attempt records
    pub store: Arc<dyn AppStore>,

    /// Process supervisor
    pub supervisor: Arc<dyn ProcessSupervisor>,

    /// Port and subdomain allocation
    pub allocator: Arc<ResourceAllocator>,

    /// Event fan-out
    pub broadcaster: Arc<Broadcaster>,

    pub orchestrator: Arc<Orchestrator>,
    pub registry: Arc<AppRegistry>,

    /// Per-user limiter for log reads
    pub log_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Initialize application state
    pub async fn init(options: &AppOptions) -> Result<Self, PlatformError> {
        info!("Initializing application state...");

        let layout = &options.layout;
        layout.setup().await?;

        let store: Arc<dyn AppStore> = Arc::new(FileStore::open(layout.store_file()).await?);

        let supervisor: Arc<dyn ProcessSupervisor> = match options.supervisor.kind {
            SupervisorKind::Pm2 => Arc::new(Pm2Supervisor::new(
                options.supervisor.pm2_binary.clone(),
                layout.supervisor_dir(),
                options.supervisor.connect_attempts,
            )),
            SupervisorKind::Memory => Arc::new(MemorySupervisor::new()),
        };

        let scm: Arc<dyn SourceControl> = Arc::new(HttpClient::new(&options.scm_base_url)?);

        let allocator = Arc::new(ResourceAllocator::new(
            store.clone(),
            options.ports.clone(),
            options.domain.clone(),
        ));

        let broadcaster = Arc::new(Broadcaster::new(
            options.events.topic_capacity,
            options.events.max_connections,
        ));

        let orchestrator = Arc::new(Orchestrator::new(
            store.clone(),
            supervisor.clone(),
            scm.clone(),
            allocator.clone(),
            broadcaster.clone(),
            LogAggregator::default(),
            layout.clone(),
            options.orchestrator.clone(),
        ));

        let registry = Arc::new(AppRegistry::new(store.clone(), allocator.clone(), scm));

        let log_limiter = Arc::new(RateLimiter::new(
            LOG_RATE_LIMIT,
            LOG_RATE_WINDOW,
            LOG_RATE_CAPACITY,
        ));

        Ok(Self {
            store,
            supervisor,
            allocator,
            broadcaster,
            orchestrator,
            registry,
            log_limiter,
        })
    }

    /// Bring the supervisor up and align stored statuses with it
    pub async fn recover(&self) -> Result<(), PlatformError> {
        self.supervisor.connect().await?;
        self.supervisor.resurrect().await?;
        let updated = self.orchestrator.reconcile().await?;
        info!("Recovered supervisor state, {} app(s) reconciled", updated);
        Ok(())
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), PlatformError> {
        info!("Shutting down application state...");
        self.supervisor.persist().await?;
        self.broadcaster.prune();
        Ok(())
    }
}
