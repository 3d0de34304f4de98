//! Server state

use std::sync::Arc;
use std::time::Duration;

use crate::alloc::ResourceAllocator;
use crate::cache::rate_limit::RateLimiter;
use crate::deploy::orchestrator::Orchestrator;
use crate::deploy::registry::AppRegistry;
use crate::events::Broadcaster;
use crate::filesys::dir::Dir;
use crate::store::AppStore;

/// Log reads allowed per user per window
pub const LOG_RATE_LIMIT: usize = 3;

/// Log read window
pub const LOG_RATE_WINDOW: Duration = Duration::from_secs(5);

/// Users tracked by the log rate limiter
pub const LOG_RATE_CAPACITY: usize = 10_000;

/// Server state shared across handlers
pub struct ServerState {
    pub store: Arc<dyn AppStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub registry: Arc<AppRegistry>,
    pub allocator: Arc<ResourceAllocator>,
    pub broadcaster: Arc<Broadcaster>,
    pub log_limiter: Arc<RateLimiter>,
    pub logs_dir: Dir,
    pub retention_max_age: Duration,
}

impl ServerState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn AppStore>,
        orchestrator: Arc<Orchestrator>,
        registry: Arc<AppRegistry>,
        allocator: Arc<ResourceAllocator>,
        broadcaster: Arc<Broadcaster>,
        log_limiter: Arc<RateLimiter>,
        logs_dir: Dir,
        retention_max_age: Duration,
    ) -> Self {
        Self {
            store,
            orchestrator,
            registry,
            allocator,
            broadcaster,
            log_limiter,
            logs_dir,
            retention_max_age,
        }
    }
}
