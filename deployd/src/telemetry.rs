//! Host and daemon metrics

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System};

use crate::errors::PlatformError;
use crate::store::{AppFilter, AppStore};
use crate::utils::version_info;

/// Host metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// CPU usage percentage (0-100)
    pub cpu_usage: f32,

    pub memory_used: u64,
    pub memory_total: u64,
    pub memory_percent: f32,

    pub disk_used: u64,
    pub disk_total: u64,
    pub disk_percent: f32,

    pub uptime_secs: u64,
    pub cpu_count: usize,
    pub hostname: String,
}

fn percent(used: u64, total: u64) -> f32 {
    if total > 0 {
        (used as f32 / total as f32) * 100.0
    } else {
        0.0
    }
}

/// Collect host metrics. Blocking; call from `spawn_blocking`.
pub fn collect_metrics() -> SystemMetrics {
    let mut sys = System::new_all();
    sys.refresh_all();

    let disks = Disks::new_with_refreshed_list();
    let (disk_used, disk_total) = disks.iter().fold((0u64, 0u64), |(used, total), disk| {
        (
            used + disk.total_space().saturating_sub(disk.available_space()),
            total + disk.total_space(),
        )
    });

    let memory_used = sys.used_memory();
    let memory_total = sys.total_memory();

    SystemMetrics {
        cpu_usage: sys.global_cpu_usage(),
        memory_used,
        memory_total,
        memory_percent: percent(memory_used, memory_total),
        disk_used,
        disk_total,
        disk_percent: percent(disk_used, disk_total),
        uptime_secs: System::uptime(),
        cpu_count: sys.cpus().len(),
        hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
    }
}

/// Daemon metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonMetrics {
    pub system: SystemMetrics,

    pub version: String,

    /// Application count per status
    pub apps_by_status: BTreeMap<String, usize>,

    /// Live event topics
    pub event_topics: usize,
}

/// Count applications per status
pub async fn count_apps_by_status(
    store: &dyn AppStore,
) -> Result<BTreeMap<String, usize>, PlatformError> {
    let apps = store.list_apps(&AppFilter::new()).await?;

    let mut counts = BTreeMap::new();
    for app in apps {
        *counts.entry(app.status().to_string()).or_insert(0) += 1;
    }
    Ok(counts)
}

/// Collect host and daemon metrics
pub async fn collect_daemon_metrics(
    store: &dyn AppStore,
    event_topics: usize,
) -> Result<DaemonMetrics, PlatformError> {
    let system = tokio::task::spawn_blocking(collect_metrics).await?;
    let apps_by_status = count_apps_by_status(store).await?;

    Ok(DaemonMetrics {
        system,
        version: version_info().version,
        apps_by_status,
        event_topics,
    })
}
