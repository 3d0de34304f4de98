//! Port and subdomain allocation tests

use std::collections::HashMap;
use std::sync::Arc;

use deployd::alloc::subdomain;
use deployd::alloc::ResourceAllocator;
use deployd::deploy::registry::NewApp;
use deployd::errors::PlatformError;
use deployd::models::application::AppStatus;
use deployd::storage::settings::{DomainSettings, PortRangeSettings};
use deployd::store::{AppStore, MemoryStore};

use crate::fixtures::{repository, AppBuilder, Harness};

fn allocator(store: Arc<MemoryStore>, start: u16, end: u16) -> ResourceAllocator {
    ResourceAllocator::new(
        store,
        PortRangeSettings { start, end },
        DomainSettings {
            base_domain: Some("apps.example.com".to_string()),
            ssl_enabled: true,
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn test_lowest_free_port_skips_running_apps() {
    let store = Arc::new(MemoryStore::new());
    for (id, port) in [("a", 4000), ("b", 4001)] {
        let app = AppBuilder::new(id).port(port).status(AppStatus::Running).build();
        store.save_app(&app).await.unwrap();
    }

    let alloc = allocator(store, 4000, 4002);
    assert_eq!(alloc.allocate_port().await.unwrap(), 4002);
}

#[tokio::test]
async fn test_port_exhaustion() {
    let store = Arc::new(MemoryStore::new());
    for (id, port) in [("a", 4000), ("b", 4001), ("c", 4002)] {
        let app = AppBuilder::new(id).port(port).status(AppStatus::Running).build();
        store.save_app(&app).await.unwrap();
    }

    let alloc = allocator(store, 4000, 4002);
    let result = alloc.allocate_port().await;
    assert!(matches!(
        result,
        Err(PlatformError::PortExhaustion {
            start: 4000,
            end: 4002
        })
    ));
}

#[tokio::test]
async fn test_stopped_apps_do_not_hold_ports() {
    let store = Arc::new(MemoryStore::new());
    let app = AppBuilder::new("a").port(4000).status(AppStatus::Stopped).build();
    store.save_app(&app).await.unwrap();

    let alloc = allocator(store, 4000, 4002);
    assert_eq!(alloc.allocate_port().await.unwrap(), 4000);
}

#[tokio::test]
async fn test_reassign_port_only_when_taken() {
    let store = Arc::new(MemoryStore::new());
    let running = AppBuilder::new("a").port(4000).status(AppStatus::Running).build();
    store.save_app(&running).await.unwrap();

    let alloc = allocator(store, 4000, 4005);

    let clashing = AppBuilder::new("b").port(4000).build();
    assert_eq!(alloc.reassign_port_if_taken(&clashing).await.unwrap(), Some(4001));

    let free = AppBuilder::new("c").port(4003).build();
    assert_eq!(alloc.reassign_port_if_taken(&free).await.unwrap(), None);

    // The running app's own port is not a clash
    assert_eq!(alloc.reassign_port_if_taken(&running).await.unwrap(), None);
}

#[test]
fn test_subdomain_from_app_name() {
    assert_eq!(subdomain::clean_base("My Cool App!!"), "mycoolapp");

    let mut rng = rand::thread_rng();
    let candidate = subdomain::candidate("My Cool App!!", &mut rng);
    let (base, digits) = candidate.split_once('-').unwrap();
    assert_eq!(base, "mycoolapp");
    assert_eq!(digits.len(), 5);
    assert!(digits.chars().all(|c| c.is_ascii_digit()));
    assert!(subdomain::is_valid(&candidate));
}

#[test]
fn test_reserved_subdomains_are_invalid() {
    for reserved in subdomain::RESERVED_SUBDOMAINS {
        assert!(!subdomain::is_valid(reserved));
    }
    assert!(!subdomain::is_valid("-leading"));
    assert!(!subdomain::is_valid("Upper-12345"));
}

#[tokio::test]
async fn test_subdomain_url() {
    let alloc = allocator(Arc::new(MemoryStore::new()), 4000, 4002);
    assert_eq!(
        alloc.subdomain_url("shop-12345").unwrap(),
        "https://shop-12345.apps.example.com"
    );

    let no_domain = ResourceAllocator::new(
        Arc::new(MemoryStore::new()),
        PortRangeSettings {
            start: 4000,
            end: 4002,
        },
        DomainSettings::default(),
    );
    assert!(matches!(
        no_domain.subdomain_url("shop-12345"),
        Err(PlatformError::ConfigError(_))
    ));
    assert_eq!(no_domain.fallback_url(4001), "http://localhost:4001");
}

#[tokio::test]
async fn test_register_assigns_port_and_subdomain() {
    let harness = Harness::new().await;

    let first = harness.register("My Cool App!!", "true").await;
    assert_eq!(first.status(), AppStatus::Pending);
    assert_eq!(first.runtime.port, 4000);
    assert!(first.url.is_none());
    let sub = first.subdomain.clone().unwrap();
    assert!(sub.starts_with("mycoolapp-"));
    assert!(subdomain::is_valid(&sub));

    let second = harness.register("My Cool App!!", "true").await;
    assert_ne!(second.subdomain, first.subdomain);
}

#[tokio::test]
async fn test_register_rejects_invalid_requests() {
    let harness = Harness::new().await;

    let request = |name: &str, start: &str, env: HashMap<String, String>| NewApp {
        user_id: "user-1".to_string(),
        name: name.to_string(),
        repository: repository("shop"),
        start_command: start.to_string(),
        build_command: None,
        environment: env,
    };

    let result = harness
        .registry
        .register_app(request("  ", "node index.js", HashMap::new()))
        .await;
    assert!(matches!(result, Err(PlatformError::ValidationError(_))));

    let result = harness
        .registry
        .register_app(request("shop", "   ", HashMap::new()))
        .await;
    assert!(matches!(result, Err(PlatformError::ValidationError(_))));

    let env = HashMap::from([("A=B".to_string(), "x".to_string())]);
    let result = harness
        .registry
        .register_app(request("shop", "node index.js", env))
        .await;
    assert!(matches!(result, Err(PlatformError::ValidationError(_))));

    assert!(harness.registry.list_for_user("user-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_default_build_command() {
    let harness = Harness::new().await;
    let app = harness
        .registry
        .register_app(NewApp {
            user_id: "user-1".to_string(),
            name: "shop".to_string(),
            repository: repository("shop"),
            start_command: "node index.js".to_string(),
            build_command: None,
            environment: HashMap::new(),
        })
        .await
        .unwrap();
    assert_eq!(app.runtime.build_command, "npm install");
}

#[tokio::test]
async fn test_assign_missing_subdomains() {
    let harness = Harness::new().await;
    let bare = AppBuilder::new("legacy").port(4005).build();
    harness.store.save_app(&bare).await.unwrap();
    let named = AppBuilder::new("named").port(4006).subdomain("named-11111").build();
    harness.store.save_app(&named).await.unwrap();

    let assigned = harness.registry.assign_missing_subdomains().await.unwrap();
    assert_eq!(assigned, 1);

    let legacy = harness.app("legacy").await;
    assert!(legacy.subdomain.unwrap().starts_with("applegacy-"));
    assert_eq!(harness.app("named").await.subdomain.as_deref(), Some("named-11111"));

    let active = harness.allocator.active_subdomains().await.unwrap();
    assert_eq!(active.len(), 2);
}
