//! Shared test fixtures

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use scm_models::models::{BranchInfo, CommitInfo, RepositoryInfo};
use secrecy::SecretString;
use tempfile::TempDir;

use deployd::alloc::ResourceAllocator;
use deployd::applogs::LogAggregator;
use deployd::deploy::orchestrator::{Orchestrator, OrchestratorOptions};
use deployd::deploy::registry::{AppRegistry, NewApp};
use deployd::errors::PlatformError;
use deployd::events::Broadcaster;
use deployd::http::SourceControl;
use deployd::models::application::{
    AppStatus, Application, DeploymentInfo, Repository, RuntimeConfig,
};
use deployd::storage::layout::StorageLayout;
use deployd::storage::settings::{DomainSettings, PortRangeSettings};
use deployd::store::{AppStore, MemoryStore};
use deployd::supervisor::memory::MemorySupervisor;

/// Clones by creating the target directory (the last argument)
pub const GIT_OK: &str = r#"#!/bin/sh
for last; do :; done
echo "Cloning into '$last'..." >&2
mkdir -p "$last"
"#;

/// Never finishes on its own
pub const GIT_HANGS: &str = "#!/bin/sh\nexec sleep 30\n";

/// Fails like an unknown repository
pub const GIT_FAILS: &str = r#"#!/bin/sh
echo "fatal: repository not found" >&2
exit 128
"#;

/// Write an executable shell script
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn repository(name: &str) -> Repository {
    Repository {
        name: name.to_string(),
        full_name: format!("acme/{}", name),
        owner: "acme".to_string(),
        html_url: format!("https://github.com/acme/{}", name),
        clone_url: format!("https://github.com/acme/{}.git", name),
        branch: "main".to_string(),
        last_commit: None,
    }
}

/// Application record builder
pub struct AppBuilder {
    app: Application,
}

impl AppBuilder {
    pub fn new(id: &str) -> Self {
        let now = Utc::now();
        Self {
            app: Application {
                id: id.to_string(),
                user_id: "user-1".to_string(),
                name: format!("app {}", id),
                repository: repository("shop"),
                runtime: RuntimeConfig {
                    start_command: "node server.js".to_string(),
                    build_command: "true".to_string(),
                    environment: HashMap::new(),
                    port: 4000,
                },
                subdomain: None,
                deployment: DeploymentInfo::default(),
                url: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn user(mut self, user_id: &str) -> Self {
        self.app.user_id = user_id.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.app.runtime.port = port;
        self
    }

    pub fn status(mut self, status: AppStatus) -> Self {
        self.app.deployment.status = status;
        self
    }

    pub fn subdomain(mut self, subdomain: &str) -> Self {
        self.app.subdomain = Some(subdomain.to_string());
        self
    }

    pub fn handle(mut self, handle: &str) -> Self {
        self.app.deployment.process_handle = Some(handle.to_string());
        self
    }

    pub fn build(self) -> Application {
        self.app
    }
}

/// Source control double with a fixed head commit
#[derive(Default)]
pub struct FakeScm {
    pub head: Mutex<Option<CommitInfo>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeScm {
    pub fn with_head(sha: &str, message: &str) -> Self {
        let scm = Self::default();
        *scm.head.lock().unwrap() = Some(CommitInfo {
            sha: sha.to_string(),
            message: message.to_string(),
            author_name: "Ada".to_string(),
            author_date: Utc::now(),
            url: format!("https://github.com/acme/shop/commit/{}", sha),
        });
        scm
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SourceControl for FakeScm {
    async fn fetch_repository(
        &self,
        _token: &SecretString,
        owner: &str,
        repo: &str,
    ) -> Result<RepositoryInfo, PlatformError> {
        self.record(format!("repository {}/{}", owner, repo));
        Ok(RepositoryInfo {
            id: 7,
            name: repo.to_string(),
            full_name: format!("{}/{}", owner, repo),
            description: String::new(),
            private: false,
            owner: owner.to_string(),
            url: format!("https://github.com/{}/{}", owner, repo),
            clone_url: format!("https://github.com/{}/{}.git", owner, repo),
            default_branch: "trunk".to_string(),
            language: Some("JavaScript".to_string()),
        })
    }

    async fn fetch_branches(
        &self,
        _token: &SecretString,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<BranchInfo>, PlatformError> {
        self.record(format!("branches {}/{}", owner, repo));
        Ok(Vec::new())
    }

    async fn fetch_latest_commit(
        &self,
        _token: &SecretString,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<CommitInfo, PlatformError> {
        self.record(format!("commit {}/{}@{}", owner, repo, branch));
        self.head
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PlatformError::NotFound(format!("branch {}", branch)))
    }
}

/// Fully wired orchestrator over in-memory collaborators
pub struct Harness {
    pub tmp: TempDir,
    pub layout: StorageLayout,
    pub store: Arc<MemoryStore>,
    pub supervisor: Arc<MemorySupervisor>,
    pub scm: Arc<FakeScm>,
    pub allocator: Arc<ResourceAllocator>,
    pub broadcaster: Arc<Broadcaster>,
    pub orchestrator: Arc<Orchestrator>,
    pub registry: Arc<AppRegistry>,
}

pub struct HarnessOptions {
    pub git_script: &'static str,
    pub clone_timeout: Duration,
    pub ports: PortRangeSettings,
    pub scm: FakeScm,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            git_script: GIT_OK,
            clone_timeout: Duration::from_secs(30),
            ports: PortRangeSettings {
                start: 4000,
                end: 4010,
            },
            scm: FakeScm::default(),
        }
    }
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_options(HarnessOptions::default()).await
    }

    pub async fn with_options(options: HarnessOptions) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(tmp.path().join("home"));
        layout.setup().await.unwrap();

        let bin = tmp.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let git = write_script(&bin, "git", options.git_script);

        let store = Arc::new(MemoryStore::new());
        let supervisor = Arc::new(MemorySupervisor::new());
        let scm = Arc::new(options.scm);
        let domain = DomainSettings {
            base_domain: Some("apps.example.com".to_string()),
            ssl_enabled: true,
            ..Default::default()
        };
        let allocator = Arc::new(ResourceAllocator::new(store.clone(), options.ports, domain));
        let broadcaster = Arc::new(Broadcaster::default());

        let orchestrator = Arc::new(Orchestrator::new(
            store.clone(),
            supervisor.clone(),
            scm.clone(),
            allocator.clone(),
            broadcaster.clone(),
            LogAggregator::default(),
            layout.clone(),
            OrchestratorOptions {
                git_program: git.to_string_lossy().into_owned(),
                clone_timeout: options.clone_timeout,
                settle_delay: Duration::from_millis(10),
                ..Default::default()
            },
        ));

        let registry = Arc::new(AppRegistry::new(store.clone(), allocator.clone(), scm.clone()));

        Self {
            tmp,
            layout,
            store,
            supervisor,
            scm,
            allocator,
            broadcaster,
            orchestrator,
            registry,
        }
    }

    /// Register an app with the given build command
    pub async fn register(&self, name: &str, build_command: &str) -> Application {
        self.registry
            .register_app(NewApp {
                user_id: "user-1".to_string(),
                name: name.to_string(),
                repository: repository("shop"),
                start_command: "node server.js".to_string(),
                build_command: Some(build_command.to_string()),
                environment: HashMap::from([("API_KEY".to_string(), "k".to_string())]),
            })
            .await
            .unwrap()
    }

    pub async fn app(&self, id: &str) -> Application {
        self.store.get_app(id).await.unwrap().unwrap()
    }
}
