//! Application registration

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use scm_models::models::{BranchInfo, CommitCheck};
use secrecy::SecretString;
use tracing::{info, warn};

use crate::alloc::ResourceAllocator;
use crate::errors::PlatformError;
use crate::http::repos::check_for_newer_commits;
use crate::http::SourceControl;
use crate::models::application::{
    AppStatus, Application, DeploymentInfo, Repository, RuntimeConfig, DEFAULT_BUILD_COMMAND,
};
use crate::store::{AppFilter, AppStore};
use crate::utils::generate_uuid;

/// Registration request
#[derive(Debug, Clone)]
pub struct NewApp {
    pub user_id: String,
    pub name: String,
    pub repository: Repository,
    pub start_command: String,
    pub build_command: Option<String>,
    pub environment: HashMap<String, String>,
}

/// Creates applications and maintains their leases
pub struct AppRegistry {
    store: Arc<dyn AppStore>,
    allocator: Arc<ResourceAllocator>,
    scm: Arc<dyn SourceControl>,
}

impl AppRegistry {
    pub fn new(
        store: Arc<dyn AppStore>,
        allocator: Arc<ResourceAllocator>,
        scm: Arc<dyn SourceControl>,
    ) -> Self {
        Self {
            store,
            allocator,
            scm,
        }
    }

    fn validate(request: &NewApp) -> Result<(), PlatformError> {
        if request.name.trim().is_empty() {
            return Err(PlatformError::ValidationError(
                "app name must not be empty".to_string(),
            ));
        }
        if request.start_command.split_whitespace().next().is_none() {
            return Err(PlatformError::ValidationError(
                "start command must not be empty".to_string(),
            ));
        }
        if request.repository.clone_url.is_empty() {
            return Err(PlatformError::ValidationError(
                "repository clone url must not be empty".to_string(),
            ));
        }
        if request.repository.branch.is_empty() {
            return Err(PlatformError::ValidationError(
                "repository branch must not be empty".to_string(),
            ));
        }
        if let Some(key) = request.environment.keys().find(|k| k.is_empty() || k.contains('=')) {
            return Err(PlatformError::ValidationError(format!(
                "invalid environment variable name '{}'",
                key
            )));
        }
        Ok(())
    }

    /// Register a new application with a fresh port and subdomain.
    ///
    /// A subdomain failure does not block registration; the app falls back
    /// to its port URL.
    pub async fn register_app(&self, request: NewApp) -> Result<Application, PlatformError> {
        Self::validate(&request)?;

        let _lock = self.allocator.lock().await;
        let port = self.allocator.allocate_port().await?;
        let subdomain = match self.allocator.allocate_subdomain(&request.name).await {
            Ok(subdomain) => Some(subdomain),
            Err(e) => {
                warn!("No subdomain for '{}': {}", request.name, e);
                None
            }
        };

        let now = Utc::now();
        let build_command = request
            .build_command
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BUILD_COMMAND.to_string());

        let app = Application {
            id: generate_uuid(),
            user_id: request.user_id,
            name: request.name,
            repository: request.repository,
            runtime: RuntimeConfig {
                start_command: request.start_command,
                build_command,
                environment: request.environment,
                port,
            },
            subdomain,
            deployment: DeploymentInfo {
                status: AppStatus::Pending,
                ..Default::default()
            },
            url: None,
            created_at: now,
            updated_at: now,
        };

        self.store.save_app(&app).await?;
        info!(
            "Registered app {} ({}) on port {}",
            app.name, app.id, app.runtime.port
        );
        Ok(app)
    }

    /// Register an application using the repository metadata from source
    /// control. An empty branch selects the repository's default branch.
    pub async fn register_from_source(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
        mut request: NewApp,
    ) -> Result<Application, PlatformError> {
        let info = self.scm.fetch_repository(token, owner, repo).await?;

        let branch = if request.repository.branch.is_empty() {
            info.default_branch.clone()
        } else {
            request.repository.branch.clone()
        };

        request.repository = Repository {
            name: info.name,
            full_name: info.full_name,
            owner: info.owner,
            html_url: info.url,
            clone_url: info.clone_url,
            branch,
            last_commit: None,
        };
        self.register_app(request).await
    }

    /// Give a subdomain to every application that lacks one.
    ///
    /// Returns the number of applications updated.
    pub async fn assign_missing_subdomains(&self) -> Result<usize, PlatformError> {
        let _lock = self.allocator.lock().await;
        let apps = self
            .store
            .list_apps(&AppFilter::new().with_subdomain(false))
            .await?;

        let mut assigned = 0;
        for mut app in apps {
            let subdomain = match self.allocator.allocate_subdomain(&app.name).await {
                Ok(subdomain) => subdomain,
                Err(e) => {
                    warn!("Could not assign subdomain to app {}: {}", app.id, e);
                    continue;
                }
            };

            app.subdomain = Some(subdomain);
            if app.url.is_some() {
                app.url = Some(self.allocator.app_url(&app));
            }
            app.touch();
            match self.store.save_app(&app).await {
                Ok(()) => assigned += 1,
                Err(e) => warn!("Could not save subdomain for app {}: {}", app.id, e),
            }
        }

        info!("Assigned subdomains to {} app(s)", assigned);
        Ok(assigned)
    }

    async fn load_app(&self, app_id: &str) -> Result<Application, PlatformError> {
        self.store
            .get_app(app_id)
            .await?
            .ok_or_else(|| PlatformError::NotFound(format!("app {}", app_id)))
    }

    /// Branches of the application's repository
    pub async fn branches(
        &self,
        token: &SecretString,
        app_id: &str,
    ) -> Result<Vec<BranchInfo>, PlatformError> {
        let app = self.load_app(app_id).await?;
        let repo = &app.repository;
        self.scm.fetch_branches(token, &repo.owner, &repo.name).await
    }

    /// Whether the tracked branch moved past the last deployed commit
    pub async fn check_commits(
        &self,
        token: &SecretString,
        app_id: &str,
    ) -> Result<CommitCheck, PlatformError> {
        let app = self.load_app(app_id).await?;
        let repo = &app.repository;
        let current = repo.last_commit.as_ref().map(|c| c.sha.as_str());
        check_for_newer_commits(
            self.scm.as_ref(),
            token,
            &repo.owner,
            &repo.name,
            &repo.branch,
            current,
        )
        .await
    }

    /// Applications owned by a user
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Application>, PlatformError> {
        self.store
            .list_apps(&AppFilter::new().with_user(user_id))
            .await
    }
}
