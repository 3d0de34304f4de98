//! Source-control collaborator

pub mod client;
pub mod repos;

use async_trait::async_trait;
use scm_models::models::{BranchInfo, CommitInfo, RepositoryInfo};
use secrecy::SecretString;

use crate::errors::PlatformError;

/// Read-only view of the source-control host
#[async_trait]
pub trait SourceControl: Send + Sync {
    async fn fetch_repository(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
    ) -> Result<RepositoryInfo, PlatformError>;

    async fn fetch_branches(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<BranchInfo>, PlatformError>;

    async fn fetch_latest_commit(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<CommitInfo, PlatformError>;
}
