//! Repository, branch, and commit lookups

use async_trait::async_trait;
use scm_models::models::{
    BranchInfo, BranchResponse, CommitCheck, CommitInfo, CommitResponse, RepositoryInfo,
    RepositoryResponse,
};
use secrecy::SecretString;
use tracing::debug;

use crate::errors::PlatformError;
use crate::http::client::HttpClient;
use crate::http::SourceControl;

#[async_trait]
impl SourceControl for HttpClient {
    async fn fetch_repository(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
    ) -> Result<RepositoryInfo, PlatformError> {
        let path = format!("/repos/{}/{}", owner, repo);
        let response: RepositoryResponse = self.get(&path, token).await?;
        Ok(response.into())
    }

    async fn fetch_branches(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<BranchInfo>, PlatformError> {
        let path = format!("/repos/{}/{}/branches", owner, repo);
        let response: Vec<BranchResponse> = self.get(&path, token).await?;
        Ok(response.into_iter().map(BranchInfo::from).collect())
    }

    async fn fetch_latest_commit(
        &self,
        token: &SecretString,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<CommitInfo, PlatformError> {
        let path = format!("/repos/{}/{}/commits/{}", owner, repo, branch);
        let response: CommitResponse = self.get(&path, token).await?;
        let commit = CommitInfo::from(response);
        debug!("Latest commit on {}/{}@{}: {}", owner, repo, branch, commit.short_sha());
        Ok(commit)
    }
}

/// Compare a known sha against the branch head
pub async fn check_for_newer_commits(
    scm: &dyn SourceControl,
    token: &SecretString,
    owner: &str,
    repo: &str,
    branch: &str,
    current_sha: Option<&str>,
) -> Result<CommitCheck, PlatformError> {
    let latest = scm.fetch_latest_commit(token, owner, repo, branch).await?;
    let has_newer_commits = current_sha != Some(latest.sha.as_str());

    Ok(CommitCheck {
        has_newer_commits,
        latest_commit: Some(latest),
    })
}
