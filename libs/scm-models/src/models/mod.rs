//! API models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Repository owner as returned by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerResponse {
    pub login: String,
}

/// Repository response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryResponse {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub private: bool,
    pub owner: OwnerResponse,
    pub html_url: String,
    pub clone_url: String,
    pub default_branch: String,
    pub language: Option<String>,
    pub updated_at: Option<String>,
}

/// Branch commit pointer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchCommitResponse {
    pub sha: String,
    pub url: String,
}

/// Branch response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchResponse {
    pub name: String,
    pub commit: BranchCommitResponse,
    #[serde(default)]
    pub protected: bool,
}

/// Commit signature (author or committer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureResponse {
    pub name: String,
    pub email: Option<String>,
    pub date: DateTime<Utc>,
}

/// Commit body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitBodyResponse {
    pub message: String,
    pub author: SignatureResponse,
}

/// Commit response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResponse {
    pub sha: String,
    pub commit: CommitBodyResponse,
    pub html_url: String,
}

/// Repository metadata used to populate an application's repository fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub private: bool,
    pub owner: String,
    pub url: String,
    pub clone_url: String,
    pub default_branch: String,
    pub language: Option<String>,
}

impl From<RepositoryResponse> for RepositoryInfo {
    fn from(repo: RepositoryResponse) -> Self {
        Self {
            id: repo.id,
            name: repo.name,
            full_name: repo.full_name,
            description: repo.description.unwrap_or_default(),
            private: repo.private,
            owner: repo.owner.login,
            url: repo.html_url,
            clone_url: repo.clone_url,
            default_branch: repo.default_branch,
            language: repo.language,
        }
    }
}

/// Branch summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    pub commit_sha: String,
    pub protected: bool,
}

impl From<BranchResponse> for BranchInfo {
    fn from(branch: BranchResponse) -> Self {
        Self {
            name: branch.name,
            commit_sha: branch.commit.sha,
            protected: branch.protected,
        }
    }
}

/// Latest commit on a branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub message: String,
    pub author_name: String,
    pub author_date: DateTime<Utc>,
    pub url: String,
}

impl CommitInfo {
    /// Abbreviated sha for display
    pub fn short_sha(&self) -> &str {
        let end = self.sha.len().min(7);
        &self.sha[..end]
    }
}

impl From<CommitResponse> for CommitInfo {
    fn from(commit: CommitResponse) -> Self {
        Self {
            sha: commit.sha,
            message: commit.commit.message,
            author_name: commit.commit.author.name,
            author_date: commit.commit.author.date,
            url: commit.html_url,
        }
    }
}

/// Result of comparing a known commit against the branch head
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitCheck {
    pub has_newer_commits: bool,
    pub latest_commit: Option<CommitInfo>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    pub documentation_url: Option<String>,
}
