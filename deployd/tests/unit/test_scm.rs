//! Source-control client tests against a local fake API

use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use secrecy::SecretString;
use serde_json::json;
use tokio::net::TcpListener;

use deployd::errors::PlatformError;
use deployd::http::client::HttpClient;
use deployd::http::repos::check_for_newer_commits;
use deployd::http::SourceControl;

const TOKEN: &str = "ghp_fixture";

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("token {}", TOKEN))
}

async fn repository(
    Path((owner, repo)): Path<(String, String)>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Bad credentials"})));
    }
    if repo == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "id": 42,
            "name": repo,
            "full_name": format!("{}/{}", owner, repo),
            "description": null,
            "private": false,
            "owner": {"login": owner},
            "html_url": format!("https://github.com/{}/{}", owner, repo),
            "clone_url": format!("https://github.com/{}/{}.git", owner, repo),
            "default_branch": "trunk",
            "language": "TypeScript",
            "updated_at": "2024-03-01T10:00:00Z"
        })),
    )
}

async fn branches() -> impl IntoResponse {
    Json(json!([
        {"name": "trunk", "commit": {"sha": "aaa111", "url": "u"}, "protected": true},
        {"name": "feature", "commit": {"sha": "bbb222", "url": "u"}}
    ]))
}

async fn commit(Path((_owner, _repo, branch)): Path<(String, String, String)>) -> impl IntoResponse {
    Json(json!({
        "sha": format!("{}-0123456789", branch),
        "commit": {
            "message": "bump deps",
            "author": {"name": "Sam", "email": "sam@example.com", "date": "2024-03-01T10:00:00Z"}
        },
        "html_url": "https://github.com/acme/shop/commit/abc"
    }))
}

async fn fake_api() -> String {
    let app = Router::new()
        .route("/repos/{owner}/{repo}", get(repository))
        .route("/repos/{owner}/{repo}/branches", get(branches))
        .route("/repos/{owner}/{repo}/commits/{branch}", get(commit));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/", addr)
}

fn token() -> SecretString {
    SecretString::from(TOKEN.to_string())
}

#[tokio::test]
async fn test_fetch_repository() {
    let client = HttpClient::new(&fake_api().await).unwrap();
    assert!(!client.base_url().ends_with('/'));

    let info = client.fetch_repository(&token(), "acme", "shop").await.unwrap();
    assert_eq!(info.full_name, "acme/shop");
    assert_eq!(info.owner, "acme");
    assert_eq!(info.url, "https://github.com/acme/shop");
    assert_eq!(info.default_branch, "trunk");
    assert_eq!(info.description, "");
}

#[tokio::test]
async fn test_error_statuses() {
    let client = HttpClient::new(&fake_api().await).unwrap();

    let missing = client.fetch_repository(&token(), "acme", "missing").await;
    match missing {
        Err(PlatformError::NotFound(message)) => assert_eq!(message, "Not Found"),
        other => panic!("unexpected result: {:?}", other),
    }

    let bad_token = SecretString::from("wrong".to_string());
    let denied = client.fetch_repository(&bad_token, "acme", "shop").await;
    match denied {
        Err(PlatformError::SourceControlError(message)) => {
            assert!(message.contains("401"));
            assert!(message.contains("Bad credentials"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_branches_and_commit() {
    let client = HttpClient::new(&fake_api().await).unwrap();

    let branches = client.fetch_branches(&token(), "acme", "shop").await.unwrap();
    assert_eq!(branches.len(), 2);
    assert!(branches[0].protected);
    assert!(!branches[1].protected);
    assert_eq!(branches[1].commit_sha, "bbb222");

    let commit = client
        .fetch_latest_commit(&token(), "acme", "shop", "main")
        .await
        .unwrap();
    assert_eq!(commit.sha, "main-0123456789");
    assert_eq!(commit.short_sha(), "main-01");
    assert_eq!(commit.author_name, "Sam");
}

#[tokio::test]
async fn test_check_for_newer_commits() {
    let client = HttpClient::new(&fake_api().await).unwrap();

    let check = check_for_newer_commits(&client, &token(), "acme", "shop", "main", None)
        .await
        .unwrap();
    assert!(check.has_newer_commits);

    let check = check_for_newer_commits(
        &client,
        &token(),
        "acme",
        "shop",
        "main",
        Some("main-0123456789"),
    )
    .await
    .unwrap();
    assert!(!check.has_newer_commits);
    assert_eq!(check.latest_commit.unwrap().message, "bump deps");
}
