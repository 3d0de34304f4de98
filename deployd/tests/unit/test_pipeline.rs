//! Deployment pipeline tests

use std::time::Duration;

use deployd::errors::PlatformError;
use deployd::events::{DeploymentStatus, Topics};
use deployd::models::application::AppStatus;
use deployd::models::deployment::{AttemptStatus, DeploymentAttempt};
use deployd::models::log::{LogSource, Severity};
use deployd::store::AppStore;
use deployd::supervisor::memory::StartOutcome;
use deployd::supervisor::{ProcessStatus, ProcessSupervisor};
use event_models::models::Event;
use secrecy::SecretString;

use crate::fixtures::{FakeScm, Harness, HarnessOptions, GIT_FAILS, GIT_HANGS};

fn started(harness: &Harness) -> Vec<String> {
    harness
        .supervisor
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("start"))
        .collect()
}

#[tokio::test]
async fn test_successful_deploy() {
    let harness = Harness::new().await;
    let app = harness.register("shop", "echo built").await;

    let attempt = harness.orchestrator.deploy(&app.id, "user-1", None).await.unwrap();
    assert_eq!(attempt.status, AttemptStatus::Success);
    assert!(attempt.completed_at.is_some());
    assert!(attempt.error.is_none());
    assert!(attempt.logs.iter().any(|l| l.message == "built"));
    assert!(attempt
        .logs
        .iter()
        .any(|l| l.message == "Repository cloned successfully"));

    let app = harness.app(&app.id).await;
    let handle = format!("app_{}", app.id);
    assert_eq!(app.status(), AppStatus::Running);
    assert_eq!(app.deployment.process_handle.as_deref(), Some(handle.as_str()));
    assert_eq!(app.deployment.deployment_count, 1);
    assert!(app.deployment.deployed_at.is_some());
    assert!(app.deployment.last_error.is_none());

    let subdomain = app.subdomain.clone().unwrap();
    assert_eq!(
        app.url.as_deref(),
        Some(format!("https://{}.apps.example.com", subdomain).as_str())
    );

    // Launch config carries the port and user environment
    let config = harness.supervisor.config_of(&handle).unwrap();
    assert_eq!(config.script, "node");
    assert_eq!(config.args, vec!["server.js".to_string()]);
    assert_eq!(config.env.get("PORT"), Some(&app.runtime.port.to_string()));
    assert_eq!(config.env.get("API_KEY").map(String::as_str), Some("k"));
    assert_eq!(config.cwd, harness.layout.workspace_dir(&app.id).path());

    assert_eq!(harness.supervisor.saved(), vec![handle]);
    assert!(!harness.orchestrator.is_busy(&app.id));
}

#[tokio::test]
async fn test_clone_timeout() {
    let harness = Harness::with_options(HarnessOptions {
        git_script: GIT_HANGS,
        clone_timeout: Duration::from_secs(1),
        ..Default::default()
    })
    .await;
    let app = harness.register("shop", "true").await;

    let result = harness.orchestrator.deploy(&app.id, "user-1", None).await;
    assert!(matches!(result, Err(PlatformError::CloneTimeout(1))));

    let app = harness.app(&app.id).await;
    assert_eq!(app.status(), AppStatus::Failed);
    assert!(app.deployment.process_handle.is_none());
    assert!(app
        .deployment
        .last_error
        .as_deref()
        .unwrap()
        .contains("timed out"));
    assert!(started(&harness).is_empty());

    let attempts = harness.orchestrator.recent_attempts(&app.id, None).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].status, AttemptStatus::Failed);
    assert!(attempts[0].error.is_some());
}

#[tokio::test]
async fn test_clone_failure() {
    let harness = Harness::with_options(HarnessOptions {
        git_script: GIT_FAILS,
        ..Default::default()
    })
    .await;
    let app = harness.register("shop", "true").await;

    let result = harness.orchestrator.deploy(&app.id, "user-1", None).await;
    assert!(matches!(result, Err(PlatformError::CloneFailure(_))));

    let attempt = &harness.orchestrator.recent_attempts(&app.id, None).await.unwrap()[0];
    assert!(attempt
        .logs_at(Severity::Warn)
        .any(|l| l.message.contains("repository not found")));
    assert_eq!(harness.app(&app.id).await.status(), AppStatus::Failed);
}

#[tokio::test]
async fn test_build_failure() {
    let harness = Harness::new().await;
    let app = harness.register("shop", "echo warn-line >&2; exit 1").await;

    let result = harness.orchestrator.deploy(&app.id, "user-1", None).await;
    assert!(matches!(result, Err(PlatformError::InstallFailure(_))));

    let attempts = harness.orchestrator.recent_attempts(&app.id, None).await.unwrap();
    let attempt = &attempts[0];
    assert_eq!(attempt.status, AttemptStatus::Failed);
    assert!(attempt.logs_at(Severity::Warn).any(|l| l.message == "warn-line"));
    assert!(attempt.logs_at(Severity::Error).count() >= 1);

    let app = harness.app(&app.id).await;
    assert_eq!(app.status(), AppStatus::Failed);
    assert!(app.deployment.last_error.is_some());
    assert!(app.deployment.last_error_at.is_some());
    assert_eq!(app.deployment.deployment_count, 0);
    assert!(started(&harness).is_empty());
}

#[tokio::test]
async fn test_build_with_binary_output() {
    let harness = Harness::new().await;
    let app = harness
        .register(
            "shop",
            "printf 'bad \\377 byte\\n'; head -c 200000 /dev/zero | tr '\\0' 'a'; echo",
        )
        .await;

    let attempt = tokio::time::timeout(
        Duration::from_secs(15),
        harness.orchestrator.deploy(&app.id, "user-1", None),
    )
    .await
    .expect("build output was not drained")
    .unwrap();

    assert_eq!(attempt.status, AttemptStatus::Success);
    assert!(attempt.logs.iter().any(|l| l.message == "bad \u{FFFD} byte"));
    assert!(attempt.logs.iter().any(|l| l.message.len() == 200_000));
    assert_eq!(harness.app(&app.id).await.status(), AppStatus::Running);
}

#[tokio::test]
async fn test_process_that_vanishes_is_cleaned_up() {
    let harness = Harness::new().await;
    harness.supervisor.set_start_outcome(StartOutcome::Vanish);
    let app = harness.register("shop", "true").await;

    let result = harness.orchestrator.deploy(&app.id, "user-1", None).await;
    assert!(matches!(result, Err(PlatformError::ProcessStartFailure(_))));

    let handle = format!("app_{}", app.id);
    let app = harness.app(&app.id).await;
    assert_eq!(app.status(), AppStatus::Failed);
    assert!(app.deployment.process_handle.is_none());
    assert!(harness.supervisor.process_names().is_empty());

    // The pre-start delete and the cleanup delete
    let deletes = harness
        .supervisor
        .calls()
        .into_iter()
        .filter(|c| *c == format!("delete {}", handle))
        .count();
    assert_eq!(deletes, 2);
}

#[tokio::test]
async fn test_errored_process_fails_deploy() {
    let harness = Harness::new().await;
    harness.supervisor.set_start_outcome(StartOutcome::Errored);
    let app = harness.register("shop", "true").await;

    let result = harness.orchestrator.deploy(&app.id, "user-1", None).await;
    match result {
        Err(PlatformError::ProcessStartFailure(msg)) => assert!(msg.contains("errored")),
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(harness.supervisor.process_names().is_empty());
    assert_eq!(harness.app(&app.id).await.status(), AppStatus::Failed);
}

#[tokio::test]
async fn test_rejected_start() {
    let harness = Harness::new().await;
    harness
        .supervisor
        .set_start_outcome(StartOutcome::Reject("no such script".to_string()));
    let app = harness.register("shop", "true").await;

    let result = harness.orchestrator.deploy(&app.id, "user-1", None).await;
    assert!(matches!(result, Err(PlatformError::ProcessStartFailure(_))));
    assert!(harness.app(&app.id).await.deployment.process_handle.is_none());
}

#[tokio::test]
async fn test_redeploy_after_failure() {
    let harness = Harness::new().await;
    harness.supervisor.set_start_outcome(StartOutcome::Errored);
    let app = harness.register("shop", "true").await;
    assert!(harness.orchestrator.deploy(&app.id, "user-1", None).await.is_err());

    harness.supervisor.set_start_outcome(StartOutcome::Online);
    harness.orchestrator.deploy(&app.id, "user-1", None).await.unwrap();

    let app = harness.app(&app.id).await;
    assert_eq!(app.status(), AppStatus::Running);
    assert_eq!(app.deployment.deployment_count, 1);
    // Last error is kept for reference
    assert!(app.deployment.last_error.is_some());

    let attempts = harness.orchestrator.recent_attempts(&app.id, None).await.unwrap();
    assert_eq!(attempts.len(), 2);
}

#[tokio::test]
async fn test_commit_metadata_with_token() {
    let harness = Harness::with_options(HarnessOptions {
        scm: FakeScm::with_head("0123456789abcdef", "fix checkout\n\nlong body"),
        ..Default::default()
    })
    .await;
    let app = harness.register("shop", "true").await;

    let token = SecretString::from("ghp_test".to_string());
    let attempt = harness
        .orchestrator
        .deploy(&app.id, "user-1", Some(&token))
        .await
        .unwrap();
    assert_eq!(attempt.commit_hash.as_deref(), Some("0123456789abcdef"));
    assert!(attempt
        .logs
        .iter()
        .any(|l| l.message == "Deploying commit 0123456: fix checkout"));

    let app = harness.app(&app.id).await;
    let commit = app.repository.last_commit.unwrap();
    assert_eq!(commit.sha, "0123456789abcdef");
    assert_eq!(commit.author, "Ada");

    let calls = harness.scm.calls.lock().unwrap().clone();
    assert_eq!(calls, vec!["commit acme/shop@main".to_string()]);
}

#[tokio::test]
async fn test_commit_lookup_failure_does_not_abort() {
    let harness = Harness::new().await;
    let app = harness.register("shop", "true").await;

    let token = SecretString::from("ghp_test".to_string());
    let attempt = harness
        .orchestrator
        .deploy(&app.id, "user-1", Some(&token))
        .await
        .unwrap();
    assert_eq!(attempt.status, AttemptStatus::Success);
    assert!(attempt.commit_hash.is_none());
    assert!(attempt
        .logs_at(Severity::Warn)
        .any(|l| l.message.starts_with("Could not fetch latest commit")));
}

#[tokio::test]
async fn test_port_reassigned_when_taken() {
    let harness = Harness::new().await;
    let first = harness.register("first", "true").await;
    let second = harness.register("second", "true").await;
    // Pending apps may share a port
    assert_eq!(first.runtime.port, second.runtime.port);

    harness.orchestrator.deploy(&first.id, "user-1", None).await.unwrap();
    let attempt = harness
        .orchestrator
        .deploy(&second.id, "user-1", None)
        .await
        .unwrap();

    let first = harness.app(&first.id).await;
    let second = harness.app(&second.id).await;
    assert_eq!(first.status(), AppStatus::Running);
    assert_eq!(second.status(), AppStatus::Running);
    assert_ne!(first.runtime.port, second.runtime.port);
    assert!(attempt
        .logs_at(Severity::Warn)
        .any(|l| l.message.contains("reassigned")));
}

#[tokio::test]
async fn test_concurrent_deploy_is_busy() {
    let harness = Harness::with_options(HarnessOptions {
        git_script: GIT_HANGS,
        clone_timeout: Duration::from_secs(5),
        ..Default::default()
    })
    .await;
    let app = harness.register("shop", "true").await;

    let ack = harness
        .orchestrator
        .request_deploy(&app.id, "user-1", None)
        .await
        .unwrap();
    assert_eq!(ack.app_id, app.id);
    assert!(harness.orchestrator.is_busy(&app.id));

    let second = harness.orchestrator.deploy(&app.id, "user-1", None).await;
    assert!(matches!(second, Err(PlatformError::Busy(_))));

    let stop = harness.orchestrator.stop(&app.id).await;
    assert!(matches!(stop, Err(PlatformError::Busy(_))));

    let delete = harness.orchestrator.delete(&app.id).await;
    assert!(matches!(delete, Err(PlatformError::Busy(_))));
}

#[tokio::test]
async fn test_request_deploy_unknown_app() {
    let harness = Harness::new().await;
    let result = harness
        .orchestrator
        .request_deploy("missing", "user-1", None)
        .await;
    assert!(matches!(result, Err(PlatformError::NotFound(_))));
    assert!(!harness.orchestrator.is_busy("missing"));
}

#[tokio::test]
async fn test_stop_and_restart() {
    let harness = Harness::new().await;
    let app = harness.register("shop", "true").await;

    // Nothing to stop before the first deploy
    let result = harness.orchestrator.stop(&app.id).await;
    assert!(matches!(result, Err(PlatformError::ValidationError(_))));

    harness.orchestrator.deploy(&app.id, "user-1", None).await.unwrap();
    let handle = format!("app_{}", app.id);

    let stopped = harness.orchestrator.stop(&app.id).await.unwrap();
    assert_eq!(stopped.status(), AppStatus::Stopped);
    assert!(harness.supervisor.calls().contains(&format!("stop {}", handle)));

    let restarted = harness.orchestrator.restart(&app.id).await.unwrap();
    assert_eq!(restarted.status(), AppStatus::Running);
    assert_eq!(harness.app(&app.id).await.status(), AppStatus::Running);
}

#[tokio::test]
async fn test_delete_removes_everything() {
    let harness = Harness::new().await;
    let app = harness.register("shop", "true").await;
    harness.orchestrator.deploy(&app.id, "user-1", None).await.unwrap();
    let workspace = harness.layout.workspace_dir(&app.id);
    assert!(workspace.exists().await);

    harness.orchestrator.delete(&app.id).await.unwrap();

    assert!(harness.store.get_app(&app.id).await.unwrap().is_none());
    assert!(harness.supervisor.process_names().is_empty());
    assert!(!workspace.exists().await);
    assert!(harness
        .orchestrator
        .recent_attempts(&app.id, None)
        .await
        .unwrap()
        .is_empty());

    let again = harness.orchestrator.delete(&app.id).await;
    assert!(matches!(again, Err(PlatformError::NotFound(_))));
}

#[tokio::test]
async fn test_delete_never_deployed_app() {
    let harness = Harness::new().await;
    let app = harness.register("shop", "true").await;

    harness.orchestrator.delete(&app.id).await.unwrap();
    assert!(harness.store.get_app(&app.id).await.unwrap().is_none());
    assert!(!harness
        .supervisor
        .calls()
        .iter()
        .any(|c| c.starts_with("delete")));
}

#[tokio::test]
async fn test_reconcile_follows_supervisor() {
    let harness = Harness::new().await;
    let crashed = harness.register("crashed", "true").await;
    let gone = harness.register("gone", "true").await;
    let healthy = harness.register("healthy", "true").await;
    for app in [&crashed, &gone, &healthy] {
        harness.orchestrator.deploy(&app.id, "user-1", None).await.unwrap();
    }

    harness
        .supervisor
        .set_status(&format!("app_{}", crashed.id), ProcessStatus::Errored);
    harness
        .supervisor
        .delete(&format!("app_{}", gone.id))
        .await
        .unwrap();

    let updated = harness.orchestrator.reconcile().await.unwrap();
    assert_eq!(updated, 2);
    assert_eq!(harness.app(&crashed.id).await.status(), AppStatus::Failed);
    assert_eq!(harness.app(&gone.id).await.status(), AppStatus::Stopped);
    assert_eq!(harness.app(&healthy.id).await.status(), AppStatus::Running);

    // Nothing changes on a second pass
    assert_eq!(harness.orchestrator.reconcile().await.unwrap(), 0);
}

#[tokio::test]
async fn test_reconcile_fails_interrupted_build() {
    let harness = Harness::new().await;
    let app = harness.register("shop", "true").await;

    // Left behind by a daemon that exited mid-pipeline
    let mut building = harness.app(&app.id).await;
    building.deployment.status = AppStatus::Building;
    harness.store.save_app(&building).await.unwrap();
    let mut stale = DeploymentAttempt::new(&app.id, "user-1", "main");
    stale.status = AttemptStatus::InProgress;
    harness.store.save_attempt(&stale).await.unwrap();

    // Rejected without recording another attempt
    let result = harness.orchestrator.deploy(&app.id, "user-1", None).await;
    assert!(matches!(result, Err(PlatformError::InvalidTransition(_))));
    let attempts = harness.orchestrator.recent_attempts(&app.id, None).await.unwrap();
    assert_eq!(attempts.len(), 1);

    assert_eq!(harness.orchestrator.reconcile().await.unwrap(), 1);
    let failed = harness.app(&app.id).await;
    assert_eq!(failed.status(), AppStatus::Failed);
    assert!(failed
        .deployment
        .last_error
        .as_deref()
        .unwrap()
        .contains("interrupted"));
    let stale = harness.orchestrator.attempt(&stale.id).await.unwrap();
    assert_eq!(stale.status, AttemptStatus::Failed);
    assert!(stale.completed_at.is_some());

    // Deployable again
    let attempt = harness.orchestrator.deploy(&app.id, "user-1", None).await.unwrap();
    assert_eq!(attempt.status, AttemptStatus::Success);
    assert_eq!(harness.app(&app.id).await.status(), AppStatus::Running);
    assert_eq!(harness.orchestrator.reconcile().await.unwrap(), 0);
}

#[tokio::test]
async fn test_reconcile_leaves_build_in_flight() {
    let harness = Harness::with_options(HarnessOptions {
        git_script: GIT_HANGS,
        ..Default::default()
    })
    .await;
    let app = harness.register("shop", "true").await;

    harness
        .orchestrator
        .request_deploy(&app.id, "user-1", None)
        .await
        .unwrap();
    for _ in 0..200 {
        if harness.app(&app.id).await.status() == AppStatus::Building {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(harness.app(&app.id).await.status(), AppStatus::Building);

    assert_eq!(harness.orchestrator.reconcile().await.unwrap(), 0);
    assert_eq!(harness.app(&app.id).await.status(), AppStatus::Building);
}

#[tokio::test]
async fn test_app_logs_fall_back_to_attempt_logs() {
    let harness = Harness::new().await;
    let app = harness.register("shop", "echo warn-line >&2; exit 1").await;
    let _ = harness.orchestrator.deploy(&app.id, "user-1", None).await;

    let logs = harness.orchestrator.app_logs(&app.id, 1, 50).await.unwrap();
    assert_eq!(logs.status, "failed");
    assert!(logs.process_info.is_none());
    assert!(!logs.page.logs.is_empty());
    assert!(logs.page.logs.len() <= 100);
    assert!(logs.page.logs.iter().all(|l| l.source == LogSource::Deployment));
    assert_eq!(logs.page.pagination.total_pages, 1);
    assert!(!logs.page.pagination.has_next);

    // Newest first
    let first = &logs.page.logs[0];
    let last = logs.page.logs.last().unwrap();
    assert!(first.timestamp >= last.timestamp);
    assert_eq!(first.id, 0);
}

#[tokio::test]
async fn test_app_logs_of_running_process() {
    let harness = Harness::new().await;
    let app = harness.register("shop", "true").await;
    harness.orchestrator.deploy(&app.id, "user-1", None).await.unwrap();

    let logs_dir = harness.layout.app_logs_dir();
    let name = format!("app_{}", app.id);
    std::fs::write(
        logs_dir.path().join(format!("{}.out", name)),
        "2024-03-01 10:00:00 +0000: listening on 4000\n",
    )
    .unwrap();
    std::fs::write(
        logs_dir.path().join(format!("{}.err", name)),
        "2024-03-01 10:00:01 +0000: Error: boom\n",
    )
    .unwrap();

    let logs = harness.orchestrator.app_logs(&app.id, 1, 50).await.unwrap();
    assert_eq!(logs.status, "online");
    assert!(logs.process_info.unwrap().pid.is_some());
    let messages: Vec<_> = logs.page.logs.iter().map(|l| l.message.as_str()).collect();
    assert_eq!(messages, vec!["listening on 4000", "Error: boom"]);
    assert_eq!(logs.page.logs[1].severity, Severity::Error);

    let stderr = harness
        .orchestrator
        .stream_logs(&app.id, LogSource::Stderr, 1, 50)
        .await
        .unwrap();
    assert_eq!(stderr.logs.len(), 1);

    let stats = harness.orchestrator.log_stats(&app.id).await.unwrap();
    assert!(stats.stdout.exists);
    assert_eq!(stats.stderr.lines, 1);
}

#[tokio::test]
async fn test_app_logs_when_process_is_gone() {
    let harness = Harness::new().await;
    let app = harness.register("shop", "true").await;
    harness.orchestrator.deploy(&app.id, "user-1", None).await.unwrap();
    harness
        .supervisor
        .delete(&format!("app_{}", app.id))
        .await
        .unwrap();

    let logs = harness.orchestrator.app_logs(&app.id, 1, 50).await.unwrap();
    assert_eq!(logs.status, "not_found");
    assert!(logs.page.logs.is_empty());
}

#[tokio::test]
async fn test_deploy_publishes_events() {
    let harness = Harness::new().await;
    let app = harness.register("shop", "true").await;
    let mut app_events = harness.broadcaster.subscribe(&Topics::app(&app.id));
    let mut user_events = harness.broadcaster.subscribe(&Topics::user("user-1"));

    harness.orchestrator.deploy(&app.id, "user-1", None).await.unwrap();

    let mut names = Vec::new();
    let mut statuses = Vec::new();
    while let Ok(event) = app_events.try_recv() {
        names.push(event.name());
        if let Event::DeploymentStatus(status) = event {
            statuses.push(status.status);
        }
    }
    assert_eq!(statuses, vec![DeploymentStatus::Building, DeploymentStatus::Success]);
    assert!(names.contains(&"deployment_log"));
    assert_eq!(names.last(), Some(&"app_status"));

    match user_events.try_recv().unwrap() {
        Event::Notification(n) => assert_eq!(n.title, "Deployment successful"),
        other => panic!("unexpected event: {:?}", other),
    }
}
