//! Status transition tests

use deployd::deploy::fsm::{next_app_status, next_attempt_status, AppEvent, AttemptEvent};
use deployd::errors::PlatformError;
use deployd::models::application::AppStatus;
use deployd::models::deployment::AttemptStatus;

#[test]
fn test_first_deploy_success_flow() {
    let building = next_app_status(AppStatus::Pending, &AppEvent::Deploy).unwrap();
    assert_eq!(building, AppStatus::Building);

    let running = next_app_status(building, &AppEvent::DeploySuccess).unwrap();
    assert_eq!(running, AppStatus::Running);
}

#[test]
fn test_deploy_failure_flow() {
    let building = next_app_status(AppStatus::Running, &AppEvent::Deploy).unwrap();
    let failed = next_app_status(building, &AppEvent::DeployFailed).unwrap();
    assert_eq!(failed, AppStatus::Failed);

    // Retry from failed
    let building = next_app_status(failed, &AppEvent::Deploy).unwrap();
    assert_eq!(building, AppStatus::Building);
}

#[test]
fn test_redeploy_from_every_resting_state() {
    for state in [
        AppStatus::Pending,
        AppStatus::Running,
        AppStatus::Stopped,
        AppStatus::Failed,
    ] {
        assert_eq!(
            next_app_status(state, &AppEvent::Deploy).unwrap(),
            AppStatus::Building
        );
    }
}

#[test]
fn test_building_is_exclusive() {
    let result = next_app_status(AppStatus::Building, &AppEvent::Deploy);
    assert!(matches!(result, Err(PlatformError::InvalidTransition(_))));

    let result = next_app_status(AppStatus::Building, &AppEvent::Stop);
    assert!(matches!(result, Err(PlatformError::InvalidTransition(_))));
}

#[test]
fn test_pending_cannot_stop_or_restart() {
    assert!(next_app_status(AppStatus::Pending, &AppEvent::Stop).is_err());
    assert!(next_app_status(AppStatus::Pending, &AppEvent::Restart).is_err());
    assert!(next_app_status(AppStatus::Pending, &AppEvent::DeploySuccess).is_err());
}

#[test]
fn test_stop_and_restart() {
    let stopped = next_app_status(AppStatus::Running, &AppEvent::Stop).unwrap();
    assert_eq!(stopped, AppStatus::Stopped);

    let running = next_app_status(stopped, &AppEvent::Restart).unwrap();
    assert_eq!(running, AppStatus::Running);

    let running = next_app_status(AppStatus::Failed, &AppEvent::Restart).unwrap();
    assert_eq!(running, AppStatus::Running);
}

#[test]
fn test_observed_status() {
    let next = next_app_status(AppStatus::Running, &AppEvent::Observed(AppStatus::Failed)).unwrap();
    assert_eq!(next, AppStatus::Failed);

    let next = next_app_status(AppStatus::Failed, &AppEvent::Observed(AppStatus::Running)).unwrap();
    assert_eq!(next, AppStatus::Running);

    let result = next_app_status(AppStatus::Running, &AppEvent::Observed(AppStatus::Building));
    assert!(result.is_err());
}

#[test]
fn test_attempt_lifecycle() {
    let running = next_attempt_status(AttemptStatus::Pending, &AttemptEvent::Start).unwrap();
    assert_eq!(running, AttemptStatus::InProgress);

    let done = next_attempt_status(running, &AttemptEvent::Succeed).unwrap();
    assert_eq!(done, AttemptStatus::Success);
    assert!(done.is_terminal());

    // Terminal states are final
    assert!(next_attempt_status(done, &AttemptEvent::Fail).is_err());
    assert!(next_attempt_status(AttemptStatus::Failed, &AttemptEvent::Start).is_err());
}

#[test]
fn test_attempt_can_fail_before_start() {
    let failed = next_attempt_status(AttemptStatus::Pending, &AttemptEvent::Fail).unwrap();
    assert_eq!(failed, AttemptStatus::Failed);
    assert!(next_attempt_status(AttemptStatus::Pending, &AttemptEvent::Succeed).is_err());
}
