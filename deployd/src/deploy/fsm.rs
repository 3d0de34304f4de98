//! Transition tables for application and attempt status

use crate::errors::PlatformError;
use crate::models::application::AppStatus;
use crate::models::deployment::AttemptStatus;

/// Application lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Pipeline started
    Deploy,

    /// Pipeline finished and the process is online
    DeploySuccess,

    /// Pipeline aborted
    DeployFailed,

    /// Operator stopped the process
    Stop,

    /// Operator restarted the process
    Restart,

    /// Supervisor reported a status during reconciliation
    Observed(AppStatus),
}

/// Attempt lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptEvent {
    Start,
    Succeed,
    Fail,
}

/// Compute the next application status
pub fn next_app_status(state: AppStatus, event: &AppEvent) -> Result<AppStatus, PlatformError> {
    use AppStatus::*;

    let next = match (state, event) {
        // A pipeline can start from any resting state
        (Pending | Running | Stopped | Failed, AppEvent::Deploy) => Building,

        // From Building
        (Building, AppEvent::DeploySuccess) => Running,
        (Building, AppEvent::DeployFailed) => Failed,

        // Operator actions
        (Running | Stopped | Failed, AppEvent::Stop) => Stopped,
        (Running | Stopped | Failed, AppEvent::Restart) => Running,

        // Reconciliation never resurrects an app into an in-flight build
        (_, AppEvent::Observed(Building)) => {
            return Err(PlatformError::InvalidTransition(format!(
                "{} -> observed building",
                state
            )));
        }
        (_, AppEvent::Observed(observed)) => *observed,

        (state, event) => {
            return Err(PlatformError::InvalidTransition(format!(
                "{} -> {:?}",
                state, event
            )));
        }
    };

    Ok(next)
}

/// Compute the next attempt status
pub fn next_attempt_status(
    state: AttemptStatus,
    event: &AttemptEvent,
) -> Result<AttemptStatus, PlatformError> {
    use AttemptStatus::*;

    let next = match (state, event) {
        (Pending, AttemptEvent::Start) => InProgress,
        (InProgress, AttemptEvent::Succeed) => Success,
        (Pending | InProgress, AttemptEvent::Fail) => Failed,
        (state, event) => {
            return Err(PlatformError::InvalidTransition(format!(
                "attempt {} -> {:?}",
                state, event
            )));
        }
    };

    Ok(next)
}
