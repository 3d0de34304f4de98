//! Build step

use std::path::Path;

use tokio::process::Command;
use tracing::info;

use crate::deploy::process::{run_streaming, StageSink};
use crate::errors::PlatformError;

/// Run the build command through `sh -c` inside the workspace
pub async fn run_build(
    build_command: &str,
    workspace: &Path,
    sink: &dyn StageSink,
) -> Result<(), PlatformError> {
    info!("Running build command '{}' in {}", build_command, workspace.display());

    let mut command = Command::new("sh");
    command.arg("-c").arg(build_command).current_dir(workspace);

    let status = run_streaming(command, sink).await.map_err(|e| {
        PlatformError::InstallFailure(format!("failed to run build command: {}", e))
    })?;

    if !status.success() {
        return Err(PlatformError::InstallFailure(format!(
            "'{}' exited with code {}",
            build_command,
            status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string())
        )));
    }

    Ok(())
}
