//! Individual deploy steps: tests, build, sync, restart and health check.

use crate::config::{AppConfig, ProfileConfig};
use crate::runner::StepCommand;
use crate::utils::{DeployError, Result};
use deploy_churn::remote::shell_quote;
use deploy_churn::RemoteShell;
use std::time::Duration;
use tracing::{info, warn};

pub async fn run_tests(app: &AppConfig) -> Result<()> {
    StepCommand::from_argv("tests", &app.test_command)?
        .current_dir(&app.project_dir)
        .run_checked(false, DeployError::Tests)
        .await?;
    Ok(())
}

pub async fn run_build(app: &AppConfig) -> Result<()> {
    StepCommand::from_argv("build", &app.build_command)?
        .current_dir(&app.project_dir)
        .run_checked(false, DeployError::Build)
        .await?;

    let build_path = app.build_path();
    if !build_path.is_dir() {
        return Err(DeployError::Build(format!(
            "build finished but {} does not exist",
            build_path.display()
        )));
    }
    Ok(())
}

/// rsync invocation mirroring the build output (with deletion) to the host.
pub fn sync_command(app: &AppConfig, profile: &ProfileConfig) -> StepCommand {
    let source = format!("{}/", app.build_path().display());
    let destination = format!("{}:{}/", profile.host, profile.remote_output_dir());

    StepCommand::new("sync", "rsync")
        .args(["-az", "--delete"])
        .arg("-e")
        .arg(profile.remote_target().ssh_command_line())
        .arg(source)
        .arg(destination)
}

pub async fn sync_output(app: &AppConfig, profile: &ProfileConfig) -> Result<()> {
    sync_command(app, profile)
        .run_checked(false, DeployError::Sync)
        .await?;
    Ok(())
}

pub fn restart_command(profile: &ProfileConfig) -> String {
    format!(
        "cd {} && pm2 startOrReload {} --only {} --update-env",
        shell_quote(&profile.remote_dir),
        shell_quote(&profile.ecosystem_file),
        shell_quote(&profile.pm2_app),
    )
}

pub async fn restart_app<S: RemoteShell + ?Sized>(shell: &S, profile: &ProfileConfig) -> Result<()> {
    info!(target_host = shell.target(), app = %profile.pm2_app, "Restarting application");

    let output = shell
        .exec(&restart_command(profile))
        .await
        .map_err(|e| DeployError::Restart(e.to_string()))?;

    if !output.success() {
        return Err(DeployError::Restart(format!(
            "pm2 exited with status {}: {}",
            output.exit_code,
            output.stderr.trim()
        )));
    }
    Ok(())
}

/// Poll `pm2 jlist` until the app reports `online`.
pub async fn check_health<S: RemoteShell + ?Sized>(shell: &S, profile: &ProfileConfig) -> Result<()> {
    let attempts = profile.health_attempts.max(1);
    let interval = Duration::from_secs(profile.health_interval_secs);
    let mut last_problem = String::new();

    for attempt in 1..=attempts {
        if attempt > 1 {
            tokio::time::sleep(interval).await;
        }

        match shell.exec("pm2 jlist").await {
            Ok(output) if output.success() => {
                match app_status_from_jlist(&output.stdout, &profile.pm2_app) {
                    Ok(status) if status == "online" => {
                        info!(app = %profile.pm2_app, attempt, "Application is online");
                        return Ok(());
                    }
                    Ok(status) => last_problem = format!("status is '{}'", status),
                    Err(problem) => last_problem = problem,
                }
            }
            Ok(output) => {
                last_problem = format!(
                    "pm2 jlist exited with status {}: {}",
                    output.exit_code,
                    output.stderr.trim()
                )
            }
            // the channel itself is gone; polling again will not help
            Err(e) => return Err(DeployError::HealthCheck(e.to_string())),
        }

        warn!(app = %profile.pm2_app, attempt, attempts, problem = %last_problem, "Application not healthy yet");
    }

    Err(DeployError::HealthCheck(format!(
        "{} after {} attempts: {}",
        profile.pm2_app, attempts, last_problem
    )))
}

/// Extract `pm2_env.status` of `app` from `pm2 jlist` output.
pub fn app_status_from_jlist(json: &str, app: &str) -> std::result::Result<String, String> {
    let processes: Vec<serde_json::Value> = serde_json::from_str(json.trim())
        .map_err(|e| format!("unreadable pm2 jlist output: {}", e))?;

    let process = processes
        .iter()
        .find(|p| p.get("name").and_then(|n| n.as_str()) == Some(app))
        .ok_or_else(|| format!("process '{}' is not registered with pm2", app))?;

    process
        .pointer("/pm2_env/status")
        .and_then(|s| s.as_str())
        .map(str::to_string)
        .ok_or_else(|| format!("process '{}' has no status", app))
}
