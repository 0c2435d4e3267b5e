//! Deploy pipeline: tests → build → sync → churn → restart → health.
//!
//! Every step aborts the run on failure, except churn reporting after a
//! successful sync: the new code is already on the host at that point, so a
//! churn failure is logged, its code lands in the report and the restart
//! still happens.

use crate::config::{AppConfig, ProfileConfig};
use crate::steps;
use crate::utils::Result;
use chrono::{DateTime, Utc};
use deploy_churn::{compute_client_churn, ChurnMetrics, RemoteBaselineStore, RemoteShell};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Preview only: build and report churn, touch nothing remote
    pub dry_run: bool,
    pub skip_tests: bool,
    pub skip_build: bool,
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployReport {
    pub profile: String,
    pub dry_run: bool,
    /// `None` when churn could not be computed
    pub churn: Option<ChurnMetrics>,
    /// Error code of the churn step when it failed after a sync
    pub churn_error: Option<String>,
    pub duration_secs: u64,
    pub finished_at: DateTime<Utc>,
}

pub struct Pipeline<'a, S> {
    app: &'a AppConfig,
    profile_name: String,
    profile: &'a ProfileConfig,
    shell: S,
}

impl<'a, S: RemoteShell> Pipeline<'a, S> {
    pub fn new(app: &'a AppConfig, profile_name: impl Into<String>, profile: &'a ProfileConfig, shell: S) -> Self {
        Self {
            app,
            profile_name: profile_name.into(),
            profile,
            shell,
        }
    }

    pub async fn run(&self, options: &DeployOptions) -> Result<DeployReport> {
        let started = Instant::now();
        info!(
            profile = %self.profile_name,
            host = %self.profile.host,
            dry_run = options.dry_run,
            "Starting deploy"
        );

        if options.skip_tests {
            info!("Skipping tests");
        } else {
            steps::run_tests(self.app).await?;
        }

        if options.skip_build {
            info!("Skipping build");
        } else {
            steps::run_build(self.app).await?;
        }

        let (churn, churn_error) = if options.dry_run {
            // a failing preview is fatal: there is nothing else to report
            (Some(self.client_churn(false).await?), None)
        } else {
            steps::sync_output(self.app, self.profile).await?;
            self.release().await?
        };

        let report = DeployReport {
            profile: self.profile_name.clone(),
            dry_run: options.dry_run,
            churn,
            churn_error,
            duration_secs: started.elapsed().as_secs(),
            finished_at: Utc::now(),
        };
        info!(duration_secs = report.duration_secs, "Deploy finished");
        Ok(report)
    }

    /// Churn, restart and health check once the new build is on the host.
    ///
    /// Returns the metrics, or the churn error code when they are missing.
    async fn release(&self) -> Result<(Option<ChurnMetrics>, Option<String>)> {
        let churn = match self.client_churn(true).await {
            Ok(metrics) => (Some(metrics), None),
            Err(e) => {
                warn!(code = e.code(), error = %e, "Client churn unavailable");
                (None, Some(e.code().to_string()))
            }
        };

        steps::restart_app(&self.shell, self.profile).await?;
        steps::check_health(&self.shell, self.profile).await?;
        Ok(churn)
    }

    async fn client_churn(&self, upload_baseline: bool) -> deploy_churn::Result<ChurnMetrics> {
        let store = RemoteBaselineStore::new(&self.shell, &self.profile.remote_dir);
        compute_client_churn(&self.app.asset_root(), &store, upload_baseline).await
    }
}
