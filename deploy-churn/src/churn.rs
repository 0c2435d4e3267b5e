//! Client churn computation: local manifest vs remote baseline.

use crate::compare::{compare, ChurnMetrics};
use crate::error::{ChurnError, Result};
use crate::local::{build_local_manifest_text, ensure_client_dir};
use crate::manifest::{self, Manifest};
use crate::remote::{BaselineFetch, BaselineStore, RemoteBaselineStore, RemoteTarget, SshShell};
use std::path::{Path, PathBuf};
use tracing::info;

/// Compare the asset tree at `asset_root` against the stored baseline.
///
/// Steps run in order and the first failure aborts the whole computation.
/// A missing baseline counts as an empty one. When `upload_baseline` is set
/// the new manifest replaces the baseline after a successful comparison;
/// otherwise the store is never written to.
pub async fn compute_client_churn<B>(
    asset_root: &Path,
    store: &B,
    upload_baseline: bool,
) -> Result<ChurnMetrics>
where
    B: BaselineStore + ?Sized,
{
    ensure_client_dir(asset_root)?;

    let root: PathBuf = asset_root.to_path_buf();
    let new_text = tokio::task::spawn_blocking(move || build_local_manifest_text(&root))
        .await
        .map_err(|e| ChurnError::ComputeFailed(format!("manifest task failed: {}", e)))??;

    let old_manifest = match store.fetch_baseline().await {
        BaselineFetch::Found(text) => manifest::parse(&text),
        BaselineFetch::Missing => Manifest::new(),
        BaselineFetch::Failed(failure) => {
            return Err(ChurnError::RemoteManifestFetchFailed(failure.to_string()));
        }
    };

    let new_manifest = manifest::parse(&new_text);
    let metrics = compare(&old_manifest, &new_manifest)?;

    info!(
        stable = metrics.stable_files,
        changed = metrics.changed_files,
        added = metrics.added_files,
        removed = metrics.removed_files,
        download_impact = %format!("{:.1}%", metrics.download_impact_files_percent),
        "Computed client churn"
    );

    if upload_baseline {
        store.upload_baseline(&new_text).await?;
    }

    Ok(metrics)
}

/// [`compute_client_churn`] against `{remote_dir}/.deploy/manifest` over ssh.
pub async fn compute_client_churn_over_ssh(
    asset_root: &Path,
    target: &RemoteTarget,
    remote_dir: &str,
    upload_baseline: bool,
) -> Result<ChurnMetrics> {
    let store = RemoteBaselineStore::new(SshShell::new(target.clone()), remote_dir);
    compute_client_churn(asset_root, &store, upload_baseline).await
}
