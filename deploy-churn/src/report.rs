//! Human-readable churn summary.

use crate::compare::ChurnMetrics;

/// Three lines: a header, a files line and a bytes line.
///
/// The header depends on whether a baseline existed and whether this was a
/// preview (nothing saved remotely).
pub fn format_churn_summary(metrics: &ChurnMetrics, preview_only: bool) -> String {
    let header = match (metrics.is_first_deploy(), preview_only) {
        (true, true) => "Client churn (preview): no previous baseline, every file is new",
        (true, false) => "Client churn: first deploy, baseline recorded",
        (false, true) => "Client churn vs previous deploy (preview, baseline unchanged)",
        (false, false) => "Client churn vs previous deploy",
    };

    let files = format!(
        "  Files: {} total | {} stable, {} changed, {} added, {} removed | download {:.1}%, reuse {:.1}%",
        metrics.total_new_files,
        metrics.stable_files,
        metrics.changed_files,
        metrics.added_files,
        metrics.removed_files,
        metrics.download_impact_files_percent,
        metrics.cache_reuse_files_percent,
    );

    let bytes = format!(
        "  Bytes: {} total | {} to download, {} reusable | download {:.1}%, reuse {:.1}%",
        format_bytes(metrics.total_new_bytes),
        format_bytes(metrics.changed_bytes.saturating_add(metrics.added_bytes)),
        format_bytes(metrics.stable_bytes),
        metrics.download_impact_bytes_percent,
        metrics.cache_reuse_bytes_percent,
    );

    format!("{}\n{}\n{}", header, files, bytes)
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
