//! Manifest comparison: how much of the new bundle a returning client must
//! download and how much it can reuse from cache.
//!
//! Change detection is path + size equality. Fingerprinted bundlers put a
//! content hash in the file name, so changed content shows up as a new path.

use crate::error::{ChurnError, Result};
use crate::manifest::Manifest;
use serde::Serialize;

/// File and byte churn between two manifests.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChurnMetrics {
    pub total_old_files: usize,
    pub total_new_files: usize,
    pub stable_files: usize,
    pub changed_files: usize,
    pub added_files: usize,
    pub removed_files: usize,

    pub total_old_bytes: u64,
    pub total_new_bytes: u64,
    pub stable_bytes: u64,
    /// Measured with the new size: that is what a client re-downloads.
    pub changed_bytes: u64,
    pub added_bytes: u64,
    /// Measured with the old size.
    pub removed_bytes: u64,

    pub download_impact_files_percent: f64,
    pub cache_reuse_files_percent: f64,
    pub download_impact_bytes_percent: f64,
    pub cache_reuse_bytes_percent: f64,
}

impl ChurnMetrics {
    /// True when there was nothing to compare against.
    ///
    /// Derived from the old file count, so a baseline that exists but is
    /// empty or holds no parseable line also reads as a first deploy: no
    /// file from it can be reused.
    pub fn is_first_deploy(&self) -> bool {
        self.total_old_files == 0
    }
}

/// Classify every path of `new` against `old` and derive the percentages.
///
/// Sizes in `old` come from the remote baseline and are not trusted, so a
/// byte total that overflows `u64` is an error instead of a wrapped count.
pub fn compare(old: &Manifest, new: &Manifest) -> Result<ChurnMetrics> {
    let total_old_bytes = old.total_bytes().ok_or_else(|| overflow("baseline"))?;
    let total_new_bytes = new.total_bytes().ok_or_else(|| overflow("local"))?;

    // every partial sum below is bounded by one of the checked totals
    let mut stable_files = 0;
    let mut changed_files = 0;
    let mut added_files = 0;
    let mut stable_bytes = 0u64;
    let mut changed_bytes = 0u64;
    let mut added_bytes = 0u64;

    for (path, new_size) in new.iter() {
        match old.get(path) {
            None => {
                added_files += 1;
                added_bytes += new_size;
            }
            Some(old_size) if old_size == new_size => {
                stable_files += 1;
                stable_bytes += new_size;
            }
            Some(_) => {
                changed_files += 1;
                changed_bytes += new_size;
            }
        }
    }

    let mut removed_files = 0;
    let mut removed_bytes = 0u64;
    for (path, old_size) in old.iter() {
        if !new.contains(path) {
            removed_files += 1;
            removed_bytes += old_size;
        }
    }

    let total_new_files = new.len();

    Ok(ChurnMetrics {
        total_old_files: old.len(),
        total_new_files,
        stable_files,
        changed_files,
        added_files,
        removed_files,
        total_old_bytes,
        total_new_bytes,
        stable_bytes,
        changed_bytes,
        added_bytes,
        removed_bytes,
        download_impact_files_percent: percent(
            (changed_files + added_files) as f64,
            total_new_files as f64,
        ),
        cache_reuse_files_percent: percent(stable_files as f64, total_new_files as f64),
        download_impact_bytes_percent: percent(
            (changed_bytes + added_bytes) as f64,
            total_new_bytes as f64,
        ),
        cache_reuse_bytes_percent: percent(stable_bytes as f64, total_new_bytes as f64),
    })
}

fn overflow(side: &str) -> ChurnError {
    ChurnError::ComputeFailed(format!("{} manifest byte total overflows u64", side))
}

/// `part / whole * 100`, or 0 when `whole` is 0.
fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(entries: &[(&str, u64)]) -> Manifest {
        entries.iter().map(|(p, s)| (*p, *s)).collect()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 0.05, "{} != {}", actual, expected);
    }

    fn assert_invariants(old: &Manifest, new: &Manifest, m: &ChurnMetrics) {
        assert_eq!(m.total_old_files, old.len());
        assert_eq!(m.total_new_files, new.len());
        assert_eq!(m.stable_files + m.changed_files + m.added_files, m.total_new_files);
        assert_eq!(m.stable_files + m.changed_files + m.removed_files, m.total_old_files);
        assert_eq!(m.stable_bytes + m.changed_bytes + m.added_bytes, m.total_new_bytes);
        assert!(!m.download_impact_files_percent.is_nan());
        assert!(!m.cache_reuse_bytes_percent.is_nan());
        assert!(m.download_impact_files_percent + m.cache_reuse_files_percent <= 100.0 + 1e-9);
        assert!(m.download_impact_bytes_percent + m.cache_reuse_bytes_percent <= 100.0 + 1e-9);
    }

    #[test]
    fn test_scenario_mixed() {
        let old = manifest(&[("./a.js", 100), ("./b.js", 150), ("./d.js", 50)]);
        let new = manifest(&[("./a.js", 100), ("./b.js", 200), ("./c.js", 300)]);

        let m = compare(&old, &new).unwrap();
        assert_invariants(&old, &new, &m);

        assert_eq!(m.stable_files, 1);
        assert_eq!(m.changed_files, 1);
        assert_eq!(m.added_files, 1);
        assert_eq!(m.removed_files, 1);
        assert_eq!(m.total_old_bytes, 300);
        assert_eq!(m.total_new_bytes, 600);
        assert_eq!(m.stable_bytes, 100);
        assert_eq!(m.changed_bytes, 200);
        assert_eq!(m.added_bytes, 300);
        assert_eq!(m.removed_bytes, 50);
        assert_close(m.download_impact_files_percent, 66.7);
        assert_close(m.cache_reuse_files_percent, 33.3);
        assert_close(m.download_impact_bytes_percent, 500.0 / 600.0 * 100.0);
        assert_close(m.cache_reuse_bytes_percent, 100.0 / 600.0 * 100.0);
    }

    #[test]
    fn test_identical_manifests() {
        let m0 = manifest(&[("./a.js", 1), ("./b.js", 2), ("./c.css", 3)]);

        let m = compare(&m0, &m0).unwrap();
        assert_invariants(&m0, &m0, &m);
        assert_eq!(m.stable_files, 3);
        assert_eq!(m.changed_files + m.added_files + m.removed_files, 0);
        assert_eq!(m.cache_reuse_files_percent, 100.0);
        assert_eq!(m.download_impact_files_percent, 0.0);
    }

    #[test]
    fn test_first_deploy() {
        let empty = Manifest::new();
        let new = manifest(&[("./a.js", 10), ("./b.js", 20)]);

        let m = compare(&empty, &new).unwrap();
        assert_invariants(&empty, &new, &m);
        assert!(m.is_first_deploy());
        assert_eq!(m.added_files, 2);
        assert_eq!(m.stable_files + m.changed_files + m.removed_files, 0);
        assert_eq!(m.download_impact_files_percent, 100.0);
        assert_eq!(m.download_impact_bytes_percent, 100.0);
    }

    #[test]
    fn test_all_removed() {
        let old = manifest(&[("./a.js", 10), ("./b.js", 20)]);
        let empty = Manifest::new();

        let m = compare(&old, &empty).unwrap();
        assert_invariants(&old, &empty, &m);
        assert_eq!(m.removed_files, 2);
        assert_eq!(m.removed_bytes, 30);
        assert_eq!(m.total_new_files, 0);
        assert_eq!(m.download_impact_files_percent, 0.0);
        assert_eq!(m.cache_reuse_files_percent, 0.0);
        assert_eq!(m.download_impact_bytes_percent, 0.0);
        assert_eq!(m.cache_reuse_bytes_percent, 0.0);
    }

    #[test]
    fn test_both_empty() {
        let m = compare(&Manifest::new(), &Manifest::new()).unwrap();
        assert_eq!(m.total_new_files, 0);
        assert_eq!(m.cache_reuse_files_percent, 0.0);
    }

    #[test]
    fn test_zero_byte_files_do_not_divide_by_zero() {
        let new = manifest(&[("./empty.txt", 0)]);

        let m = compare(&Manifest::new(), &new).unwrap();
        assert_eq!(m.total_new_bytes, 0);
        assert_eq!(m.download_impact_files_percent, 100.0);
        assert_eq!(m.download_impact_bytes_percent, 0.0);
    }

    #[test]
    fn test_baseline_byte_overflow_is_compute_failure() {
        let old = manifest(&[("./x.js", u64::MAX), ("./y.js", u64::MAX)]);
        let new = manifest(&[("./x.js", 1)]);

        let err = compare(&old, &new).unwrap_err();
        assert_eq!(err.code(), "CHURN_COMPUTE_FAILED");
        assert!(err.to_string().contains("baseline"));
    }

    #[test]
    fn test_single_max_size_file_fits() {
        let old = manifest(&[("./x.js", u64::MAX)]);

        let m = compare(&old, &old).unwrap();
        assert_eq!(m.total_old_bytes, u64::MAX);
        assert_eq!(m.stable_bytes, u64::MAX);
        assert_eq!(m.cache_reuse_bytes_percent, 100.0);
    }

    #[test]
    fn test_unparseable_baseline_reads_as_first_deploy() {
        let old = crate::manifest::parse("garbage\n\n  \n");
        let new = manifest(&[("./a.js", 10)]);

        let m = compare(&old, &new).unwrap();
        assert!(m.is_first_deploy());
        assert_eq!(m.added_files, 1);
    }

    #[test]
    fn test_serializes_camel_case() {
        let m = compare(&Manifest::new(), &manifest(&[("./a.js", 1)])).unwrap();
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["addedFiles"], 1);
        assert_eq!(json["downloadImpactFilesPercent"], 100.0);
    }
}
