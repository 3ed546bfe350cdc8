//! Phase 5 ("Report", §4.10): per-package outcomes plus the exit-code
//! mapping an external CLI renders against (§6 "Exit codes").

/// Final state of one scanned package after a run.
#[derive(Debug, Clone)]
pub enum PackageStatus {
    Succeeded { from: String, to: String },
    UpToDate,
    Failed(String),
    Ignored,
    Floating,
    Unsupported(String),
}

#[derive(Debug, Clone)]
pub struct PackageReport {
    pub rule: String,
    pub name: String,
    pub group: Option<String>,
    pub status: PackageStatus,
}

#[derive(Debug, Clone, Default)]
pub struct Report {
    pub packages: Vec<PackageReport>,
    /// Manifest scan failures, attached to their path (§4.6).
    pub scan_errors: Vec<(std::path::PathBuf, String)>,
    pub dry_run: bool,
}

impl Report {
    pub fn succeeded(&self) -> impl Iterator<Item = &PackageReport> {
        self.packages.iter().filter(|p| matches!(p.status, PackageStatus::Succeeded { .. }))
    }

    pub fn failed(&self) -> impl Iterator<Item = &PackageReport> {
        self.packages.iter().filter(|p| matches!(p.status, PackageStatus::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    /// §6 "Exit codes: 0 success, 1 partial failure with
    /// `--continue-on-fail`, 2 complete failure, 3 configuration error".
    /// Configuration errors (3) are surfaced as an `Err` from
    /// `Orchestrator::run` rather than folded into a report, so this
    /// only distinguishes 0/1/2.
    pub fn exit_code(&self, continue_on_fail: bool) -> i32 {
        let attempted = self
            .packages
            .iter()
            .filter(|p| matches!(p.status, PackageStatus::Succeeded { .. } | PackageStatus::Failed(_)))
            .count();
        let failed = self.failed().count();

        if failed == 0 {
            return 0;
        }
        if failed == attempted || !continue_on_fail {
            2
        } else {
            1
        }
    }
}
