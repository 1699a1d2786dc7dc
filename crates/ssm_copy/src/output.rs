//! Console rendering of instance outcomes and run reports

use crate::models::types::{
    ArtifactOutcome, CommandHandle, InstanceOutcome, InstanceResult, Report,
};
use crate::services::poller::OutcomeSink;
use std::fmt::Write as _;
use std::io::{self, Write};

/// Prints each instance id and its captured output as soon as it succeeds.
/// Failures go to stderr.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

impl OutcomeSink for ConsoleSink {
    fn record(&self, _handle: &CommandHandle, outcome: &InstanceOutcome) {
        match &outcome.result {
            InstanceResult::Success { output } => {
                let mut stdout = io::stdout().lock();
                let _ = writeln!(stdout, "{}", outcome.instance_id);
                let _ = writeln!(stdout, "{}", output.trim_end());
                let _ = stdout.flush();
            }
            InstanceResult::Failure { reason, .. } => {
                eprintln!("{}: {}", outcome.instance_id, reason);
            }
        }
    }
}

/// Human-readable per-artifact summary.
pub fn render_summary(report: &Report) -> String {
    let mut out = String::new();

    for artifact in &report.artifacts {
        let state = match &artifact.outcome {
            ArtifactOutcome::StageFailed { reason } => format!("stage failed: {}", reason),
            ArtifactOutcome::DispatchFailed { reason } => format!("dispatch failed: {}", reason),
            ArtifactOutcome::Skipped => "skipped".to_string(),
            ArtifactOutcome::Completed { instances } => {
                let succeeded = instances.iter().filter(|i| i.is_success()).count();
                format!("{}/{} instances succeeded", succeeded, instances.len())
            }
        };
        let _ = writeln!(out, "{} -> {}: {}", artifact.source, artifact.key, state);

        for instance in artifact.instances() {
            if let InstanceResult::Failure { kind, reason } = &instance.result {
                let _ = writeln!(out, "  {} {:?}: {}", instance.instance_id, kind, reason);
            }
        }
    }

    let failed = report.failed_artifacts();
    let _ = write!(
        out,
        "{} of {} artifacts copied in {:.1}s",
        report.artifacts.len() - failed,
        report.artifacts.len(),
        report.duration().as_secs_f64()
    );
    if report.cancelled {
        out.push_str(" (cancelled)");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::{ArtifactReport, FailureKind};
    use chrono::Utc;

    #[test]
    fn test_render_summary() {
        let now = Utc::now();
        let report = Report {
            started_at: now,
            finished_at: now,
            cancelled: false,
            artifacts: vec![
                ArtifactReport {
                    source: "file1".into(),
                    key: "ey/file1".into(),
                    staged: true,
                    command_id: Some(CommandHandle::new("cmd-1")),
                    outcome: ArtifactOutcome::Completed {
                        instances: vec![
                            InstanceOutcome::success("i-2", "ok"),
                            InstanceOutcome::failure("i-1", FailureKind::TimedOut, "invocation TimedOut"),
                        ],
                    },
                },
                ArtifactReport {
                    source: "file2".into(),
                    key: "ey/file2".into(),
                    staged: true,
                    command_id: None,
                    outcome: ArtifactOutcome::DispatchFailed {
                        reason: "file2: invalid instance id".into(),
                    },
                },
            ],
        };

        let summary = render_summary(&report);
        assert!(summary.contains("file1 -> ey/file1: 1/2 instances succeeded"));
        assert!(summary.contains("  i-1 TimedOut: invocation TimedOut"));
        assert!(summary.contains("file2 -> ey/file2: dispatch failed: file2: invalid instance id"));
        assert!(summary.contains("0 of 2 artifacts copied"));
    }
}
