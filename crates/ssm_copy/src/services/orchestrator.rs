use crate::models::error::OrchestratorError;
use crate::models::types::{Artifact, ArtifactOutcome, ArtifactReport, Report, TargetSet};
use crate::services::dispatcher::Dispatcher;
use crate::services::poller::InvocationPoller;
use crate::stores::stager_trait::ObjectStager;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Runs stage, dispatch and poll for each artifact in input order.
///
/// A stage or dispatch failure only affects its own artifact; the run moves on
/// to the next one.
pub struct Orchestrator {
    stager: Arc<dyn ObjectStager>,
    dispatcher: Dispatcher,
    poller: InvocationPoller,
    bucket: String,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        stager: Arc<dyn ObjectStager>,
        dispatcher: Dispatcher,
        poller: InvocationPoller,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            stager,
            dispatcher,
            poller,
            bucket: bucket.into(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[instrument(skip_all, fields(artifacts = artifacts.len(), targets = targets.len(), dry_run = dry_run))]
    pub async fn run(
        &self,
        artifacts: &[Artifact],
        targets: &TargetSet,
        destination: &str,
        dry_run: bool,
    ) -> Result<Report, OrchestratorError> {
        if artifacts.is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "no source artifacts".to_string(),
            ));
        }
        if targets.is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "no target instances".to_string(),
            ));
        }
        if destination.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "destination must not be empty".to_string(),
            ));
        }
        if self.bucket.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "staging bucket must not be empty".to_string(),
            ));
        }

        info!(bucket = %self.bucket, destination = %destination, "Starting copy run");
        let started_at = Utc::now();
        let mut reports = Vec::with_capacity(artifacts.len());
        let mut cancelled = false;

        for artifact in artifacts {
            if cancelled || self.cancel.is_cancelled() {
                cancelled = true;
                reports.push(ArtifactReport {
                    source: artifact.source.clone(),
                    key: artifact.key.clone(),
                    staged: false,
                    command_id: None,
                    outcome: ArtifactOutcome::Skipped,
                });
                continue;
            }

            let (report, aborted) = self
                .process_artifact(artifact, targets, destination, dry_run)
                .await;
            cancelled |= aborted;
            reports.push(report);
        }

        let report = Report {
            started_at,
            finished_at: Utc::now(),
            cancelled,
            artifacts: reports,
        };

        info!(
            duration_ms = report.duration().as_millis(),
            failed_artifacts = report.failed_artifacts(),
            cancelled = report.cancelled,
            "Copy run completed"
        );

        Ok(report)
    }

    async fn process_artifact(
        &self,
        artifact: &Artifact,
        targets: &TargetSet,
        destination: &str,
        dry_run: bool,
    ) -> (ArtifactReport, bool) {
        let mut report = ArtifactReport {
            source: artifact.source.clone(),
            key: artifact.key.clone(),
            staged: false,
            command_id: None,
            outcome: ArtifactOutcome::Skipped,
        };

        if let Err(e) = self
            .stager
            .stage_file(&self.bucket, &artifact.key, Path::new(&artifact.source))
            .await
        {
            warn!(artifact = %artifact.source, error = %e, "Staging failed, skipping artifact");
            report.outcome = ArtifactOutcome::StageFailed {
                reason: format!("{}: {}", artifact.source, e),
            };
            return (report, false);
        }
        report.staged = true;

        let handle = match self
            .dispatcher
            .dispatch_copy(artifact, &self.bucket, destination, dry_run, targets)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                warn!(artifact = %artifact.source, error = %e, "Dispatch failed, skipping artifact");
                report.outcome = ArtifactOutcome::DispatchFailed {
                    reason: format!("{}: {}", artifact.source, e),
                };
                return (report, false);
            }
        };
        report.command_id = Some(handle.clone());

        let result = self.poller.poll(&handle, targets, &self.cancel).await;
        report.outcome = ArtifactOutcome::Completed {
            instances: result.outcomes,
        };

        (report, result.aborted)
    }
}
