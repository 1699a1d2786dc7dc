//! Drives a set of per-instance command invocations to terminal states.
//!
//! Each round queries every still-active instance once, in order, and builds
//! the next round's active set from that single pass. An instance that reaches
//! a terminal status produces exactly one [`InstanceOutcome`] and is never
//! queried again for the same command.

use crate::config::PollerConfig;
use crate::models::error::StatusQueryError;
use crate::models::types::{
    CommandHandle, FailureKind, InstanceOutcome, InvocationObservation, TargetSet,
};
use crate::services::command_trait::CommandService;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Receives each instance outcome as soon as it is decided.
pub trait OutcomeSink: Send + Sync {
    fn record(&self, handle: &CommandHandle, outcome: &InstanceOutcome);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult {
    /// Outcomes in the order they were decided.
    pub outcomes: Vec<InstanceOutcome>,
    pub rounds: u32,
    /// Polling stopped because cancellation was requested.
    pub aborted: bool,
}

enum QueryFailure {
    Exhausted { attempts: u32, error: String },
    Cancelled,
}

pub struct InvocationPoller {
    service: Arc<dyn CommandService>,
    config: PollerConfig,
    sink: Option<Arc<dyn OutcomeSink>>,
}

impl InvocationPoller {
    pub fn new(service: Arc<dyn CommandService>, config: PollerConfig) -> Self {
        Self {
            service,
            config,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[instrument(skip(self, handle, targets, cancel), fields(command_id = %handle, targets = targets.len()))]
    pub async fn poll(
        &self,
        handle: &CommandHandle,
        targets: &TargetSet,
        cancel: &CancellationToken,
    ) -> PollResult {
        let started = Instant::now();
        let mut active: Vec<String> = targets.iter().cloned().collect();
        let mut outcomes = Vec::with_capacity(active.len());
        let mut rounds = 0u32;
        let mut aborted = false;

        while !active.is_empty() {
            if cancel.is_cancelled() {
                warn!(remaining = active.len(), "Polling cancelled");
                for instance_id in active.drain(..) {
                    self.finish(handle, aborted_outcome(instance_id), &mut outcomes);
                }
                aborted = true;
                break;
            }

            if let Some(reason) = self.limit_reached(rounds, started.elapsed()) {
                warn!(remaining = active.len(), reason = %reason, "Poll limit reached");
                for instance_id in active.drain(..) {
                    let outcome = InstanceOutcome::failure(instance_id, FailureKind::Unknown, &reason);
                    self.finish(handle, outcome, &mut outcomes);
                }
                break;
            }

            rounds += 1;
            let mut still_active = Vec::with_capacity(active.len());

            for instance_id in active {
                if cancel.is_cancelled() {
                    self.finish(handle, aborted_outcome(instance_id), &mut outcomes);
                    aborted = true;
                    continue;
                }

                match self.query_with_retry(handle, &instance_id, cancel).await {
                    Ok(observation) => {
                        let status = observation.status.clone();
                        match InstanceOutcome::from_observation(instance_id.clone(), observation) {
                            Some(outcome) => self.finish(handle, outcome, &mut outcomes),
                            None => {
                                debug!(instance_id = %instance_id, status = %status, "Invocation still running");
                                still_active.push(instance_id);
                            }
                        }
                    }
                    Err(QueryFailure::Exhausted { attempts, error }) => {
                        let reason = format!(
                            "status unknown after {} failed queries: {}",
                            attempts, error
                        );
                        let outcome = InstanceOutcome::failure(instance_id, FailureKind::Unknown, reason);
                        self.finish(handle, outcome, &mut outcomes);
                    }
                    Err(QueryFailure::Cancelled) => {
                        self.finish(handle, aborted_outcome(instance_id), &mut outcomes);
                        aborted = true;
                    }
                }
            }

            // Instances left here after a mid-round cancel are aborted at the top of the loop.
            active = still_active;

            // A spent limit is reported at the top of the loop without another wait.
            if !active.is_empty() && self.limit_reached(rounds, started.elapsed()).is_none() {
                debug!(round = rounds, remaining = active.len(), "Waiting before next poll round");
                sleep_or_cancel(self.config.interval, cancel).await;
            }
        }

        info!(rounds = rounds, outcomes = outcomes.len(), aborted = aborted, "Polling finished");
        PollResult {
            outcomes,
            rounds,
            aborted,
        }
    }

    fn limit_reached(&self, rounds: u32, elapsed: Duration) -> Option<String> {
        if let Some(max_rounds) = self.config.max_rounds {
            if rounds >= max_rounds {
                return Some(format!("no terminal status after {} poll rounds", rounds));
            }
        }
        if let Some(max_duration) = self.config.max_poll_duration {
            if elapsed >= max_duration {
                return Some(format!(
                    "no terminal status after {}s of polling",
                    elapsed.as_secs()
                ));
            }
        }
        None
    }

    async fn query_with_retry(
        &self,
        handle: &CommandHandle,
        instance_id: &str,
        cancel: &CancellationToken,
    ) -> Result<InvocationObservation, QueryFailure> {
        let attempts = self.config.retry.attempts();
        let mut last_error: Option<StatusQueryError> = None;

        for attempt in 1..=attempts {
            let delay = self.config.retry.delay_before(attempt);
            if attempt > 1 {
                warn!(
                    instance_id = %instance_id,
                    attempt = attempt,
                    backoff_ms = delay.as_millis(),
                    "Retrying status query after backoff"
                );
                if !sleep_or_cancel(delay, cancel).await {
                    return Err(QueryFailure::Cancelled);
                }
            }

            match self.service.get_invocation(handle, instance_id).await {
                Ok(observation) => return Ok(observation),
                Err(e) => {
                    warn!(instance_id = %instance_id, attempt = attempt, error = %e, "Status query failed");
                    last_error = Some(e);
                }
            }
        }

        Err(QueryFailure::Exhausted {
            attempts,
            error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    fn finish(
        &self,
        handle: &CommandHandle,
        outcome: InstanceOutcome,
        outcomes: &mut Vec<InstanceOutcome>,
    ) {
        if outcome.is_success() {
            info!(instance_id = %outcome.instance_id, "Invocation succeeded");
        } else {
            warn!(instance_id = %outcome.instance_id, result = ?outcome.result, "Invocation did not succeed");
        }
        if let Some(ref sink) = self.sink {
            sink.record(handle, &outcome);
        }
        outcomes.push(outcome);
    }
}

fn aborted_outcome(instance_id: String) -> InstanceOutcome {
    InstanceOutcome::failure(instance_id, FailureKind::Aborted, "polling cancelled before completion")
}

/// Sleeps for `delay` unless `cancel` fires first. Returns `false` when cancelled.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if delay.is_zero() {
        return true;
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
