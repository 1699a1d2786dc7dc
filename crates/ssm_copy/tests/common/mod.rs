//! In-memory fakes for the staging and command services.

#![allow(dead_code)]

use ssm_copy::config::PollerConfig;
use ssm_copy::models::error::{DispatchError, StageError, StatusQueryError};
use ssm_copy::models::types::{CommandHandle, InstanceOutcome, InvocationObservation, InvocationStatus};
use ssm_copy::services::command_trait::{CommandRequest, CommandService};
use ssm_copy::services::poller::OutcomeSink;
use ssm_copy::stores::stager_trait::{validate_location, ObjectStager};
use ssm_copy::utils::retry::RetryPolicy;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Poller settings with no waiting between rounds or retries.
pub fn fast_poller_config(max_attempts: u32) -> PollerConfig {
    PollerConfig {
        interval: Duration::ZERO,
        max_rounds: None,
        max_poll_duration: None,
        retry: RetryPolicy::immediate(max_attempts),
    }
}

pub fn running() -> Result<InvocationObservation, String> {
    Ok(InvocationObservation::new(InvocationStatus::InProgress))
}

pub fn pending() -> Result<InvocationObservation, String> {
    Ok(InvocationObservation::new(InvocationStatus::Pending))
}

pub fn success(stdout: &str) -> Result<InvocationObservation, String> {
    Ok(InvocationObservation::new(InvocationStatus::Success).with_stdout(stdout))
}

pub fn terminal(status: InvocationStatus) -> Result<InvocationObservation, String> {
    Ok(InvocationObservation::new(status))
}

pub fn transport_error(cause: &str) -> Result<InvocationObservation, String> {
    Err(cause.to_string())
}

#[derive(Default)]
pub struct MemoryStager {
    objects: Mutex<Vec<(String, String, Vec<u8>)>>,
}

impl MemoryStager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn objects(&self) -> Vec<(String, String, Vec<u8>)> {
        self.objects.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ObjectStager for MemoryStager {
    async fn stage(&self, bucket: &str, key: &str, content: Vec<u8>) -> Result<(), StageError> {
        validate_location(bucket, key)?;
        self.objects
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string(), content));
        Ok(())
    }
}

/// Command service that replays a scripted status sequence per instance and
/// records every call it receives.
#[derive(Default)]
pub struct ScriptedCommandService {
    scripts: Mutex<HashMap<String, VecDeque<Result<InvocationObservation, String>>>>,
    queries: Mutex<Vec<(String, String)>>,
    sent: Mutex<Vec<CommandRequest>>,
    reject_commands_containing: Mutex<Vec<String>>,
    next_id: AtomicUsize,
}

impl ScriptedCommandService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(
        self,
        instance_id: &str,
        responses: Vec<Result<InvocationObservation, String>>,
    ) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(instance_id.to_string())
            .or_default()
            .extend(responses);
        self
    }

    pub fn reject_commands_containing(self, needle: &str) -> Self {
        self.reject_commands_containing
            .lock()
            .unwrap()
            .push(needle.to_string());
        self
    }

    /// Every status query as (command id, instance id), in call order.
    pub fn queries(&self) -> Vec<(String, String)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn queried_instances(&self) -> Vec<String> {
        self.queries().into_iter().map(|(_, instance)| instance).collect()
    }

    pub fn query_count(&self, instance_id: &str) -> usize {
        self.queries()
            .iter()
            .filter(|(_, instance)| instance == instance_id)
            .count()
    }

    pub fn sent(&self) -> Vec<CommandRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CommandService for ScriptedCommandService {
    async fn send_command(&self, request: &CommandRequest) -> Result<CommandHandle, DispatchError> {
        let rejected = self
            .reject_commands_containing
            .lock()
            .unwrap()
            .iter()
            .any(|needle| request.commands.iter().any(|c| c.contains(needle.as_str())));
        if rejected {
            return Err(DispatchError::Service {
                cause: "InvalidInstanceId: instance is not registered".to_string(),
            });
        }

        self.sent.lock().unwrap().push(request.clone());
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CommandHandle::new(format!("cmd-{}", id)))
    }

    async fn get_invocation(
        &self,
        handle: &CommandHandle,
        instance_id: &str,
    ) -> Result<InvocationObservation, StatusQueryError> {
        self.queries
            .lock()
            .unwrap()
            .push((handle.as_str().to_string(), instance_id.to_string()));

        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(instance_id)
            .and_then(VecDeque::pop_front);

        match next {
            Some(Ok(observation)) => Ok(observation),
            Some(Err(cause)) => Err(StatusQueryError::Service {
                instance_id: instance_id.to_string(),
                cause,
            }),
            None => Err(StatusQueryError::Service {
                instance_id: instance_id.to_string(),
                cause: "unscripted query".to_string(),
            }),
        }
    }
}

/// Sink that keeps every outcome it is handed.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<(String, InstanceOutcome)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(String, InstanceOutcome)> {
        self.records.lock().unwrap().clone()
    }
}

impl OutcomeSink for RecordingSink {
    fn record(&self, handle: &CommandHandle, outcome: &InstanceOutcome) {
        self.records
            .lock()
            .unwrap()
            .push((handle.as_str().to_string(), outcome.clone()));
    }
}
