use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// A local file to be copied to the targets, together with its staging key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub source: String,
    pub base_name: String,
    pub key: String,
}

impl Artifact {
    pub fn new(source: impl Into<String>, prefix: &str) -> Self {
        let source = source.into();
        let base_name = base_name(&source);
        let prefix = prefix.trim_end_matches('/');
        let key = if prefix.is_empty() {
            base_name.clone()
        } else {
            format!("{}/{}", prefix, base_name)
        };

        Self {
            source,
            base_name,
            key,
        }
    }
}

/// Last path element of `path`, ignoring trailing separators.
pub fn base_name(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    trimmed
        .rsplit('/')
        .next()
        .unwrap_or(trimmed)
        .to_string()
}

/// Instance ids a command runs on. Keeps first-seen order and drops repeats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetSet {
    ids: Vec<String>,
}

impl TargetSet {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ids.into_iter().map(|id| -> String { id.into() }).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.ids.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.ids
    }
}

impl FromIterator<String> for TargetSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        let mut seen = HashSet::new();
        let ids = iter
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .collect();
        Self { ids }
    }
}

/// Command id handed back by the command service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandHandle(String);

impl CommandHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvocationStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    TimedOut,
    Cancelled,
    /// Any other terminal status reported by the service.
    Other(String),
}

impl InvocationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvocationStatus::Pending | InvocationStatus::InProgress)
    }
}

impl fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationStatus::Pending => f.write_str("Pending"),
            InvocationStatus::InProgress => f.write_str("InProgress"),
            InvocationStatus::Success => f.write_str("Success"),
            InvocationStatus::Failed => f.write_str("Failed"),
            InvocationStatus::TimedOut => f.write_str("TimedOut"),
            InvocationStatus::Cancelled => f.write_str("Cancelled"),
            InvocationStatus::Other(status) => f.write_str(status),
        }
    }
}

/// Result of a single status query for one (command, instance) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationObservation {
    pub status: InvocationStatus,
    pub stdout: String,
    pub stderr: String,
    pub status_details: Option<String>,
}

impl InvocationObservation {
    pub fn new(status: InvocationStatus) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: String::new(),
            status_details: None,
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn with_status_details(mut self, details: impl Into<String>) -> Self {
        self.status_details = Some(details.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Failed,
    TimedOut,
    Cancelled,
    Other,
    /// Status could not be determined: queries kept failing or the poll limit ran out.
    Unknown,
    /// Polling was cancelled by the operator before the instance finished.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum InstanceResult {
    Success { output: String },
    Failure { kind: FailureKind, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceOutcome {
    pub instance_id: String,
    #[serde(flatten)]
    pub result: InstanceResult,
}

impl InstanceOutcome {
    pub fn success(instance_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            result: InstanceResult::Success {
                output: output.into(),
            },
        }
    }

    pub fn failure(
        instance_id: impl Into<String>,
        kind: FailureKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            result: InstanceResult::Failure {
                kind,
                reason: reason.into(),
            },
        }
    }

    /// Builds the outcome for a terminal observation. Returns `None` while the
    /// invocation is still pending or in progress.
    pub fn from_observation(
        instance_id: impl Into<String>,
        observation: InvocationObservation,
    ) -> Option<Self> {
        let kind = match &observation.status {
            InvocationStatus::Pending | InvocationStatus::InProgress => return None,
            InvocationStatus::Success => {
                return Some(Self::success(instance_id, observation.stdout));
            }
            InvocationStatus::Failed => FailureKind::Failed,
            InvocationStatus::TimedOut => FailureKind::TimedOut,
            InvocationStatus::Cancelled => FailureKind::Cancelled,
            InvocationStatus::Other(_) => FailureKind::Other,
        };

        let mut reason = format!("invocation {}", observation.status);
        if let Some(details) = observation
            .status_details
            .as_deref()
            .filter(|d| !d.is_empty() && *d != observation.status.to_string())
        {
            reason.push_str(&format!(" ({})", details));
        }
        let stderr = observation.stderr.trim();
        if !stderr.is_empty() {
            reason.push_str(": ");
            reason.push_str(stderr);
        }

        Some(Self::failure(instance_id, kind, reason))
    }

    pub fn is_success(&self) -> bool {
        matches!(self.result, InstanceResult::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ArtifactOutcome {
    StageFailed { reason: String },
    DispatchFailed { reason: String },
    Completed { instances: Vec<InstanceOutcome> },
    /// Not attempted because the run was cancelled first.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReport {
    pub source: String,
    pub key: String,
    pub staged: bool,
    pub command_id: Option<CommandHandle>,
    pub outcome: ArtifactOutcome,
}

impl ArtifactReport {
    pub fn is_success(&self) -> bool {
        match &self.outcome {
            ArtifactOutcome::Completed { instances } => {
                instances.iter().all(InstanceOutcome::is_success)
            }
            _ => false,
        }
    }

    pub fn instances(&self) -> &[InstanceOutcome] {
        match &self.outcome {
            ArtifactOutcome::Completed { instances } => instances,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cancelled: bool,
    pub artifacts: Vec<ArtifactReport>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.artifacts.iter().all(ArtifactReport::is_success)
    }

    pub fn failed_artifacts(&self) -> usize {
        self.artifacts.iter().filter(|a| !a.is_success()).count()
    }

    pub fn duration(&self) -> Duration {
        self.finished_at
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}
