//! Trait for remote command execution backends

use crate::models::error::{DispatchError, StatusQueryError};
use crate::models::types::{CommandHandle, InvocationObservation};
use std::time::Duration;

/// A fully rendered request to run a shell document on a set of instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub document_name: String,
    pub commands: Vec<String>,
    pub instance_ids: Vec<String>,
    pub execution_timeout: Duration,
    pub comment: Option<String>,
}

#[async_trait::async_trait]
pub trait CommandService: Send + Sync {
    /// Start the command on every instance. Returns as soon as the service
    /// has accepted it; execution continues asynchronously on each target.
    async fn send_command(&self, request: &CommandRequest) -> Result<CommandHandle, DispatchError>;

    /// Query one instance's invocation of a previously sent command.
    async fn get_invocation(
        &self,
        handle: &CommandHandle,
        instance_id: &str,
    ) -> Result<InvocationObservation, StatusQueryError>;
}
