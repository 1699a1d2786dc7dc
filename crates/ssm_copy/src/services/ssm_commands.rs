//! AWS Systems Manager Run Command backend

use crate::models::error::{DispatchError, StatusQueryError};
use crate::models::types::{CommandHandle, InvocationObservation, InvocationStatus};
use crate::services::command_trait::{CommandRequest, CommandService};
use aws_config::SdkConfig;
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::types::CommandInvocationStatus;
use aws_sdk_ssm::Client as SsmClient;
use tracing::{debug, info};

/// SSM caps the comment field at 100 characters.
const MAX_COMMENT_CHARS: usize = 100;

pub struct SsmCommandService {
    ssm_client: SsmClient,
}

impl SsmCommandService {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            ssm_client: SsmClient::new(sdk_config),
        }
    }
}

#[async_trait::async_trait]
impl CommandService for SsmCommandService {
    async fn send_command(&self, request: &CommandRequest) -> Result<CommandHandle, DispatchError> {
        let comment = request
            .comment
            .as_ref()
            .map(|c| c.chars().take(MAX_COMMENT_CHARS).collect::<String>());

        let output = self
            .ssm_client
            .send_command()
            .document_name(&request.document_name)
            .set_instance_ids(Some(request.instance_ids.clone()))
            .parameters("commands", request.commands.clone())
            .parameters(
                "executionTimeout",
                vec![request.execution_timeout.as_secs().to_string()],
            )
            .set_comment(comment)
            .send()
            .await
            .map_err(|e| DispatchError::Service {
                cause: DisplayErrorContext(&e).to_string(),
            })?;

        let command_id = output
            .command()
            .and_then(|command| command.command_id())
            .ok_or(DispatchError::MissingCommandId)?;

        info!(command_id = %command_id, document = %request.document_name, "SSM command sent");
        Ok(CommandHandle::new(command_id))
    }

    async fn get_invocation(
        &self,
        handle: &CommandHandle,
        instance_id: &str,
    ) -> Result<InvocationObservation, StatusQueryError> {
        let output = self
            .ssm_client
            .get_command_invocation()
            .command_id(handle.as_str())
            .instance_id(instance_id)
            .send()
            .await
            .map_err(|e| StatusQueryError::Service {
                instance_id: instance_id.to_string(),
                cause: DisplayErrorContext(&e).to_string(),
            })?;

        let status = output
            .status()
            .map(map_invocation_status)
            .ok_or_else(|| StatusQueryError::MissingStatus {
                instance_id: instance_id.to_string(),
            })?;

        debug!(command_id = %handle, instance_id = %instance_id, status = %status, "Invocation status");

        Ok(InvocationObservation {
            status,
            stdout: output.standard_output_content().unwrap_or_default().to_string(),
            stderr: output.standard_error_content().unwrap_or_default().to_string(),
            status_details: output.status_details().map(str::to_string),
        })
    }
}

/// Collapses the service's status values into the poller's lifecycle.
pub fn map_invocation_status(status: &CommandInvocationStatus) -> InvocationStatus {
    match status {
        CommandInvocationStatus::Pending | CommandInvocationStatus::Delayed => {
            InvocationStatus::Pending
        }
        CommandInvocationStatus::InProgress | CommandInvocationStatus::Cancelling => {
            InvocationStatus::InProgress
        }
        CommandInvocationStatus::Success => InvocationStatus::Success,
        CommandInvocationStatus::Failed => InvocationStatus::Failed,
        CommandInvocationStatus::TimedOut => InvocationStatus::TimedOut,
        CommandInvocationStatus::Cancelled => InvocationStatus::Cancelled,
        other => InvocationStatus::Other(other.as_str().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            map_invocation_status(&CommandInvocationStatus::Delayed),
            InvocationStatus::Pending
        );
        assert_eq!(
            map_invocation_status(&CommandInvocationStatus::Cancelling),
            InvocationStatus::InProgress
        );
        assert_eq!(
            map_invocation_status(&CommandInvocationStatus::Success),
            InvocationStatus::Success
        );
        assert_eq!(
            map_invocation_status(&CommandInvocationStatus::TimedOut),
            InvocationStatus::TimedOut
        );

        let unknown = map_invocation_status(&CommandInvocationStatus::from("Undeliverable"));
        assert_eq!(unknown, InvocationStatus::Other("Undeliverable".to_string()));
        assert!(unknown.is_terminal());
    }
}
