use crate::config::CommandConfig;
use crate::models::error::DispatchError;
use crate::models::types::{Artifact, CommandHandle, TargetSet};
use crate::services::command_trait::{CommandRequest, CommandService};
use shell_escape::escape;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Renders the remote download command for one staged object.
///
/// The object URI and destination are shell-quoted; `--dryrun` is appended
/// only when requested.
pub fn render_copy_command(bucket: &str, key: &str, destination: &str, dry_run: bool) -> String {
    let uri = format!("s3://{}/{}", bucket, key);
    let mut command = format!(
        "aws s3 cp {} {}",
        escape(Cow::Borrowed(uri.as_str())),
        escape(Cow::Borrowed(destination))
    );
    if dry_run {
        command.push_str(" --dryrun");
    }
    command
}

pub struct Dispatcher {
    service: Arc<dyn CommandService>,
    document_name: String,
    execution_timeout: Duration,
}

impl Dispatcher {
    pub fn new(service: Arc<dyn CommandService>, config: &CommandConfig) -> Self {
        Self {
            service,
            document_name: config.document_name.clone(),
            execution_timeout: config.execution_timeout,
        }
    }

    /// Send `command` to every target in one request.
    #[instrument(skip(self, command, targets), fields(targets = targets.len()))]
    pub async fn dispatch(
        &self,
        command: &str,
        targets: &TargetSet,
        timeout: Duration,
    ) -> Result<CommandHandle, DispatchError> {
        self.dispatch_with_comment(command, targets, timeout, None).await
    }

    /// Render and send the copy command for `artifact` using the configured timeout.
    pub async fn dispatch_copy(
        &self,
        artifact: &Artifact,
        bucket: &str,
        destination: &str,
        dry_run: bool,
        targets: &TargetSet,
    ) -> Result<CommandHandle, DispatchError> {
        let command = render_copy_command(bucket, &artifact.key, destination, dry_run);
        let comment = format!("ssm-copy {}", artifact.base_name);
        self.dispatch_with_comment(&command, targets, self.execution_timeout, Some(comment))
            .await
    }

    async fn dispatch_with_comment(
        &self,
        command: &str,
        targets: &TargetSet,
        timeout: Duration,
        comment: Option<String>,
    ) -> Result<CommandHandle, DispatchError> {
        if targets.is_empty() {
            return Err(DispatchError::NoTargets);
        }
        if command.trim().is_empty() {
            return Err(DispatchError::InvalidCommand(
                "command must not be empty".to_string(),
            ));
        }
        if timeout.is_zero() {
            return Err(DispatchError::InvalidCommand(
                "execution timeout must be at least one second".to_string(),
            ));
        }

        let request = CommandRequest {
            document_name: self.document_name.clone(),
            commands: vec![command.to_string()],
            instance_ids: targets.as_slice().to_vec(),
            execution_timeout: timeout,
            comment,
        };

        let handle = self.service.send_command(&request).await?;
        info!(command_id = %handle, command = %command, "Command dispatched");
        Ok(handle)
    }
}
