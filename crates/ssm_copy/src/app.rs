//! Application initialization and setup

use crate::config::{AwsConfig, Config};
use crate::models::error::{AppError, UsageError};
use crate::services::command_trait::CommandService;
use crate::services::dispatcher::Dispatcher;
use crate::services::orchestrator::Orchestrator;
use crate::services::poller::{InvocationPoller, OutcomeSink};
use crate::services::ssm_commands::SsmCommandService;
use crate::stores::s3_stager::S3Stager;
use crate::stores::stager_trait::ObjectStager;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Application components for one copy run
pub struct App {
    pub orchestrator: Orchestrator,
}

impl App {
    /// Resolve one AWS session and build the S3 and SSM clients from it
    pub async fn initialize(
        config: &Config,
        sink: Option<Arc<dyn OutcomeSink>>,
        cancel: CancellationToken,
    ) -> Result<Self, AppError> {
        let sdk_config = load_sdk_config(&config.aws).await;
        info!(region = ?sdk_config.region(), "AWS session resolved");

        let stager: Arc<dyn ObjectStager> = Arc::new(S3Stager::new(&sdk_config, &config.s3));
        let commands: Arc<dyn CommandService> = Arc::new(SsmCommandService::new(&sdk_config));

        Self::with_services(config, stager, commands, sink, cancel)
    }

    /// Wire the orchestrator around the given collaborators
    pub fn with_services(
        config: &Config,
        stager: Arc<dyn ObjectStager>,
        commands: Arc<dyn CommandService>,
        sink: Option<Arc<dyn OutcomeSink>>,
        cancel: CancellationToken,
    ) -> Result<Self, AppError> {
        let bucket = config
            .s3
            .bucket
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .ok_or(UsageError::NoBucket)?;

        let dispatcher = Dispatcher::new(Arc::clone(&commands), &config.command);
        let mut poller = InvocationPoller::new(commands, config.poller.clone());
        if let Some(sink) = sink {
            poller = poller.with_sink(sink);
        }

        let orchestrator =
            Orchestrator::new(stager, dispatcher, poller, bucket).with_cancellation(cancel);

        Ok(App { orchestrator })
    }
}

/// Load the shared SDK configuration, honoring an explicit region or profile
pub async fn load_sdk_config(aws: &AwsConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &aws.region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let Some(profile) = &aws.profile {
        loader = loader.profile_name(profile);
    }
    loader.load().await
}
