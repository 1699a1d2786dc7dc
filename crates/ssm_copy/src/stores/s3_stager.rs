//! S3-based object staging

use crate::config::S3Config;
use crate::models::error::StageError;
use crate::stores::stager_trait::{validate_location, ObjectStager};
use aws_config::SdkConfig;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tracing::{debug, info, instrument};

pub struct S3Stager {
    s3_client: S3Client,
}

impl S3Stager {
    pub fn new(sdk_config: &SdkConfig, config: &S3Config) -> Self {
        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(sdk_config);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let s3_client = S3Client::from_conf(s3_config_builder.build());
        debug!(endpoint = ?config.endpoint, path_style = config.force_path_style, "S3 stager initialized");

        Self { s3_client }
    }
}

#[async_trait::async_trait]
impl ObjectStager for S3Stager {
    #[instrument(skip(self, content), fields(size = content.len()))]
    async fn stage(&self, bucket: &str, key: &str, content: Vec<u8>) -> Result<(), StageError> {
        validate_location(bucket, key)?;
        let size = content.len();

        self.s3_client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(|e| StageError::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                cause: DisplayErrorContext(&e).to_string(),
            })?;

        info!(bucket = %bucket, key = %key, size = size, "Object staged to S3");
        Ok(())
    }
}
