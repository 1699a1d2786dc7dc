use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("Invalid staging input: {0}")]
    InvalidInput(String),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("S3 upload to s3://{bucket}/{key} failed: {cause}")]
    Upload {
        bucket: String,
        key: String,
        cause: String,
    },
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No target instances to dispatch to")]
    NoTargets,

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("SendCommand failed: {cause}")]
    Service { cause: String },

    #[error("SendCommand response did not carry a command id")]
    MissingCommandId,
}

#[derive(Debug, Error)]
pub enum StatusQueryError {
    #[error("GetCommandInvocation for {instance_id} failed: {cause}")]
    Service { instance_id: String, cause: String },

    #[error("GetCommandInvocation for {instance_id} returned no status")]
    MissingStatus { instance_id: String },
}

#[derive(Debug, Error)]
pub enum UsageError {
    #[error("At least one source and a destination are required")]
    MissingPaths,

    #[error("At least one target instance id (-i) is required")]
    NoInstances,

    #[error("An S3 bucket is required (--s3-bucket or s3.bucket in config)")]
    NoBucket,

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid run input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Usage(#[from] UsageError),
}
