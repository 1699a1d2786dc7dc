//! ssm-copy library
//!
//! Copies local files to EC2 instances: each file is staged in S3, a download
//! command is sent through SSM Run Command, and every target instance is polled
//! until its invocation finishes.

// Core modules
pub mod app;
pub mod cli;
pub mod config;
pub mod models;
pub mod output;

// Services
pub mod services;

// Storage
pub mod stores;

// Utilities
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use models::error::AppError;
pub use models::types::{Artifact, CommandHandle, InvocationStatus, Report, TargetSet};
