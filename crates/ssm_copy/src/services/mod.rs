//! Command dispatch, polling and orchestration

pub mod command_trait;
pub mod dispatcher;
pub mod orchestrator;
pub mod poller;
pub mod ssm_commands;
