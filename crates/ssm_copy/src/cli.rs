//! Command-line surface.
//!
//! `ssm-copy [OPTIONS] <SOURCE>... <DESTINATION>`: every positional except the
//! last is a local file to copy; the last is the destination path on the
//! target instances.

use crate::config::Config;
use crate::models::error::UsageError;
use crate::models::types::{Artifact, TargetSet};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Copy local files to EC2 instances through S3 and SSM Run Command.
#[derive(Debug, Parser)]
#[command(name = "ssm-copy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Source files followed by the destination path.
    #[arg(value_name = "PATHS")]
    pub paths: Vec<String>,

    /// Target EC2 instance id (repeatable).
    #[arg(short = 'i', long = "instance-id", value_name = "ID")]
    pub instance_ids: Vec<String>,

    /// S3 bucket used as temporary file storage.
    #[arg(long = "s3-bucket", visible_alias = "s3bucket")]
    pub s3_bucket: Option<String>,

    /// Key prefix for staged files (default: ey).
    #[arg(long = "s3-prefix", visible_alias = "s3prefix")]
    pub s3_prefix: Option<String>,

    /// Pass --dryrun to the remote copy.
    #[arg(long = "dryrun", visible_alias = "dry-run")]
    pub dry_run: bool,

    /// Configuration file (YAML, TOML or JSON).
    #[arg(long, env = "SSM_COPY_CONFIG")]
    pub config: Option<PathBuf>,

    /// AWS region override.
    #[arg(long)]
    pub region: Option<String>,

    /// AWS shared-config profile.
    #[arg(long)]
    pub profile: Option<String>,

    /// Output format.
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Seconds between poll rounds.
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<u64>,

    /// Give up on unfinished instances after this many seconds (0 disables).
    #[arg(long, value_name = "SECS")]
    pub max_poll_duration: Option<u64>,
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Instance output as it arrives, then a summary.
    #[default]
    Text,
    /// The full run report as JSON.
    Json,
}

/// Validated inputs for one orchestration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub artifacts: Vec<Artifact>,
    pub targets: TargetSet,
    pub destination: String,
    pub dry_run: bool,
}

impl Cli {
    /// Split the positionals into sources and the trailing destination.
    pub fn sources_and_destination(&self) -> Result<(&[String], &str), UsageError> {
        match self.paths.split_last() {
            Some((destination, sources)) if !sources.is_empty() => {
                Ok((sources, destination.as_str()))
            }
            _ => Err(UsageError::MissingPaths),
        }
    }

    /// Apply flag overrides on top of file and environment configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(ref bucket) = self.s3_bucket {
            config.s3.bucket = Some(bucket.clone());
        }
        if let Some(ref prefix) = self.s3_prefix {
            config.s3.prefix = prefix.clone();
        }
        if let Some(ref region) = self.region {
            config.aws.region = Some(region.clone());
        }
        if let Some(ref profile) = self.profile {
            config.aws.profile = Some(profile.clone());
        }
        if let Some(secs) = self.poll_interval {
            config.poller.interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.max_poll_duration {
            config.poller.max_poll_duration = (secs > 0).then(|| Duration::from_secs(secs));
        }
    }

    /// Validate the invocation against the effective configuration.
    pub fn plan(&self, config: &Config) -> Result<RunPlan, UsageError> {
        let (sources, destination) = self.sources_and_destination()?;

        let targets = TargetSet::new(self.instance_ids.iter().cloned());
        if targets.is_empty() {
            return Err(UsageError::NoInstances);
        }

        let has_bucket = config
            .s3
            .bucket
            .as_deref()
            .is_some_and(|b| !b.trim().is_empty());
        if !has_bucket {
            return Err(UsageError::NoBucket);
        }

        if destination.trim().is_empty() {
            return Err(UsageError::Invalid(
                "destination must not be empty".to_string(),
            ));
        }

        let artifacts = sources
            .iter()
            .map(|source| Artifact::new(source.as_str(), &config.s3.prefix))
            .collect();

        Ok(RunPlan {
            artifacts,
            targets,
            destination: destination.to_string(),
            dry_run: self.dry_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("ssm-copy").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_full_invocation() {
        let cli = parse(&[
            "-i",
            "i-1",
            "--instance-id",
            "i-2",
            "--s3bucket",
            "staging",
            "--s3prefix",
            "tmp",
            "--dryrun",
            "file1",
            "file2",
            "/tmp/out",
        ]);

        assert_eq!(cli.instance_ids, vec!["i-1", "i-2"]);
        assert_eq!(cli.s3_bucket.as_deref(), Some("staging"));
        assert_eq!(cli.s3_prefix.as_deref(), Some("tmp"));
        assert!(cli.dry_run);
        assert_eq!(cli.format, OutputFormat::Text);

        let (sources, destination) = cli.sources_and_destination().unwrap();
        assert_eq!(sources, &["file1".to_string(), "file2".to_string()]);
        assert_eq!(destination, "/tmp/out");
    }

    #[test]
    fn test_plan_builds_artifacts_with_default_prefix() {
        let cli = parse(&["-i", "i-1", "-i", "i-1", "--s3-bucket", "b", "dir/file1", "/tmp/out"]);
        let mut config = Config::default();
        cli.apply_to(&mut config);

        let plan = cli.plan(&config).unwrap();
        assert_eq!(plan.artifacts.len(), 1);
        assert_eq!(plan.artifacts[0].key, "ey/file1");
        assert_eq!(plan.targets.as_slice(), &["i-1"]);
        assert_eq!(plan.destination, "/tmp/out");
        assert!(!plan.dry_run);
    }

    #[test]
    fn test_too_few_positionals_is_usage_error() {
        let cli = parse(&["-i", "i-1", "--s3-bucket", "b", "only-one"]);
        let mut config = Config::default();
        cli.apply_to(&mut config);
        assert!(matches!(cli.plan(&config), Err(UsageError::MissingPaths)));

        let cli = parse(&["-i", "i-1"]);
        assert!(matches!(
            cli.sources_and_destination(),
            Err(UsageError::MissingPaths)
        ));
    }

    #[test]
    fn test_missing_instances_and_bucket() {
        let cli = parse(&["--s3-bucket", "b", "file1", "/tmp/out"]);
        let mut config = Config::default();
        cli.apply_to(&mut config);
        assert!(matches!(cli.plan(&config), Err(UsageError::NoInstances)));

        let cli = parse(&["-i", "i-1", "file1", "/tmp/out"]);
        assert!(matches!(cli.plan(&Config::default()), Err(UsageError::NoBucket)));
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let cli = parse(&[
            "--region",
            "eu-west-1",
            "--poll-interval",
            "1",
            "--max-poll-duration",
            "0",
            "--format",
            "json",
            "a",
            "b",
        ]);
        let mut config = Config::default();
        cli.apply_to(&mut config);

        assert_eq!(config.aws.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.poller.interval, Duration::from_secs(1));
        assert_eq!(config.poller.max_poll_duration, None);
        assert_eq!(config.s3.prefix, "ey");
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
