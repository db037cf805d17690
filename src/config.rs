use std::time::Duration;

use thiserror::Error;

use crate::action::Action;
use crate::args::BenchArgs;
use crate::retry::RetryPolicy;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid Command Options! Minimum required options are \"--table\" and \"--id\"")]
    MissingTarget,

    #[error("Invalid Command Options! {0} must be more than 0")]
    NotPositive(&'static str),
}

/// Resolved once before any worker starts and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    pub action: Action,
    pub table: String,
    pub id: String,
    /// Number of concurrent workers
    pub concurrency: u32,
    /// Sequential iterations run by each worker
    pub iterations: u32,
    pub retry: RetryPolicy,
    /// Floor for the decrementing strategies, ceiling for `write` (0 = none)
    pub condition: i64,
    /// Default log filter becomes `debug`; `RUST_LOG` still wins
    pub verbose: bool,
}

impl BenchmarkConfig {
    pub fn from_args(args: &BenchArgs) -> Result<Self, ConfigError> {
        if args.table.is_empty() || args.id.is_empty() {
            return Err(ConfigError::MissingTarget);
        }
        if args.connections == 0 {
            return Err(ConfigError::NotPositive("connections (-c)"));
        }
        if args.num_calls == 0 {
            return Err(ConfigError::NotPositive("num-calls (-n)"));
        }
        if args.retry_num == 0 {
            return Err(ConfigError::NotPositive("retry-num (-r)"));
        }

        Ok(Self {
            action: args.action,
            table: args.table.clone(),
            id: args.id.clone(),
            concurrency: args.connections,
            iterations: args.num_calls,
            retry: RetryPolicy::new(
                args.retry_num,
                Duration::from_millis(args.retry_backoff_ms),
            ),
            condition: args.condition,
            verbose: args.verbose(),
        })
    }

    /// Logical iterations the run will execute.
    pub fn total_iterations(&self) -> u64 {
        self.concurrency as u64 * self.iterations as u64
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::args::{Args, Command};

    fn bench_args(argv: &[&str]) -> BenchArgs {
        let mut full = vec!["contendkv", "bench"];
        full.extend_from_slice(argv);
        match Args::parse_from(full).command {
            Command::Bench(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn defaults_match_the_cli_contract() {
        let config = BenchmarkConfig::from_args(&bench_args(&["--table", "t", "--id", "x"])).unwrap();
        assert_eq!(config.action, Action::Read);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.iterations, 1);
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.retry.backoff, Duration::from_secs(2));
        assert_eq!(config.condition, 0);
        assert!(!config.verbose);
    }

    #[test]
    fn parses_flags() {
        let config = BenchmarkConfig::from_args(&bench_args(&[
            "-a",
            "write-condition-with-get",
            "--table",
            "t",
            "--id",
            "x",
            "-c",
            "10",
            "-n",
            "20",
            "-r",
            "3",
            "--condition",
            "5",
            "--verbose",
        ]))
        .unwrap();
        assert_eq!(config.action, Action::WriteConditionWithGet);
        assert_eq!(config.total_iterations(), 200);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.condition, 5);
        assert!(config.verbose);
    }

    #[test]
    fn rejects_empty_target_and_zero_counts() {
        assert_eq!(
            BenchmarkConfig::from_args(&bench_args(&["--table", "", "--id", "x"])).unwrap_err(),
            ConfigError::MissingTarget
        );
        assert_eq!(
            BenchmarkConfig::from_args(&bench_args(&["--table", "t", "--id", "x", "-c", "0"]))
                .unwrap_err(),
            ConfigError::NotPositive("connections (-c)")
        );
        assert_eq!(
            BenchmarkConfig::from_args(&bench_args(&["--table", "t", "--id", "x", "-n", "0"]))
                .unwrap_err(),
            ConfigError::NotPositive("num-calls (-n)")
        );
        assert_eq!(
            BenchmarkConfig::from_args(&bench_args(&["--table", "t", "--id", "x", "-r", "0"]))
                .unwrap_err(),
            ConfigError::NotPositive("retry-num (-r)")
        );
    }

    #[test]
    fn missing_required_flag_is_a_parse_error() {
        assert!(Args::try_parse_from(["contendkv", "bench", "--id", "x"]).is_err());
    }
}
