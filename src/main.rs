mod action;
mod args;
mod client;
mod config;
mod database;
mod expression;
mod helper;
mod memory;
mod metrics;
mod retry;
mod rocksdb;
mod runner;
mod surrealkv;
mod token;

use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::args::{Args, BenchArgs, Command, ItemArgs};
use crate::config::{BenchmarkConfig, ConfigError};
use crate::database::Database;
use crate::runner::BenchmarkRunner;

/// A validated subcommand, ready to run.
enum Job<'a> {
    Bench(&'a BenchArgs, BenchmarkConfig),
    Item(&'a ItemArgs),
}

impl Job<'_> {
    fn verbose(&self) -> bool {
        match self {
            Job::Bench(_, config) => config.verbose,
            Job::Item(item) => item.store.verbose,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let job = match &args.command {
        Command::Bench(bench) => match BenchmarkConfig::from_args(bench) {
            Ok(config) => Job::Bench(bench, config),
            Err(e) => return usage_error("bench", e),
        },
        Command::Item(item) => match helper::validate(item) {
            Ok(()) => Job::Item(item),
            Err(e) => return usage_error("item", e),
        },
    };
    init_tracing(job.verbose());

    let runtime = match configure_runtime(&args) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("[ERROR] failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match job {
        Job::Bench(bench, config) => runtime.block_on(run_bench(bench, config)),
        Job::Item(item) => runtime.block_on(run_item(item)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// `--verbose` only lowers the default level. Every debug line, store responses
/// and retry notices alike, is then gated by the filter alone.
fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn configure_runtime(args: &Args) -> std::io::Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder
        .worker_threads(args.worker_threads.unwrap_or_else(num_cpus::get).max(1))
        .enable_all();

    if let Some(stack_size) = args.thread_stack_size {
        builder.thread_stack_size(stack_size);
    }

    if let Some(max_threads) = args.max_blocking_threads {
        builder.max_blocking_threads(max_threads);
    }

    builder.build()
}

fn usage_error(subcommand: &str, err: ConfigError) -> ExitCode {
    eprintln!("[ERROR] {}", err);
    let mut command = Args::command();
    if let Some(sub) = command.find_subcommand_mut(subcommand) {
        eprintln!("{}", sub.render_help());
    }
    ExitCode::from(2)
}

async fn run_bench(args: &BenchArgs, config: BenchmarkConfig) -> Result<()> {
    let client = args.store.database.connect(args.store.endpoint_url.as_ref())?;

    match args.seed_age {
        Some(age) => helper::seed(&client, &config.table, &config.id, age).await?,
        None if args.store.database == Database::Memory => {
            warn!("the memory store starts empty; pass --seed-age to create the record")
        }
        None => {}
    }

    let summary = BenchmarkRunner::new(config, client).run().await?;
    println!("{}", summary);
    Ok(())
}

async fn run_item(args: &ItemArgs) -> Result<()> {
    let client = args.store.database.connect(args.store.endpoint_url.as_ref())?;
    helper::run(&client, args).await
}
