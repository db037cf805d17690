use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

use crate::action::Action;
use crate::database::Database;

#[derive(Parser, Debug)]
#[command(term_width = 0)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Runtime worker threads (defaults to the number of CPUs)
    #[arg(long)]
    pub worker_threads: Option<usize>,

    /// Stack size for runtime threads in bytes
    #[arg(long)]
    pub thread_stack_size: Option<usize>,

    /// Upper bound on the blocking thread pool
    #[arg(long)]
    pub max_blocking_threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Hammer one record with concurrent workers and report the outcome
    Bench(BenchArgs),
    /// Provision the table and manage single records
    Item(ItemArgs),
}

/// Where the record lives.
#[derive(ClapArgs, Debug, Clone)]
pub struct StoreArgs {
    /// The store backend to run against
    #[arg(long, default_value = "memory")]
    pub database: Database,

    /// Location of the store; a data directory for the embedded backends
    #[arg(long)]
    pub endpoint_url: Option<PathBuf>,

    /// Log every store response and retry
    #[arg(long)]
    pub verbose: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct BenchArgs {
    /// The contention strategy to execute
    #[arg(short = 'a', long, default_value = "read")]
    pub action: Action,

    /// Table holding the record
    #[arg(long)]
    pub table: String,

    /// id of the record under test
    #[arg(long)]
    pub id: String,

    /// Floor for the decrementing actions, ceiling for `write` (0 = no condition)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub condition: i64,

    /// Number of parallel workers
    #[arg(short = 'c', long, default_value_t = 1)]
    pub connections: u32,

    /// Calls made by each worker
    #[arg(short = 'n', long, default_value_t = 1)]
    pub num_calls: u32,

    /// Attempts per call
    #[arg(short = 'r', long, default_value_t = 1)]
    pub retry_num: u32,

    /// Fixed delay between attempts in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub retry_backoff_ms: u64,

    /// Create the table if needed and write the record with this age before the run
    #[arg(long, allow_negative_numbers = true)]
    pub seed_age: Option<i64>,

    #[command(flatten)]
    pub store: StoreArgs,
}

impl BenchArgs {
    pub fn verbose(&self) -> bool {
        self.store.verbose
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ItemArgs {
    /// The helper action to execute
    #[arg(short = 'a', long, default_value = "create-table")]
    pub action: ItemAction,

    /// Table name
    #[arg(long)]
    pub table: String,

    /// id of the record (required for item actions)
    #[arg(long)]
    pub id: Option<String>,

    /// Initial age for create-item
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub age: i64,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    CreateTable,
    CreateItem,
    DeleteItem,
    GetItem,
}
