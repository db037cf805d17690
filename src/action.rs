use std::fmt::{Display, Formatter};
use std::sync::Arc;

use chrono::Utc;
use clap::ValueEnum;
use tracing::{debug, warn};

use crate::client::{StoreClient, StoreError};
use crate::config::BenchmarkConfig;
use crate::expression::{Condition, Record, TransactItem, Update};
use crate::metrics::Metrics;
use crate::retry::RetryError;
use crate::token::ClientRequestToken;

/// The contention strategy every worker of a run executes.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Point read of the record
    #[value(name = "read")]
    Read,
    /// Unconditional `age + 1`
    #[value(name = "write")]
    Write,
    /// `age - 1, version + 1` guarded by the floor
    #[value(name = "write-condition")]
    WriteCondition,
    /// Read the version, then decrement guarded by version and floor
    #[value(name = "write-condition-with-get")]
    WriteConditionWithGet,
    /// Idempotent single-item transaction guarded by `age > 0`
    #[value(name = "write-transaction")]
    WriteTransaction,
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => write!(f, "{:?}", self),
        }
    }
}

/// Everything one worker needs to run its iterations.
pub struct WorkerContext<C> {
    pub worker_id: u32,
    pub run_started_unix: i64,
    pub client: C,
    pub config: Arc<BenchmarkConfig>,
    pub metrics: Arc<Metrics>,
}

impl Action {
    /// Executes one logical iteration and reports its outcome to the metrics.
    /// Failures are counted, never propagated.
    pub async fn run_iteration<C: StoreClient>(&self, ctx: &WorkerContext<C>, iteration: u32) {
        match self {
            Action::Read => read(ctx).await,
            Action::Write => write(ctx).await,
            Action::WriteCondition => write_condition(ctx).await,
            Action::WriteConditionWithGet => write_condition_with_get(ctx).await,
            Action::WriteTransaction => write_transaction(ctx, iteration).await,
        }
    }
}

/// Lowest `age` a decrement may leave behind is the floor, so a record sitting
/// at the floor is rejected.
fn floor_condition(floor: i64) -> Condition {
    Condition::AgeAbove(floor)
}

fn report_failure(worker_id: u32, err: &RetryError<StoreError>) {
    if err.last.is_condition_failed() {
        debug!(worker_id, "condition check failed: {}", err);
    } else {
        warn!(worker_id, "Error: {}", err);
    }
}

fn log_response<C>(ctx: &WorkerContext<C>, op: &str, record: &Record) {
    debug!(
        worker_id = ctx.worker_id,
        "{} Response: id {} age {} version {}", op, record.id, record.age, record.version
    );
}

async fn read<C: StoreClient>(ctx: &WorkerContext<C>) {
    let config = &ctx.config;
    let result = config
        .retry
        .run(|| ctx.client.read(&config.table, &config.id))
        .await;

    match result {
        Ok(record) => {
            log_response(ctx, "GetItem", &record);
            ctx.metrics.record_read_success();
        }
        Err(e) => {
            report_failure(ctx.worker_id, &e);
            ctx.metrics.record_read_error();
        }
    }
}

async fn conditional_write<C: StoreClient>(
    ctx: &WorkerContext<C>,
    update: Update,
    condition: Option<Condition>,
) {
    let config = &ctx.config;
    let result = config
        .retry
        .run(|| {
            ctx.client
                .conditional_update(&config.table, &config.id, &update, condition.as_ref())
        })
        .await;
    finish_write(ctx, result);
}

fn finish_write<C>(ctx: &WorkerContext<C>, result: Result<Record, RetryError<StoreError>>) {
    match result {
        Ok(record) => {
            log_response(ctx, "UpdateItem", &record);
            ctx.metrics.record_write_success(Utc::now());
        }
        Err(e) => {
            report_failure(ctx.worker_id, &e);
            ctx.metrics.record_write_error();
        }
    }
}

async fn write<C: StoreClient>(ctx: &WorkerContext<C>) {
    // a non-zero condition caps the counter
    let ceiling =
        (ctx.config.condition > 0).then(|| Condition::AgeAtMost(ctx.config.condition - 1));
    conditional_write(ctx, Update::increment_age(), ceiling).await;
}

async fn write_condition<C: StoreClient>(ctx: &WorkerContext<C>) {
    conditional_write(
        ctx,
        Update::decrement_with_version(),
        Some(floor_condition(ctx.config.condition)),
    )
    .await;
}

async fn write_condition_with_get<C: StoreClient>(ctx: &WorkerContext<C>) {
    let config = &ctx.config;
    let observed = match config
        .retry
        .run(|| ctx.client.read(&config.table, &config.id))
        .await
    {
        Ok(record) => {
            ctx.metrics.record_read_success();
            record
        }
        Err(e) => {
            report_failure(ctx.worker_id, &e);
            ctx.metrics.record_read_error();
            return;
        }
    };

    let update = Update::decrement_with_version();
    let condition = Condition::All(vec![
        Condition::VersionEquals(observed.version),
        floor_condition(config.condition),
    ]);

    // A version mismatch means another worker won the race; retrying against
    // the same observed version can only fail again.
    let result = config
        .retry
        .run_while(
            || {
                ctx.client
                    .conditional_update(&config.table, &config.id, &update, Some(&condition))
            },
            |e: &StoreError| !e.is_condition_failed(),
        )
        .await;
    finish_write(ctx, result);
}

async fn write_transaction<C: StoreClient>(ctx: &WorkerContext<C>, iteration: u32) {
    let config = &ctx.config;
    // one token per iteration, shared by all of its retries
    let token = ClientRequestToken::generate(ctx.run_started_unix, ctx.worker_id, iteration);
    let items = [TransactItem {
        table: config.table.clone(),
        id: config.id.clone(),
        update: Update::decrement_with_version(),
        condition: Some(Condition::AgeAbove(0)),
    }];

    let result = config
        .retry
        .run(|| ctx.client.transactional_update(&items, &token))
        .await;

    match result {
        Ok(()) => {
            debug!(worker_id = ctx.worker_id, %token, "TransactWriteItems committed");
            ctx.metrics.record_write_success(Utc::now());
        }
        Err(e) => {
            report_failure(ctx.worker_id, &e);
            ctx.metrics.record_write_error();
        }
    }
}
