use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;
use tokio::task;
use tracing::{debug, error, info};

use crate::action::WorkerContext;
use crate::client::StoreClient;
use crate::config::BenchmarkConfig;
use crate::metrics::{Metrics, Summary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Draining,
    Reported,
}

/// Drives one benchmark run. Consumed by [`run`](Self::run), so it cannot be
/// started twice.
pub struct BenchmarkRunner<C> {
    config: Arc<BenchmarkConfig>,
    client: C,
    state: RunState,
}

impl<C: StoreClient + Clone> BenchmarkRunner<C> {
    pub fn new(config: BenchmarkConfig, client: C) -> Self {
        Self {
            config: Arc::new(config),
            client,
            state: RunState::Idle,
        }
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "benchmark state");
        self.state = next;
    }

    /// Runs every worker to completion and renders the summary.
    pub async fn run(mut self) -> Result<Summary> {
        let config = self.config.clone();
        let metrics = Arc::new(Metrics::default());
        let started_at = Utc::now();

        info!(
            "Starting {} with {} workers x {} calls ({} total) against {}/{}",
            config.action,
            config.concurrency,
            config.iterations,
            config.total_iterations(),
            config.table,
            config.id
        );
        self.transition(RunState::Running);

        let mut handles = Vec::with_capacity(config.concurrency as usize);
        for worker_id in 1..=config.concurrency {
            let ctx = WorkerContext {
                worker_id,
                run_started_unix: started_at.timestamp(),
                client: self.client.clone(),
                config: config.clone(),
                metrics: metrics.clone(),
            };

            let handle = task::spawn(async move {
                let action = ctx.config.action;
                for iteration in 1..=ctx.config.iterations {
                    action.run_iteration(&ctx, iteration).await;
                }
                debug!(worker_id = ctx.worker_id, "worker finished");
            });
            handles.push(handle);
        }

        self.transition(RunState::Draining);
        // join every worker before looking at the results
        let mut panicked = 0;
        for handle in handles {
            if let Err(e) = handle.await {
                error!("worker task failed: {}", e);
                panicked += 1;
            }
        }
        if panicked > 0 {
            bail!("{} of {} workers did not complete", panicked, config.concurrency);
        }

        let summary = Summary {
            action: config.action,
            counts: metrics.snapshot(),
            started_at,
            finished_at: Utc::now(),
        };
        self.transition(RunState::Reported);
        Ok(summary)
    }
}
