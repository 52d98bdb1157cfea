//! Multi-symbol orchestration.
//!
//! One runner per symbol keeps per-symbol ticks serialized while symbols
//! advance independently and in parallel.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;

use crate::{PipelineRunner, TickResult};

/// Owns one `PipelineRunner` per symbol.
#[derive(Default)]
pub struct PipelineFleet {
    runners: HashMap<String, PipelineRunner>,
}

impl PipelineFleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, runner: PipelineRunner) {
        self.runners.insert(runner.symbol().to_string(), runner);
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.runners.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }

    /// Run one tick for every symbol in parallel.
    ///
    /// Runners are moved into their tasks and handed back afterwards, so a
    /// symbol can never see tick `t+1` before its own tick `t` finished.
    pub async fn run_tick(
        &mut self,
        now: DateTime<Utc>,
    ) -> BTreeMap<String, anyhow::Result<TickResult>> {
        let mut join_set = JoinSet::new();
        for (symbol, mut runner) in self.runners.drain() {
            join_set.spawn(async move {
                let result = runner.run_once(now).await;
                (symbol, runner, result)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((symbol, runner, result)) => {
                    self.runners.insert(symbol.clone(), runner);
                    results.insert(symbol, result);
                }
                Err(e) => {
                    // The runner is lost with its task; surface the panic
                    tracing::error!(error = %e, "fleet tick task panicked");
                }
            }
        }
        results
    }
}
