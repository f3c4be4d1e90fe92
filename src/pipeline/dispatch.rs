//! Fan figure descriptions out to concurrent tasks and collect them in order.
//!
//! One tokio task is spawned per description into a [`JoinSet`]. Each task
//! reports its own index, so slot `i` of the result is always the task built
//! from `descriptions[i]`, whatever order the tasks finish in. A task that
//! panics only loses its own slot. Dropping the `dispatch` future drops the
//! set, which aborts every figure still in flight.

use crate::output::TaskResult;
use crate::pipeline::retry::FigureWorker;
use crate::pipeline::task::FigureTask;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Runs a [`FigureWorker`] over a list of descriptions.
pub struct Dispatcher {
    worker: Arc<FigureWorker>,
    max_parallel: Option<usize>,
}

impl Dispatcher {
    /// Unbounded dispatcher: every description gets its own task at once.
    pub fn new(worker: FigureWorker) -> Self {
        Self {
            worker: Arc::new(worker),
            max_parallel: None,
        }
    }

    /// Cap the number of figures in flight. `None` removes the cap.
    pub fn with_max_parallel(mut self, max_parallel: Option<usize>) -> Self {
        self.max_parallel = max_parallel.map(|n| n.max(1));
        self
    }

    /// Generate every figure and return one result per description, in
    /// description order.
    ///
    /// Cancel-safe: if the returned future is dropped before it resolves,
    /// the spawned figure tasks are aborted with it.
    pub async fn dispatch(&self, descriptions: &[String]) -> Vec<TaskResult> {
        if descriptions.is_empty() {
            return Vec::new();
        }
        info!(
            "Dispatching {} figure(s), {} attempt(s) each ({})",
            descriptions.len(),
            self.worker.max_attempts(),
            match self.max_parallel {
                Some(n) => format!("at most {n} at a time"),
                None => "all at once".to_string(),
            }
        );

        let limiter = self.max_parallel.map(|n| Arc::new(Semaphore::new(n)));
        let mut set = JoinSet::new();

        for (index, description) in descriptions.iter().enumerate() {
            let worker = Arc::clone(&self.worker);
            let limiter = limiter.clone();
            let task = FigureTask::new(index, description.clone());
            set.spawn(async move {
                let _permit = match limiter {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };
                let outcome = AssertUnwindSafe(worker.run(task)).catch_unwind().await;
                (index, outcome.map_err(panic_detail))
            });
        }

        // Barrier: nothing is read until every task has finished.
        let mut slots: Vec<Option<TaskResult>> = descriptions.iter().map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, Ok(result))) => {
                    debug_assert_eq!(result.index, index);
                    slots[index] = Some(result);
                }
                Ok((index, Err(detail))) => {
                    slots[index] =
                        Some(self.worker.aborted(index, descriptions[index].clone(), detail));
                }
                Err(e) => debug!("Figure task did not return: {}", e),
            }
        }

        slots
            .into_iter()
            .zip(descriptions)
            .enumerate()
            .map(|(index, (slot, description))| {
                slot.unwrap_or_else(|| {
                    self.worker
                        .aborted(index, description.clone(), "task was cancelled".to_string())
                })
            })
            .inspect(|result| {
                debug!(
                    "Slot {}: {}",
                    result.index + 1,
                    result.artifact_ref.as_deref().unwrap_or("<omitted>")
                )
            })
            .collect()
    }
}

fn panic_detail(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "task panicked".to_string()
    }
}
