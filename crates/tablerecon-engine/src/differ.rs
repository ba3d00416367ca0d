//! Content differ
//!
//! Checks whether an object holds the same rows in both containers by
//! counting the rows of each side's `EXCEPT` against the other. A zero count
//! in both directions means the row sets are identical.
//!
//! Query failures never escape this module: each one becomes an
//! [`ComparisonOutcome::Errored`] for the object being compared, and the
//! caller moves on to the next object.

use std::collections::VecDeque;
use std::sync::Arc;
use tablerecon_catalog::{QueryError, WarehouseSession};
use tablerecon_core::{ComparisonKey, ComparisonOutcome, Direction, DirectionPolicy, ObjectDiff};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Build the row-count query for rows of `minuend` missing from `subtrahend`
pub fn except_count_query(minuend: &str, subtrahend: &str, key: &ComparisonKey) -> String {
    format!(
        "select count(*) as CNT from (select * from {} except select * from {})",
        key.qualify(minuend),
        key.qualify(subtrahend)
    )
}

/// Compares the contents of objects present in both containers
#[derive(Debug, Clone)]
pub struct ContentDiffer {
    left: String,
    right: String,
    policy: DirectionPolicy,
}

impl ContentDiffer {
    pub fn new(left: impl Into<String>, right: impl Into<String>, policy: DirectionPolicy) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            policy,
        }
    }

    pub fn policy(&self) -> DirectionPolicy {
        self.policy
    }

    /// Query text for one direction of one object
    pub fn query(&self, key: &ComparisonKey, direction: Direction) -> String {
        match direction {
            Direction::LeftMinusRight => except_count_query(&self.left, &self.right, key),
            Direction::RightMinusLeft => except_count_query(&self.right, &self.left, key),
        }
    }

    /// Compare one object in both directions
    pub async fn diff_object(&self, session: &dyn WarehouseSession, key: &ComparisonKey) -> ObjectDiff {
        let mut outcomes = Vec::new();

        for direction in Direction::BOTH {
            let query = self.query(key, direction);

            match count_rows(session, &query).await {
                Ok(0) => {}
                Ok(row_count) => {
                    tracing::debug!(object = %key, %direction, row_count, "Rows differ");
                    outcomes.push(ComparisonOutcome::Mismatched {
                        direction,
                        row_count,
                        query,
                    });
                }
                Err(err) => {
                    tracing::warn!(object = %key, %direction, error = %err, "Comparison query failed");
                    outcomes.push(ComparisonOutcome::Errored {
                        direction,
                        query,
                        error: err.to_string(),
                    });

                    if direction == Direction::LeftMinusRight
                        && self.policy == DirectionPolicy::SkipReverseOnError
                    {
                        break;
                    }
                }
            }
        }

        if outcomes.is_empty() {
            ObjectDiff::matched(key.clone())
        } else {
            ObjectDiff::new(key.clone(), outcomes)
        }
    }

    /// Compare every key in order on a single session
    ///
    /// Stops before the next object once `cancel` fires; objects never
    /// started are absent from the result.
    pub async fn diff<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a ComparisonKey>,
        session: &dyn WarehouseSession,
        cancel: &CancellationToken,
    ) -> Vec<ObjectDiff> {
        let mut diffs = Vec::new();

        for key in keys {
            if cancel.is_cancelled() {
                tracing::info!("Comparison cancelled");
                break;
            }
            diffs.push(self.diff_object(session, key).await);
        }

        diffs
    }

    /// Pull keys from `queue` until it drains, sending each result to `results`
    ///
    /// Returns the number of objects compared.
    pub async fn run_worker(
        &self,
        worker: usize,
        session: &dyn WarehouseSession,
        queue: WorkQueue,
        results: mpsc::Sender<ObjectDiff>,
        cancel: CancellationToken,
    ) -> usize {
        let mut compared = 0;

        loop {
            if cancel.is_cancelled() {
                tracing::debug!(worker, "Worker cancelled");
                break;
            }

            let Some(key) = queue.pop().await else {
                break;
            };

            let diff = self.diff_object(session, &key).await;
            compared += 1;

            if results.send(diff).await.is_err() {
                tracing::debug!(worker, "Result receiver closed");
                break;
            }
        }

        tracing::debug!(worker, compared, "Worker finished");
        compared
    }
}

async fn count_rows(session: &dyn WarehouseSession, query: &str) -> Result<u64, QueryError> {
    session.execute(query).await?.scalar_count()
}

/// Keys waiting to be compared, shared by all workers
#[derive(Debug, Clone, Default)]
pub struct WorkQueue {
    keys: Arc<Mutex<VecDeque<ComparisonKey>>>,
}

impl WorkQueue {
    pub fn new(keys: impl IntoIterator<Item = ComparisonKey>) -> Self {
        Self {
            keys: Arc::new(Mutex::new(keys.into_iter().collect())),
        }
    }

    pub async fn pop(&self) -> Option<ComparisonKey> {
        self.keys.lock().await.pop_front()
    }

    pub async fn len(&self) -> usize {
        self.keys.lock().await.len()
    }
}
