//! Reconciliation orchestrator
//!
//! Runs one reconciliation: open a session, list both containers, partition
//! the listings, compare the common objects and write the four artifacts.
//!
//! Only session and catalog failures abort a run, and they do so before any
//! artifact is created. Per-object query failures end up in the errors
//! stream. Every session opened for the run is closed before `reconcile`
//! returns, whatever the outcome.

use crate::differ::{ContentDiffer, WorkQueue};
use crate::partition::partition;
use crate::reporter::{ReportError, Reporter};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tablerecon_catalog::{
    CatalogListError, CatalogLister, Principal, SessionError, SessionProvider, WarehouseSession,
};
use tablerecon_core::{CatalogSnapshot, ComparisonKey, Config, ObjectDiff, RunSummary};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Errors that abort a reconciliation run
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Failed to open session: {0}")]
    Session(#[from] SessionError),

    #[error("Failed to list catalog of {container}")]
    CatalogList {
        container: String,
        #[source]
        source: CatalogListError,
    },

    #[error("Failed to write report: {0}")]
    Report(#[from] ReportError),

    #[error("Diff worker failed: {0}")]
    Worker(String),
}

/// Inputs of one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileRequest {
    /// Left container (source)
    pub left: String,

    /// Right container (target)
    pub right: String,

    /// Identity the sessions are opened for
    pub principal: Principal,
}

impl ReconcileRequest {
    pub fn new(left: impl Into<String>, right: impl Into<String>, principal: Principal) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            principal,
        }
    }
}

/// Reconciles two containers through a session provider
pub struct Reconciler {
    provider: Box<dyn SessionProvider>,
    config: Config,
}

impl Reconciler {
    pub fn new(provider: Box<dyn SessionProvider>, config: Config) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open a session, check it answers, and close it again
    pub async fn ping(&self, principal: &Principal) -> Result<(), ReconcileError> {
        let session = self.provider.connect(principal).await?;
        let result = session
            .ping()
            .await
            .map_err(|e| SessionError::Connection(format!("Ping failed: {}", e)));
        close_session(session.as_ref()).await;
        Ok(result?)
    }

    /// Run a full reconciliation
    ///
    /// Cancelling `cancel` stops new objects from being compared; objects not
    /// started are counted as skipped and the artifacts are still finalized.
    pub async fn reconcile(
        &self,
        request: &ReconcileRequest,
        cancel: CancellationToken,
    ) -> Result<RunSummary, ReconcileError> {
        tracing::info!(
            provider = self.provider.name(),
            left = %request.left,
            right = %request.right,
            principal = %request.principal,
            "Starting reconciliation"
        );

        let session: Arc<dyn WarehouseSession> = Arc::from(self.provider.connect(&request.principal).await?);

        let result = self.run(request, &session, cancel).await;
        close_session(session.as_ref()).await;

        match &result {
            Ok(summary) => tracing::info!(
                only_left = summary.only_left,
                only_right = summary.only_right,
                matched = summary.matched,
                mismatched = summary.mismatched,
                errored = summary.errored,
                skipped = summary.skipped,
                "Reconciliation finished"
            ),
            Err(err) => tracing::error!(error = %err, "Reconciliation aborted"),
        }

        result
    }

    async fn run(
        &self,
        request: &ReconcileRequest,
        session: &Arc<dyn WarehouseSession>,
        cancel: CancellationToken,
    ) -> Result<RunSummary, ReconcileError> {
        let left = self.list(&request.left, session.as_ref()).await?;
        let right = self.list(&request.right, session.as_ref()).await?;

        let partition = partition(&left, &right);

        let mut summary = RunSummary::new(&request.left, &request.right);
        summary.only_left = partition.only_left.len();
        summary.only_right = partition.only_right.len();
        summary.common = partition.common.len();

        let mut reporter = Reporter::create(&self.config.output, &request.left, &request.right)?;
        reporter.record_only_left(&partition.only_left);
        reporter.record_only_right(&partition.only_right);

        let compared = self
            .diff_common(request, &partition.common, session, &mut reporter, &mut summary, cancel)
            .await?;

        summary.skipped = summary.common - compared;
        summary.cancelled = summary.skipped > 0;
        if summary.cancelled {
            tracing::warn!(skipped = summary.skipped, "Run cancelled before every object was compared");
        }

        summary.finish();
        reporter.finish(&summary)?;

        Ok(summary)
    }

    async fn list(&self, container: &str, session: &dyn WarehouseSession) -> Result<CatalogSnapshot, ReconcileError> {
        CatalogLister::new(self.config.catalog.clone())
            .list(container, session)
            .await
            .map_err(|source| ReconcileError::CatalogList {
                container: container.to_string(),
                source,
            })
    }

    /// Compare the common objects on a pool of sessions
    ///
    /// Returns the number of objects compared.
    async fn diff_common(
        &self,
        request: &ReconcileRequest,
        common: &BTreeSet<ComparisonKey>,
        primary: &Arc<dyn WarehouseSession>,
        reporter: &mut Reporter,
        summary: &mut RunSummary,
        cancel: CancellationToken,
    ) -> Result<usize, ReconcileError> {
        let differ = ContentDiffer::new(&request.left, &request.right, self.config.diff.direction_policy);
        let run_token = cancel.child_token();

        let timer = self.config.diff.timeout_secs.map(|secs| {
            let token = run_token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                tracing::warn!(timeout_secs = secs, "Deadline reached, cancelling remaining comparisons");
                token.cancel();
            })
        });

        let workers = self.config.diff.concurrency.clamp(1, common.len().max(1));
        let sessions = self.open_worker_sessions(primary, workers, &request.principal).await;

        let queue = WorkQueue::new(common.iter().cloned());
        let (tx, mut rx) = mpsc::channel::<ObjectDiff>(sessions.len() * 2);

        let mut tasks = JoinSet::new();
        for (worker, session) in sessions.iter().enumerate() {
            let differ = differ.clone();
            let session = Arc::clone(session);
            let queue = queue.clone();
            let tx = tx.clone();
            let token = run_token.clone();
            tasks.spawn(async move { differ.run_worker(worker, session.as_ref(), queue, tx, token).await });
        }
        drop(tx);

        let total = common.len();
        let mut compared = 0;
        let mut failure = None;

        while let Some(diff) = rx.recv().await {
            if let Err(err) = reporter.record_diff(&diff) {
                failure = Some(ReconcileError::Report(err));
                break;
            }
            summary.record(&diff);
            compared += 1;

            tracing::info!(
                object = %diff.key,
                progress = compared,
                total,
                status = diff_status(&diff),
                "Compared object"
            );
        }

        if failure.is_some() {
            run_token.cancel();
            tasks.abort_all();
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                if err.is_panic() && failure.is_none() {
                    failure = Some(ReconcileError::Worker(err.to_string()));
                }
            }
        }

        if let Some(timer) = timer {
            timer.abort();
        }

        for session in sessions.iter().skip(1) {
            close_session(session.as_ref()).await;
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(compared),
        }
    }

    /// The primary session plus up to `workers - 1` extra sessions
    async fn open_worker_sessions(
        &self,
        primary: &Arc<dyn WarehouseSession>,
        workers: usize,
        principal: &Principal,
    ) -> Vec<Arc<dyn WarehouseSession>> {
        let mut sessions = vec![Arc::clone(primary)];

        while sessions.len() < workers {
            match self.provider.connect(principal).await {
                Ok(session) => sessions.push(Arc::from(session)),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        workers = sessions.len(),
                        "Could not open additional session, continuing with fewer workers"
                    );
                    break;
                }
            }
        }

        tracing::debug!(workers = sessions.len(), "Diff sessions ready");
        sessions
    }
}

fn diff_status(diff: &ObjectDiff) -> &'static str {
    match (diff.has_mismatches(), diff.has_errors()) {
        (false, false) => "matched",
        (true, false) => "mismatched",
        (false, true) => "errored",
        (true, true) => "mismatched+errored",
    }
}

async fn close_session(session: &dyn WarehouseSession) {
    if let Err(err) = session.close().await {
        tracing::warn!(error = %err, "Failed to close session");
    }
}
