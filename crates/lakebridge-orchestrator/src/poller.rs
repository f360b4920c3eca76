//! Reconciliation poller: wait for the catalog to catch up with the
//! declared table set.
//!
//! The replicator creates catalog tables on its own schedule, so the only
//! way to know a connection is live is to poll. Each tick fetches the
//! observed set and computes `outstanding = declared - observed`. An empty
//! outstanding set is the sole termination condition; there is no attempt
//! cap and no backoff.
//!
//! [`ReconciliationState`] is the pure state machine. [`ReconciliationHandle`]
//! drives it from a spawned task, one fetch at a time, and is cancelled by
//! setting its interval to zero.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use lakebridge_core::naming::changelog_table_name;
use lakebridge_core::{CatalogConnection, SourceTable};
use lakebridge_platform::{CatalogClient, PlatformResult};

/// Where a reconciliation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    /// Outstanding set non-empty, interval non-zero.
    Polling,
    /// Everything declared has been observed.
    Converged,
    /// Interval set to zero before convergence.
    Cancelled,
}

/// Result of applying one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Converged,
    Pending { outstanding: usize },
    /// Polling is not active; the observation was discarded.
    Ignored,
}

/// Declared vs. observed bookkeeping for one reconciliation target.
#[derive(Debug, Clone)]
pub struct ReconciliationState {
    poll_interval: Duration,
    declared: BTreeSet<String>,
    outstanding: BTreeSet<String>,
    untracked: BTreeSet<String>,
    ticks: u64,
}

impl ReconciliationState {
    /// An empty declared set is converged from the start.
    pub fn new(declared: BTreeSet<String>, poll_interval: Duration) -> Self {
        let poll_interval = if declared.is_empty() {
            Duration::ZERO
        } else {
            poll_interval
        };
        Self {
            poll_interval,
            outstanding: declared.clone(),
            declared,
            untracked: BTreeSet::new(),
            ticks: 0,
        }
    }

    /// Declare source tables; they are compared by changelog name.
    pub fn for_source_tables<'a>(
        tables: impl IntoIterator<Item = &'a SourceTable>,
        poll_interval: Duration,
    ) -> Self {
        Self::new(
            tables.into_iter().map(changelog_table_name).collect(),
            poll_interval,
        )
    }

    pub fn phase(&self) -> PollPhase {
        if self.outstanding.is_empty() {
            PollPhase::Converged
        } else if self.poll_interval.is_zero() {
            PollPhase::Cancelled
        } else {
            PollPhase::Polling
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn declared(&self) -> &BTreeSet<String> {
        &self.declared
    }

    pub fn outstanding(&self) -> &BTreeSet<String> {
        &self.outstanding
    }

    /// Observed names that were never declared. They never block convergence.
    pub fn untracked(&self) -> &BTreeSet<String> {
        &self.untracked
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Change the interval. Zero cancels; a non-zero value re-arms a
    /// cancelled reconciliation. Ignored once converged.
    pub fn set_interval(&mut self, interval: Duration) {
        if self.phase() != PollPhase::Converged {
            self.poll_interval = interval;
        }
    }

    pub fn cancel(&mut self) {
        self.set_interval(Duration::ZERO);
    }

    /// Apply one observed snapshot.
    pub fn observe(&mut self, observed: &BTreeSet<String>) -> TickOutcome {
        if self.phase() != PollPhase::Polling {
            return TickOutcome::Ignored;
        }
        self.ticks += 1;
        self.outstanding = self.declared.difference(observed).cloned().collect();
        self.untracked = observed.difference(&self.declared).cloned().collect();

        if self.outstanding.is_empty() {
            self.poll_interval = Duration::ZERO;
            TickOutcome::Converged
        } else {
            TickOutcome::Pending {
                outstanding: self.outstanding.len(),
            }
        }
    }

    /// Count a tick whose fetch failed. State is otherwise unchanged.
    pub fn record_failure(&mut self) {
        if self.phase() == PollPhase::Polling {
            self.ticks += 1;
        }
    }
}

/// What to list on each tick.
#[derive(Debug, Clone)]
pub enum ReconciliationTarget {
    /// Tables inside one catalog namespace.
    NamespaceTables {
        connection: CatalogConnection,
        namespace: String,
    },
    /// Namespaces inside the warehouse.
    Namespaces { connection: CatalogConnection },
}

impl ReconciliationTarget {
    async fn fetch(&self, catalog: &dyn CatalogClient) -> PlatformResult<BTreeSet<String>> {
        let names = match self {
            ReconciliationTarget::NamespaceTables {
                connection,
                namespace,
            } => catalog.list_tables(connection, namespace).await?,
            ReconciliationTarget::Namespaces { connection } => {
                catalog.list_namespaces(connection).await?
            }
        };
        Ok(names.into_iter().collect())
    }

    fn describe(&self) -> &str {
        match self {
            ReconciliationTarget::NamespaceTables { namespace, .. } => namespace,
            ReconciliationTarget::Namespaces { connection } => &connection.warehouse,
        }
    }
}

/// Snapshot published after every tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationStatus {
    pub phase: PollPhase,
    pub ticks: u64,
    pub outstanding: BTreeSet<String>,
    pub untracked: BTreeSet<String>,
    /// Error of the most recent fetch, cleared by the next successful one.
    pub last_error: Option<String>,
}

impl ReconciliationStatus {
    fn snapshot(state: &ReconciliationState, last_error: &Option<String>) -> Self {
        Self {
            phase: state.phase(),
            ticks: state.ticks(),
            outstanding: state.outstanding().clone(),
            untracked: state.untracked().clone(),
            last_error: last_error.clone(),
        }
    }
}

/// Caller-owned handle to a running reconciliation. Dropping it stops the
/// background task.
#[derive(Debug)]
pub struct ReconciliationHandle {
    interval_tx: watch::Sender<Duration>,
    status_rx: watch::Receiver<ReconciliationStatus>,
    task: JoinHandle<()>,
}

impl ReconciliationHandle {
    /// Start polling `target`. The first fetch happens immediately.
    pub fn spawn(
        catalog: Arc<dyn CatalogClient>,
        target: ReconciliationTarget,
        state: ReconciliationState,
    ) -> Self {
        let (interval_tx, interval_rx) = watch::channel(state.poll_interval());
        let (status_tx, status_rx) =
            watch::channel(ReconciliationStatus::snapshot(&state, &None));

        info!(
            target = %target.describe(),
            declared = state.declared().len(),
            interval_ms = state.poll_interval().as_millis() as u64,
            "reconciliation started"
        );

        let task = tokio::spawn(async move {
            run_reconciliation(catalog, target, state, interval_rx, status_tx).await;
        });

        Self {
            interval_tx,
            status_rx,
            task,
        }
    }

    pub fn status(&self) -> ReconciliationStatus {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReconciliationStatus> {
        self.status_rx.clone()
    }

    /// Change the poll interval. Zero cancels.
    pub fn set_interval(&self, interval: Duration) {
        let _ = self.interval_tx.send(interval);
    }

    pub fn cancel(&self) {
        self.set_interval(Duration::ZERO);
    }

    /// Wait until the reconciliation converges or is cancelled.
    pub async fn wait(&self) -> ReconciliationStatus {
        let mut rx = self.status_rx.clone();
        loop {
            let status = rx.borrow_and_update().clone();
            if status.phase != PollPhase::Polling {
                return status;
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    }
}

impl Drop for ReconciliationHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The poll loop. One fetch in flight at a time.
async fn run_reconciliation(
    catalog: Arc<dyn CatalogClient>,
    target: ReconciliationTarget,
    mut state: ReconciliationState,
    mut interval_rx: watch::Receiver<Duration>,
    status_tx: watch::Sender<ReconciliationStatus>,
) {
    let mut last_error: Option<String> = None;
    let mut delay = Duration::ZERO;

    loop {
        match state.phase() {
            PollPhase::Converged => {
                info!(target = %target.describe(), ticks = state.ticks(), "reconciliation converged");
                status_tx.send_replace(ReconciliationStatus::snapshot(&state, &last_error));
                break;
            }
            PollPhase::Cancelled => {
                debug!(target = %target.describe(), "reconciliation idle");
                status_tx.send_replace(ReconciliationStatus::snapshot(&state, &last_error));
                if interval_rx.changed().await.is_err() {
                    break;
                }
                let interval = *interval_rx.borrow_and_update();
                state.set_interval(interval);
                delay = interval;
                continue;
            }
            PollPhase::Polling => {}
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                let fetched = target.fetch(catalog.as_ref()).await;

                let interval = *interval_rx.borrow_and_update();
                if interval.is_zero() {
                    debug!(target = %target.describe(), "cancelled during fetch, result discarded");
                    state.cancel();
                    continue;
                }
                state.set_interval(interval);

                match fetched {
                    Ok(observed) => {
                        last_error = None;
                        let outcome = state.observe(&observed);
                        debug!(
                            target = %target.describe(),
                            tick = state.ticks(),
                            ?outcome,
                            untracked = state.untracked().len(),
                            "reconciliation tick"
                        );
                    }
                    Err(e) => {
                        warn!(target = %target.describe(), error = %e, "reconciliation fetch failed, will retry");
                        state.record_failure();
                        last_error = Some(e.to_string());
                    }
                }
                status_tx.send_replace(ReconciliationStatus::snapshot(&state, &last_error));
                delay = state.poll_interval();
            }
            changed = interval_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let interval = *interval_rx.borrow_and_update();
                state.set_interval(interval);
                delay = interval;
            }
        }
    }
}
