//! Refresh cycle controller
//!
//! A cycle crawls and ranks the seed's neighborhood, publishes the ranking as
//! a list and then swaps in the new snapshot. Only one cycle runs at a time;
//! a trigger that arrives while a cycle is running returns immediately.

use crate::analysis::NetworkAnalyzer;
use crate::list::{ListReconciler, ReconcileReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use starterpack_common::bluesky::BlueskyApi;
use starterpack_common::config::AppConfig;
use starterpack_common::errors::Result;
use starterpack_common::metrics;
use starterpack_common::models::Snapshot;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Result of a trigger call
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    /// Snapshot replaced with this many ranked accounts
    Completed { ranked: usize },
    /// Another cycle was already running
    Skipped,
    /// The cycle failed; the previous snapshot is kept
    Failed { error: String },
}

/// What readers currently get
#[derive(Debug, Clone)]
pub enum SnapshotView {
    /// No authenticated session
    NotInitialized,
    /// Logged in, first cycle not finished yet
    Initializing,
    Ready(Arc<Snapshot>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleState {
    Running,
    Succeeded,
    Failed,
}

/// Bookkeeping of the most recent cycle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleStatus {
    pub cycle_id: Uuid,
    pub state: CycleState,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranked: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list: Option<ReconcileReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Clears the running flag when the cycle ends, however it ends
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct CycleController {
    api: Arc<dyn BlueskyApi>,
    analyzer: NetworkAnalyzer,
    reconciler: ListReconciler,
    seed: String,
    name: String,
    description: String,
    running: AtomicBool,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    last_cycle: RwLock<Option<CycleStatus>>,
}

impl CycleController {
    pub fn new(api: Arc<dyn BlueskyApi>, config: &AppConfig) -> Self {
        Self {
            analyzer: NetworkAnalyzer::new(api.clone(), config),
            reconciler: ListReconciler::new(api.clone(), config),
            api,
            seed: config.pack.seed_handle.clone(),
            name: config.pack.name.clone(),
            description: config.pack.description.clone(),
            running: AtomicBool::new(false),
            snapshot: RwLock::new(None),
            last_cycle: RwLock::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one refresh cycle unless one is already in progress
    pub async fn trigger(&self) -> TriggerOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Update already in progress, skipping");
            return TriggerOutcome::Skipped;
        }
        let _guard = RunningGuard(&self.running);

        self.run(Uuid::new_v4()).await
    }

    #[instrument(skip(self), fields(seed = %self.seed))]
    async fn run(&self, cycle_id: Uuid) -> TriggerOutcome {
        let started_at = Utc::now();
        let timer = Instant::now();
        *self.last_cycle.write().await = Some(CycleStatus {
            cycle_id,
            state: CycleState::Running,
            started_at,
            finished_at: None,
            ranked: None,
            list: None,
            error: None,
        });
        info!("Starting starter pack update");

        let result = self.refresh().await;
        let elapsed = timer.elapsed().as_secs_f64();

        let (status, outcome) = match result {
            Ok((ranked, report)) => {
                info!(
                    ranked = ranked,
                    duration_secs = elapsed,
                    "Starter pack updated successfully"
                );
                metrics::record_cycle(elapsed, "success", Some(ranked));
                (
                    CycleStatus {
                        cycle_id,
                        state: CycleState::Succeeded,
                        started_at,
                        finished_at: Some(Utc::now()),
                        ranked: Some(ranked),
                        list: Some(report),
                        error: None,
                    },
                    TriggerOutcome::Completed { ranked },
                )
            }
            Err(e) => {
                error!(error = %e, duration_secs = elapsed, "Error updating starter pack");
                metrics::record_cycle(elapsed, "failure", None);
                (
                    CycleStatus {
                        cycle_id,
                        state: CycleState::Failed,
                        started_at,
                        finished_at: Some(Utc::now()),
                        ranked: None,
                        list: None,
                        error: Some(e.to_string()),
                    },
                    TriggerOutcome::Failed {
                        error: e.to_string(),
                    },
                )
            }
        };

        *self.last_cycle.write().await = Some(status);
        outcome
    }

    /// Analyze, publish, then swap the snapshot
    async fn refresh(&self) -> Result<(usize, ReconcileReport)> {
        let users = self.analyzer.analyze(&self.seed).await?;
        let report = self.reconciler.reconcile(&users).await?;

        let ranked = users.len();
        let snapshot = Snapshot {
            name: self.name.clone(),
            description: self.description.clone(),
            last_updated: Utc::now(),
            users,
        };
        *self.snapshot.write().await = Some(Arc::new(snapshot));

        Ok((ranked, report))
    }

    /// Current snapshot, or why there is none
    pub async fn view(&self) -> SnapshotView {
        if self.api.session().await.is_none() {
            return SnapshotView::NotInitialized;
        }
        match self.snapshot.read().await.as_ref() {
            Some(snapshot) => SnapshotView::Ready(snapshot.clone()),
            None => SnapshotView::Initializing,
        }
    }

    pub async fn last_cycle(&self) -> Option<CycleStatus> {
        self.last_cycle.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_config, FakeBluesky};
    use tokio::sync::Notify;

    fn controller(api: Arc<FakeBluesky>) -> Arc<CycleController> {
        Arc::new(CycleController::new(api, &test_config()))
    }

    fn seeded() -> FakeBluesky {
        FakeBluesky::new()
            .with_follows("antfu.me", &["a.dev", "b.dev"])
            .with_account("a.dev", 100, 1.0)
            .with_account("b.dev", 10, 1.0)
    }

    #[tokio::test]
    async fn test_view_not_initialized_without_session() {
        let controller = controller(Arc::new(FakeBluesky::new().logged_out()));
        assert!(matches!(controller.view().await, SnapshotView::NotInitialized));
    }

    #[tokio::test]
    async fn test_view_initializing_before_first_cycle() {
        let controller = controller(Arc::new(seeded()));
        assert!(matches!(controller.view().await, SnapshotView::Initializing));
        assert!(controller.last_cycle().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_cycle_publishes_snapshot() {
        let controller = controller(Arc::new(seeded()));

        let outcome = controller.trigger().await;

        assert_eq!(outcome, TriggerOutcome::Completed { ranked: 2 });
        let SnapshotView::Ready(snapshot) = controller.view().await else {
            panic!("expected a snapshot");
        };
        assert_eq!(snapshot.users.len(), 2);
        assert_eq!(snapshot.users[0].handle(), "a.dev");

        let status = controller.last_cycle().await.unwrap();
        assert_eq!(status.state, CycleState::Succeeded);
        assert_eq!(status.list.unwrap().added, 2);
        assert!(!controller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycle_keeps_previous_snapshot() {
        let api = Arc::new(seeded());
        let controller = controller(api.clone());
        controller.trigger().await;
        let SnapshotView::Ready(before) = controller.view().await else {
            panic!("expected a snapshot");
        };

        api.fail_next("getLists", 10);
        let outcome = controller.trigger().await;

        assert!(matches!(outcome, TriggerOutcome::Failed { .. }));
        let SnapshotView::Ready(after) = controller.view().await else {
            panic!("expected a snapshot");
        };
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(controller.last_cycle().await.unwrap().state, CycleState::Failed);
        assert!(!controller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_first_cycle_stays_initializing() {
        let api = Arc::new(seeded().with_transient_failures("getLists", 10));
        let controller = controller(api);

        let outcome = controller.trigger().await;

        assert!(matches!(outcome, TriggerOutcome::Failed { .. }));
        assert!(matches!(controller.view().await, SnapshotView::Initializing));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_trigger_is_skipped() {
        let gate = Arc::new(Notify::new());
        let api = Arc::new(seeded().with_gate(gate.clone()));
        let controller = controller(api.clone());

        let first = tokio::spawn({
            let controller = controller.clone();
            async move { controller.trigger().await }
        });
        while !controller.is_running() {
            tokio::task::yield_now().await;
        }

        assert_eq!(controller.trigger().await, TriggerOutcome::Skipped);

        gate.notify_one();
        assert_eq!(first.await.unwrap(), TriggerOutcome::Completed { ranked: 2 });
        assert_eq!(api.calls("getFollows"), 1);
        assert!(!controller.is_running());
    }
}
