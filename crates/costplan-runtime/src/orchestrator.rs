//! RunOrchestrator: one optimization run from discovery to finalization.

use thiserror::Error as ThisError;
use tracing::{debug, error, info, warn};

use costplan_core::{Error, Result, RunStatus};
use costplan_remote::{ClusterApi, RemoteClient, RemoteError};
use costplan_store::ResultStore;

use crate::comparator::{compare, ComparisonError, GroupComparison};
use crate::types::{RunOptions, RunSummary};

/// Why a single group could not be processed. Everything but `Store` is
/// recorded against the group and the run moves on.
#[derive(ThisError, Debug)]
enum GroupError {
    #[error("{0}")]
    Remote(#[from] RemoteError),

    #[error("group is not active (status={0})")]
    Inactive(String),

    #[error("{0}")]
    Comparison(#[from] ComparisonError),

    #[error(transparent)]
    Store(Error),
}

/// Drives a run: discovery, per-group fetch/compare/record, finalization.
pub struct RunOrchestrator<A> {
    client: RemoteClient<A>,
    store: ResultStore,
}

impl<A: ClusterApi> RunOrchestrator<A> {
    pub fn new(client: RemoteClient<A>, store: ResultStore) -> Self {
        Self { client, store }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn client(&self) -> &RemoteClient<A> {
        &self.client
    }

    /// Execute one run. Group failures are recorded and never abort the run;
    /// discovery and persistence failures mark the run failed and are
    /// returned.
    pub async fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        if let Some(age) = options.stale_after {
            self.store.fail_stale_runs(age)?;
        }

        let run_id = self.store.begin_run(0, options.ticket.as_deref())?;

        let group_ids = match self
            .client
            .list_cluster_groups(options.limit, &options.exclude)
            .await
        {
            Ok(ids) => ids,
            Err(err) => {
                error!("Group discovery failed: {}", err);
                self.abort(run_id, &format!("discovery failed: {}", err));
                return Err(err.into());
            }
        };

        let total = group_ids.len();
        if let Err(err) = self.store.set_run_total(run_id, total) {
            self.abort(run_id, &err.to_string());
            return Err(err);
        }
        info!("Run {} processing {} group(s)", run_id, total);

        let mut summary = RunSummary::started(run_id, total);

        for (idx, group_id) in group_ids.iter().enumerate() {
            info!("[{}/{}] {}", idx + 1, total, group_id);

            let recorded = match self.process_group(group_id).await {
                Ok(cmp) => self
                    .store
                    .record_group_success(run_id, &cmp.result, &cmp.metrics)
                    .map(|_| {
                        info!(
                            "{}: savings ${:.2}/month ({:.1}%)",
                            group_id, cmp.metrics.total_savings, cmp.metrics.savings_percent
                        );
                        summary.processed += 1;
                        summary.total_savings += cmp.metrics.total_savings;
                    }),
                Err(GroupError::Store(err)) => Err(err),
                Err(err) => {
                    error!("{} failed: {}", group_id, err);
                    self.store
                        .record_group_failure(run_id, group_id, &err.to_string())
                        .map(|_| summary.failed += 1)
                }
            };

            if let Err(err) = recorded {
                error!("Persistence failed on {}: {}", group_id, err);
                self.abort(run_id, &format!("persistence failed: {}", err));
                return Err(err);
            }
        }

        if let Err(err) = self.store.finalize_run(run_id, RunStatus::Completed, None) {
            self.abort(run_id, &err.to_string());
            return Err(err);
        }
        summary.status = RunStatus::Completed;

        info!(
            "Run {} completed: {} processed, {} failed, total savings ${:.2}/month",
            run_id, summary.processed, summary.failed, summary.total_savings
        );
        Ok(summary)
    }

    async fn process_group(&self, group_id: &str) -> std::result::Result<GroupComparison, GroupError> {
        let status = self.client.group_status(group_id).await?;
        if status != costplan_remote::ACTIVE_STATUS {
            return Err(GroupError::Inactive(status));
        }

        let fetched = self.client.fetch_current(group_id).await?;
        if let Some(meta) = &fetched.metadata {
            self.store.upsert_metadata(meta).map_err(GroupError::Store)?;
            debug!("Saved metadata for {}", group_id);
        }
        let current = fetched.group()?;

        let optimal = self.client.fetch_optimal(group_id).await?;
        Ok(compare(&current, &optimal)?)
    }

    /// Best-effort transition to `failed`.
    fn abort(&self, run_id: i64, note: &str) {
        if let Err(err) = self.store.finalize_run(run_id, RunStatus::Failed, Some(note)) {
            warn!("Could not mark run {} failed: {}", run_id, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RunOptions;
    use async_trait::async_trait;
    use costplan_remote::dto::{Blueprint, MemberBlueprint, MonthlyCost, NodeSpec};
    use costplan_remote::{BlueprintDocument, GroupListing, RateLimiter, RetryPolicy};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Serves three identical groups. When the optimal plan of `interrupt`
    /// is requested, a second connection finalizes the active run, so the
    /// orchestrator can no longer record results against it.
    struct InterruptingApi {
        db_path: PathBuf,
        interrupt: &'static str,
        current_calls: AtomicU32,
    }

    fn plan(instance: f64) -> BlueprintDocument {
        BlueprintDocument {
            blueprints: vec![MemberBlueprint {
                cluster_uid: "c1".into(),
                blueprint: Blueprint {
                    usd_per_month: Some(MonthlyCost {
                        cluster: Some(instance),
                        storage: Some(10.0),
                    }),
                    nodes: vec![NodeSpec {
                        instance_type: "m5.large".into(),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            }],
        }
    }

    #[async_trait]
    impl ClusterApi for InterruptingApi {
        async fn list_groups(&self) -> std::result::Result<Vec<GroupListing>, RemoteError> {
            Ok(["g1", "g2", "g3"].into_iter().map(GroupListing::new).collect())
        }

        async fn group_status(&self, _group_id: &str) -> std::result::Result<String, RemoteError> {
            Ok("done".into())
        }

        async fn current_blueprint(
            &self,
            _group_id: &str,
        ) -> std::result::Result<BlueprintDocument, RemoteError> {
            self.current_calls.fetch_add(1, Ordering::SeqCst);
            Ok(plan(100.0))
        }

        async fn optimal_plan(
            &self,
            group_id: &str,
        ) -> std::result::Result<BlueprintDocument, RemoteError> {
            if group_id == self.interrupt {
                let other = ResultStore::open(&self.db_path).unwrap();
                let run = other.latest_run(Some(RunStatus::InProgress)).unwrap().unwrap();
                other
                    .finalize_run(run.run_id, RunStatus::Failed, Some("closed elsewhere"))
                    .unwrap();
            }
            Ok(plan(80.0))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failure_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("costplan.db");
        let store = ResultStore::open(&db_path).unwrap();
        let api = InterruptingApi {
            db_path,
            interrupt: "g2",
            current_calls: AtomicU32::new(0),
        };
        let client = RemoteClient::new(
            api,
            RateLimiter::new(10.0).unwrap(),
            RetryPolicy::new(3, Duration::from_secs(5)),
        );
        let orch = RunOrchestrator::new(client, store);

        let err = orch.run(&RunOptions::default()).await.unwrap_err();
        assert!(err.to_string().contains("not accepting results"));
        // Nothing after the failing group is fetched.
        assert_eq!(orch.client().api().current_calls.load(Ordering::SeqCst), 2);

        let run = orch.store().latest_run(None).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.processed_count, 1);
        assert!(run.completed_at.is_some());
        assert!(run.notes.as_deref().unwrap().starts_with("persistence failed:"));

        let reports = orch.store().results_for_run(run.run_id).unwrap();
        let ids: Vec<_> = reports.iter().map(|r| r.group_id.as_str()).collect();
        assert_eq!(ids, vec!["g1"]);
    }
}
