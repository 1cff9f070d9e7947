//! Pipeline sync loop
//!
//! Every interval, fetches the pipelines of every active application,
//! reconciles them against the stored mirror and commits the difference.
//! A pass never stops the loop: failures are logged and the next pass fires
//! after the same interval.

use anyhow::{Context, Result};
use futures::future::join_all;
use pipehub_client::ClientManager;
use pipehub_core::domain::application::Application;
use pipehub_core::dto::pipeline::FetchedPipeline;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::repository::{ApplicationStore, PipelineStore, RepositoryError};
use crate::sync::reconciler::{ReconcilePlan, prune_by_pattern, reconcile};

/// Rows inserted per statement when committing a pass
pub const COMMIT_BATCH_SIZE: usize = 100;

/// Outcome of one sync pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    /// Active applications considered
    pub applications: usize,
    /// Applications skipped because their fetch failed or timed out
    pub failed_applications: usize,
    pub created: u64,
    pub deleted: u64,
    /// Insert batches rejected by the uniqueness constraint
    pub conflicts: usize,
}

/// Pipelines reported by one application, with its name filter
struct ApplicationFetch {
    pipelines: Vec<FetchedPipeline>,
    pattern: Option<Regex>,
}

/// Background synchronizer between providers and the pipeline mirror
pub struct SyncScheduler {
    applications: Arc<dyn ApplicationStore>,
    pipelines: Arc<dyn PipelineStore>,
    clients: Arc<ClientManager>,
    interval: Duration,
    fetch_timeout: Duration,
}

impl SyncScheduler {
    pub fn new(
        applications: Arc<dyn ApplicationStore>,
        pipelines: Arc<dyn PipelineStore>,
        clients: Arc<ClientManager>,
        interval: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            applications,
            pipelines,
            clients,
            interval,
            fetch_timeout,
        }
    }

    /// Runs passes until `shutdown` is cancelled.
    ///
    /// Cancellation drops the pass in flight, abandoning its provider calls.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Starting pipeline sync (interval: {:?})", self.interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.run_once() => match result {
                    Ok(summary) => info!(
                        "Pipeline sync pass finished: {} application(s), {} failed, {} created, {} deleted, {} conflict(s)",
                        summary.applications,
                        summary.failed_applications,
                        summary.created,
                        summary.deleted,
                        summary.conflicts
                    ),
                    Err(e) => error!("Pipeline sync pass failed: {:#}", e),
                },
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Pipeline sync stopped");
    }

    /// Performs a single sync pass
    pub async fn run_once(&self) -> Result<SyncSummary> {
        let applications = self
            .applications
            .list_active()
            .await
            .context("Failed to load active applications")?;

        let mut summary = SyncSummary {
            applications: applications.len(),
            ..Default::default()
        };

        if applications.is_empty() {
            debug!("No active applications to sync");
            return Ok(summary);
        }

        let results = join_all(applications.iter().map(|app| self.fetch_application(app))).await;

        let mut fetched = Vec::new();
        let mut patterns = HashMap::new();
        let mut synced = Vec::new();
        // Filters of applications that failed to answer, applied to stored rows only
        let mut prune_patterns = HashMap::new();

        for (app, result) in applications.iter().zip(results) {
            match result {
                Ok(fetch) => {
                    debug!(
                        "Application {} ({}) reported {} pipeline(s)",
                        app.name,
                        app.id,
                        fetch.pipelines.len()
                    );
                    synced.push(app.id);
                    fetched.extend(fetch.pipelines);
                    if let Some(pattern) = fetch.pattern {
                        patterns.insert(app.id, pattern);
                    }
                }
                Err(e) => {
                    warn!(
                        "Skipping application {} ({}) this pass: {:#}",
                        app.name, app.id, e
                    );
                    summary.failed_applications += 1;
                    if let Some(pattern) = app.pattern().and_then(|p| Regex::new(p).ok()) {
                        prune_patterns.insert(app.id, pattern);
                    }
                }
            }
        }

        if synced.is_empty() && prune_patterns.is_empty() {
            return Ok(summary);
        }

        // Applications that failed without a usable filter keep their rows
        let mut application_ids = synced.clone();
        application_ids.extend(prune_patterns.keys().copied());

        let (unreached, existing): (Vec<_>, Vec<_>) = self
            .pipelines
            .list_by_application_ids(&application_ids)
            .await
            .context("Failed to load stored pipelines")?
            .into_iter()
            .partition(|p| prune_patterns.contains_key(&p.application_id));

        let mut plan = reconcile(&existing, &fetched, &patterns);
        debug!(
            "Reconciled {} stored against {} fetched pipeline(s): {} to create, {} to delete",
            existing.len(),
            fetched.len(),
            plan.to_create.len(),
            plan.to_delete.len()
        );

        let pruned = prune_by_pattern(&unreached, &prune_patterns);
        if !pruned.is_empty() {
            debug!(
                "Pruning {} stored pipeline(s) of unreachable applications by name filter",
                pruned.len()
            );
            plan.to_delete.extend(pruned);
        }

        self.commit(plan, &mut summary).await?;

        Ok(summary)
    }

    /// Fetch one application's pipelines within the per-application timeout
    async fn fetch_application(&self, app: &Application) -> Result<ApplicationFetch> {
        let pattern = app
            .pattern()
            .map(Regex::new)
            .transpose()
            .with_context(|| format!("Invalid regex_pattern on application {}", app.name))?;

        let client = self.clients.create_client(app)?;

        let listing = async {
            match &pattern {
                Some(pattern) => client.list_pipelines_by_pattern(pattern).await,
                None => client.list_pipelines().await,
            }
        };

        let pipelines = tokio::time::timeout(self.fetch_timeout, listing)
            .await
            .map_err(|_| anyhow::anyhow!("Fetch timed out after {:?}", self.fetch_timeout))??;

        Ok(ApplicationFetch { pipelines, pattern })
    }

    /// Delete first, then insert in batches; a conflicting batch is skipped
    async fn commit(&self, plan: ReconcilePlan, summary: &mut SyncSummary) -> Result<()> {
        if plan.is_empty() {
            return Ok(());
        }

        if !plan.to_delete.is_empty() {
            summary.deleted = self
                .pipelines
                .delete_bulk(&plan.to_delete)
                .await
                .context("Failed to delete stale pipelines")?;
            info!("Deleted {} stale pipeline(s)", summary.deleted);
        }

        for batch in plan.to_create.chunks(COMMIT_BATCH_SIZE) {
            match self.pipelines.create_bulk(batch).await {
                Ok(created) => summary.created += created,
                Err(RepositoryError::Conflict(msg)) => {
                    warn!(
                        "Skipped a batch of {} new pipeline(s) on conflict: {}",
                        batch.len(),
                        msg
                    );
                    summary.conflicts += 1;
                }
                Err(e) => return Err(e).context("Failed to insert new pipelines"),
            }
        }

        if summary.created > 0 {
            info!("Created {} new pipeline(s)", summary.created);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::{MemoryApplicationStore, MemoryPipelineStore};
    use crate::testing::{Upstream, application, fake_manager, pipeline};
    use pipehub_core::domain::application::{ApplicationStatus, ProviderType};
    use pipehub_core::dto::pipeline::CreatePipeline;
    use std::sync::Mutex;

    struct Harness {
        scheduler: SyncScheduler,
        pipelines: Arc<MemoryPipelineStore>,
    }

    fn harness(
        applications: Vec<Application>,
        stored: Vec<pipehub_core::domain::pipeline::Pipeline>,
        upstreams: HashMap<i64, Upstream>,
    ) -> Harness {
        let pipelines = Arc::new(MemoryPipelineStore::new(stored));
        let scheduler = SyncScheduler::new(
            Arc::new(MemoryApplicationStore::new(applications)),
            pipelines.clone(),
            Arc::new(fake_manager(upstreams, Arc::new(Mutex::new(vec![])))),
            Duration::from_secs(300),
            Duration::from_secs(60),
        );
        Harness {
            scheduler,
            pipelines,
        }
    }

    fn names(pipelines: &MemoryPipelineStore) -> Vec<(String, i64)> {
        let mut names: Vec<_> = pipelines
            .snapshot()
            .into_iter()
            .map(|p| (p.name, p.application_id))
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_end_to_end_pattern_filtering() {
        let h = harness(
            vec![application(1, ProviderType::Jenkins, Some("^prod-"))],
            vec![],
            HashMap::from([(
                1,
                Upstream::Pipelines(vec![("1", "prod-api"), ("2", "dev-api")]),
            )]),
        );

        let summary = h.scheduler.run_once().await.unwrap();

        let rows = h.pipelines.snapshot();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "prod-api");
        assert_eq!(rows[0].application_id, 1);
        assert_eq!(rows[0].project_id, "1");
        assert_eq!(summary.created, 1);
        assert_eq!(summary.deleted, 0);
    }

    #[tokio::test]
    async fn test_failing_application_does_not_block_others() {
        let h = harness(
            vec![
                application(1, ProviderType::Jenkins, None),
                application(2, ProviderType::Jenkins, None),
            ],
            vec![pipeline(10, "a-build", 1), pipeline(11, "b-old", 2)],
            HashMap::from([
                (1, Upstream::Unreachable),
                (2, Upstream::Pipelines(vec![("5", "b-new")])),
            ]),
        );

        let summary = h.scheduler.run_once().await.unwrap();

        assert_eq!(summary.failed_applications, 1);
        assert_eq!(
            names(&h.pipelines),
            vec![("a-build".to_string(), 1), ("b-new".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn test_unreachable_application_is_still_filtered_by_pattern() {
        let h = harness(
            vec![
                application(1, ProviderType::Jenkins, Some("^prod-")),
                application(2, ProviderType::Jenkins, None),
            ],
            vec![
                pipeline(10, "prod-api", 1),
                pipeline(11, "dev-api", 1),
                pipeline(12, "dev-web", 2),
            ],
            HashMap::from([(1, Upstream::Unreachable), (2, Upstream::Unreachable)]),
        );

        let summary = h.scheduler.run_once().await.unwrap();

        assert_eq!(summary.failed_applications, 2);
        assert_eq!(summary.deleted, 1);
        assert_eq!(
            names(&h.pipelines),
            vec![("dev-web".to_string(), 2), ("prod-api".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_invalid_pattern_skips_application() {
        let h = harness(
            vec![application(1, ProviderType::Jenkins, Some("(unclosed"))],
            vec![pipeline(10, "keep-me", 1)],
            HashMap::from([(1, Upstream::Pipelines(vec![]))]),
        );

        let summary = h.scheduler.run_once().await.unwrap();

        assert_eq!(summary.failed_applications, 1);
        assert_eq!(names(&h.pipelines), vec![("keep-me".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_application_without_client_is_skipped() {
        let h = harness(
            vec![application(1, ProviderType::AzureDevOps, None)],
            vec![pipeline(10, "keep-me", 1)],
            HashMap::new(),
        );

        let summary = h.scheduler.run_once().await.unwrap();

        assert_eq!(summary.failed_applications, 1);
        assert_eq!(h.pipelines.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_inactive_applications_are_ignored() {
        let mut inactive = application(1, ProviderType::Jenkins, None);
        inactive.status = ApplicationStatus::Inactive;

        let h = harness(
            vec![inactive],
            vec![pipeline(10, "frozen", 1)],
            HashMap::from([(1, Upstream::Pipelines(vec![]))]),
        );

        let summary = h.scheduler.run_once().await.unwrap();

        assert_eq!(summary.applications, 0);
        assert_eq!(names(&h.pipelines), vec![("frozen".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let h = harness(
            vec![application(1, ProviderType::Jenkins, None)],
            vec![pipeline(10, "stale", 1)],
            HashMap::from([(1, Upstream::Pipelines(vec![("1", "api"), ("2", "web")]))]),
        );

        let first = h.scheduler.run_once().await.unwrap();
        assert_eq!((first.created, first.deleted), (2, 1));

        let second = h.scheduler.run_once().await.unwrap();
        assert_eq!((second.created, second.deleted), (0, 0));
        assert_eq!(
            names(&h.pipelines),
            vec![("api".to_string(), 1), ("web".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_conflicting_batch_is_skipped() {
        let h = harness(
            vec![application(1, ProviderType::Jenkins, None)],
            vec![],
            HashMap::new(),
        );

        // A manual create wins the race for one of the names
        h.pipelines
            .create(CreatePipeline {
                name: "api".to_string(),
                application_id: 1,
                project_id: "9".to_string(),
            })
            .await
            .unwrap();

        let plan = ReconcilePlan {
            to_create: vec![CreatePipeline {
                name: "api".to_string(),
                application_id: 1,
                project_id: "1".to_string(),
            }],
            to_delete: vec![],
        };

        let mut summary = SyncSummary::default();
        h.scheduler.commit(plan, &mut summary).await.unwrap();

        assert_eq!(summary.conflicts, 1);
        assert_eq!(summary.created, 0);
        assert_eq!(h.pipelines.snapshot()[0].project_id, "9");
    }

    #[tokio::test]
    async fn test_large_creates_are_batched() {
        let upstream: Vec<(&'static str, &'static str)> = (0..250)
            .map(|i| {
                let name: &'static str = Box::leak(format!("job-{}", i).into_boxed_str());
                (name, name)
            })
            .collect();

        let h = harness(
            vec![application(1, ProviderType::Jenkins, None)],
            vec![],
            HashMap::from([(1, Upstream::Pipelines(upstream))]),
        );

        let summary = h.scheduler.run_once().await.unwrap();

        assert_eq!(summary.created, 250);
        assert_eq!(h.pipelines.snapshot().len(), 250);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_providers_are_fetched_concurrently() {
        let applications: Vec<_> = (1..=3)
            .map(|id| application(id, ProviderType::Jenkins, None))
            .collect();
        let upstreams = (1..=3)
            .map(|id| (id, Upstream::Slow(Duration::from_secs(10), vec![("1", "api")])))
            .collect();

        let h = harness(applications, vec![], upstreams);

        let started = tokio::time::Instant::now();
        let summary = h.scheduler.run_once().await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(summary.created, 3);
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(20), "took {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_provider_times_out() {
        let h = harness(
            vec![
                application(1, ProviderType::Jenkins, None),
                application(2, ProviderType::Jenkins, None),
            ],
            vec![pipeline(10, "survivor", 1)],
            HashMap::from([
                (1, Upstream::Slow(Duration::from_secs(3600), vec![])),
                (2, Upstream::Pipelines(vec![("1", "api")])),
            ]),
        );

        let started = tokio::time::Instant::now();
        let summary = h.scheduler.run_once().await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(120));
        assert_eq!(summary.failed_applications, 1);
        assert_eq!(
            names(&h.pipelines),
            vec![("api".to_string(), 2), ("survivor".to_string(), 1)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancellation() {
        let h = harness(
            vec![application(1, ProviderType::Jenkins, None)],
            vec![],
            HashMap::from([(1, Upstream::Pipelines(vec![("1", "api")]))]),
        );
        let pipelines = h.pipelines.clone();
        let scheduler = Arc::new(h.scheduler);
        let shutdown = CancellationToken::new();

        let task = {
            let scheduler = scheduler.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { scheduler.run(shutdown).await })
        };

        // First pass runs immediately, then the loop waits for the interval
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(pipelines.snapshot().len(), 1);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("sync loop did not stop")
            .unwrap();
    }
}
