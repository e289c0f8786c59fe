use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, Notify};
use uuid::Uuid;

use crate::db::TicketStore;
use crate::models::job::{
    AnalysisItem, AnalysisJob, ItemError, ItemErrorKind, ItemResult, JobEvent, JobPayload,
    JobStatus, JobStatusView, QueueStats,
};
use crate::services::analysis::AnalysisProvider;

/// Tuning knobs for the queue. Defaults match production behavior: a single
/// worker, a 500 ms courtesy delay between inference calls, terminal jobs
/// retained for 24 hours and swept hourly.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub workers: usize,
    pub item_delay: Duration,
    pub retention: Duration,
    pub cleanup_interval: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            item_delay: Duration::from_millis(500),
            retention: Duration::from_secs(24 * 3600),
            cleanup_interval: Duration::from_secs(3600),
        }
    }
}

/// In-memory analysis job queue: the job store, a FIFO work queue of pending
/// job ids, and the worker tasks that drain it. Jobs are lost on process
/// exit; callers poll [`AnalysisQueue::get_job`] until a terminal status.
///
/// The worker runs each job fully to completion before looking at the next
/// queued id, so a large bulk job head-of-line-blocks later submissions.
pub struct AnalysisQueue<A, S> {
    inner: Mutex<QueueInner>,
    wake: Notify,
    events: broadcast::Sender<JobEvent>,
    analysis: Arc<A>,
    store: Arc<S>,
    opts: QueueOptions,
}

struct QueueInner {
    jobs: HashMap<Uuid, AnalysisJob>,
    pending: VecDeque<Uuid>,
    active_workers: usize,
    current_job: Option<Uuid>,
}

impl<A, S> AnalysisQueue<A, S>
where
    A: AnalysisProvider + 'static,
    S: TicketStore + 'static,
{
    /// Construct the queue and spawn its worker and cleanup tasks. Called
    /// once from the composition root; the tasks run for the process
    /// lifetime and are never explicitly stopped.
    pub fn start(analysis: Arc<A>, store: Arc<S>, opts: QueueOptions) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        let queue = Arc::new(Self {
            inner: Mutex::new(QueueInner {
                jobs: HashMap::new(),
                pending: VecDeque::new(),
                active_workers: 0,
                current_job: None,
            }),
            wake: Notify::new(),
            events,
            analysis,
            store,
            opts,
        });

        for _ in 0..queue.opts.workers.max(1) {
            tokio::spawn(Arc::clone(&queue).worker_loop());
        }
        tokio::spawn(Arc::clone(&queue).cleanup_loop());

        queue
    }

    pub fn create_bulk_analysis_job(
        &self,
        project_key: String,
        items: Vec<AnalysisItem>,
    ) -> Uuid {
        self.submit(JobPayload::Bulk { project_key, items })
    }

    pub fn create_single_analysis_job(&self, item: AnalysisItem) -> Uuid {
        self.submit(JobPayload::Single { item })
    }

    /// Insert a fresh record in `Queued`, push its id to the queue tail and
    /// wake a worker. Returns synchronously; never blocks on completion.
    fn submit(&self, payload: JobPayload) -> Uuid {
        let job = AnalysisJob::new(payload);
        let id = job.id;
        let depth;
        {
            let mut inner = self.lock();
            inner.jobs.insert(id, job);
            inner.pending.push_back(id);
            depth = inner.pending.len();
        }

        tracing::info!(job_id = %id, queue_depth = depth, "analysis job submitted");
        metrics::counter!("analysis_jobs_total").increment(1);
        metrics::gauge!("analysis_queue_depth").set(depth as f64);

        self.emit(JobEvent::Created { job_id: id });
        self.wake.notify_one();
        id
    }

    /// Point lookup. Unknown ids yield `None`, never an error.
    pub fn get_job(&self, id: Uuid) -> Option<JobStatusView> {
        self.lock().jobs.get(&id).map(JobStatusView::from)
    }

    pub fn stats(&self) -> QueueStats {
        let inner = self.lock();
        let mut stats = QueueStats {
            total: inner.jobs.len(),
            queued: 0,
            processing: 0,
            completed: 0,
            failed: 0,
            active_workers: inner.active_workers,
            current_job: inner.current_job,
        };
        for job in inner.jobs.values() {
            match job.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Fires on job creation, start, every progress update, completion and
    /// failure. Sends are best-effort; lagging receivers miss events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Evict terminal jobs whose completion is older than `max_age`.
    /// Returns how many records were removed.
    pub fn cleanup(&self, max_age: Duration) -> usize {
        // A retention window too large for chrono means nothing can expire.
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return 0;
        };
        let cutoff = Utc::now() - max_age;

        let mut inner = self.lock();
        let before = inner.jobs.len();
        inner.jobs.retain(|_, job| match job.completed_at {
            Some(done) => done > cutoff,
            None => true,
        });
        let evicted = before - inner.jobs.len();
        drop(inner);

        if evicted > 0 {
            tracing::info!(evicted, "evicted expired analysis jobs");
        }
        evicted
    }

    async fn worker_loop(self: Arc<Self>) {
        loop {
            let next = {
                let mut inner = self.lock();
                inner.pending.pop_front()
            };

            let Some(job_id) = next else {
                self.wake.notified().await;
                continue;
            };

            {
                let mut inner = self.lock();
                inner.active_workers += 1;
                inner.current_job = Some(job_id);
                metrics::gauge!("analysis_queue_depth").set(inner.pending.len() as f64);
            }

            self.run_job(job_id).await;

            {
                let mut inner = self.lock();
                inner.active_workers -= 1;
                inner.current_job = None;
            }
        }
    }

    /// Drive one job to a terminal state, item by item in list order.
    async fn run_job(&self, job_id: Uuid) {
        let items: Vec<AnalysisItem> = match self.lock().jobs.get(&job_id) {
            Some(job) => job.payload.items().to_vec(),
            None => return,
        };

        if !self.analysis.is_available().await {
            self.fail_job(job_id, "analysis endpoint is not reachable");
            return;
        }

        tracing::info!(job_id = %job_id, items = items.len(), "processing analysis job");
        let started = std::time::Instant::now();

        for (idx, item) in items.iter().enumerate() {
            match self.analysis.analyze(item).await {
                Ok(analysis) => {
                    // Write back the six analysis fields before moving on, so
                    // partial results survive a later item failing.
                    match self.store.record_analysis(&item.key, &analysis).await {
                        Ok(()) => {
                            self.record_outcome(
                                job_id,
                                Ok(ItemResult {
                                    item_key: item.key.clone(),
                                    analysis,
                                }),
                            );
                        }
                        Err(e) => {
                            tracing::warn!(
                                job_id = %job_id,
                                item_key = %item.key,
                                error = %e,
                                "analysis write-back failed"
                            );
                            self.record_outcome(
                                job_id,
                                Err(ItemError {
                                    item_key: Some(item.key.clone()),
                                    kind: ItemErrorKind::WriteBack,
                                    message: e.to_string(),
                                }),
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = %job_id,
                        item_key = %item.key,
                        error = %e,
                        "item analysis failed"
                    );
                    self.record_outcome(
                        job_id,
                        Err(ItemError {
                            item_key: Some(item.key.clone()),
                            kind: ItemErrorKind::Analysis,
                            message: e.to_string(),
                        }),
                    );
                }
            }

            // Courtesy pause so a bulk job does not saturate the endpoint.
            if idx + 1 < items.len() && !self.opts.item_delay.is_zero() {
                tokio::time::sleep(self.opts.item_delay).await;
            }
        }

        if items.is_empty() {
            self.complete_empty(job_id);
        }

        metrics::histogram!("analysis_job_seconds").record(started.elapsed().as_secs_f64());
    }

    /// Record one item outcome: transitions `Queued -> Processing` lazily on
    /// the first update, advances progress, and completes the job when
    /// progress reaches total. Every update holds the lock only across
    /// synchronous mutation; events go out after it is released.
    fn record_outcome(&self, job_id: Uuid, outcome: Result<ItemResult, ItemError>) {
        let mut pending_events = Vec::with_capacity(3);
        {
            let mut inner = self.lock();
            let Some(job) = inner.jobs.get_mut(&job_id) else {
                return;
            };
            if job.status.is_terminal() {
                return;
            }

            if job.status == JobStatus::Queued {
                job.status = JobStatus::Processing;
                job.started_at = Some(Utc::now());
                pending_events.push(JobEvent::Started { job_id });
            }

            match outcome {
                Ok(result) => {
                    metrics::counter!("analysis_items_succeeded").increment(1);
                    job.results.push(result);
                }
                Err(error) => {
                    metrics::counter!("analysis_items_failed").increment(1);
                    job.errors.push(error);
                }
            }
            job.progress += 1;
            pending_events.push(JobEvent::Progress {
                job_id,
                progress: job.progress,
                total: job.total,
            });

            if job.progress == job.total {
                job.status = JobStatus::Completed;
                job.completed_at = Some(Utc::now());
                pending_events.push(JobEvent::Completed { job_id });
                metrics::counter!("analysis_jobs_completed").increment(1);
                tracing::info!(
                    job_id = %job_id,
                    succeeded = job.results.len(),
                    failed = job.errors.len(),
                    "analysis job completed"
                );
            }
        }

        for event in pending_events {
            self.emit(event);
        }
    }

    /// Terminal failure before normal per-item completion: one job-level
    /// error, no items attempted (or none past the point of failure).
    fn fail_job(&self, job_id: Uuid, message: &str) {
        {
            let mut inner = self.lock();
            let Some(job) = inner.jobs.get_mut(&job_id) else {
                return;
            };
            if job.status.is_terminal() {
                return;
            }
            job.status = JobStatus::Failed;
            job.completed_at = Some(Utc::now());
            job.errors.push(ItemError {
                item_key: None,
                kind: ItemErrorKind::Setup,
                message: message.to_string(),
            });
        }

        metrics::counter!("analysis_jobs_failed").increment(1);
        tracing::error!(job_id = %job_id, error = message, "analysis job failed");
        self.emit(JobEvent::Failed { job_id });
    }

    /// A job with no items skips the item loop entirely and still observes
    /// the full transition sequence.
    fn complete_empty(&self, job_id: Uuid) {
        {
            let mut inner = self.lock();
            let Some(job) = inner.jobs.get_mut(&job_id) else {
                return;
            };
            if job.status.is_terminal() {
                return;
            }
            let now = Utc::now();
            job.status = JobStatus::Completed;
            job.started_at = Some(now);
            job.completed_at = Some(now);
        }

        metrics::counter!("analysis_jobs_completed").increment(1);
        tracing::info!(job_id = %job_id, "empty analysis job completed");
        self.emit(JobEvent::Started { job_id });
        self.emit(JobEvent::Completed { job_id });
    }

    async fn cleanup_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.opts.cleanup_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately; sweeping an empty store is fine.
        loop {
            ticker.tick().await;
            self.cleanup(self.opts.retention);
        }
    }

    fn emit(&self, event: JobEvent) {
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
