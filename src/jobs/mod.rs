use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::models::{CrawlJobPayload, CrawlStats, JobStatus, JobStatusKind};
use crate::orchestrator;
use crate::sink::HttpCallbackSink;

/// Internal state for a running or completed job.
///
/// `live_stats` is published into by the orchestrator as the crawl
/// progresses; `stats` is set once, at completion. `status` reads whichever
/// is available so callers always see a consistent snapshot (spec §4.11,
/// §5: "external readers via `get_stats` receive a consistent snapshot").
#[derive(Debug)]
struct JobEntry {
    status: JobStatusKind,
    stats: Option<CrawlStats>,
    live_stats: Arc<RwLock<CrawlStats>>,
    cancel_token: CancellationToken,
}

/// Manages crawl job lifecycle: submission, status queries, and cancellation
/// (spec §6 HTTP ingress — one job runs exactly one crawl via the
/// orchestrator).
#[derive(Debug)]
pub struct JobManager {
    _config: Arc<Config>,
    jobs: Arc<RwLock<HashMap<String, Arc<Mutex<JobEntry>>>>>,
    tx: mpsc::Sender<CrawlJobPayload>,
}

impl JobManager {
    /// Spawns a background task that processes incoming jobs from the channel.
    pub fn new(config: Arc<Config>) -> Self {
        let (tx, rx) = mpsc::channel::<CrawlJobPayload>(64);
        let jobs: Arc<RwLock<HashMap<String, Arc<Mutex<JobEntry>>>>> =
            Arc::new(RwLock::new(HashMap::new()));

        let manager = JobManager {
            _config: config.clone(),
            jobs: jobs.clone(),
            tx,
        };

        tokio::spawn(Self::process_loop(rx, jobs, config));

        manager
    }

    /// Submit a new crawl job. Returns the job_id.
    pub async fn submit(&self, payload: CrawlJobPayload) -> String {
        let job_id = payload.job_id.clone();

        let entry = Arc::new(Mutex::new(JobEntry {
            status: JobStatusKind::Queued,
            stats: None,
            live_stats: Arc::new(RwLock::new(CrawlStats::new(SystemTime::now()))),
            cancel_token: CancellationToken::new(),
        }));

        self.jobs.write().await.insert(job_id.clone(), entry);

        if let Err(e) = self.tx.send(payload).await {
            tracing::error!("failed to enqueue job: {e}");
        }

        job_id
    }

    /// Cancel a running job by its ID.
    pub async fn cancel(&self, job_id: &str) {
        let jobs = self.jobs.read().await;
        if let Some(entry) = jobs.get(job_id) {
            let mut e = entry.lock().await;
            e.cancel_token.cancel();
            e.status = JobStatusKind::Cancelled;
        }
    }

    /// Get the current status of a job. While the crawl is still running
    /// this returns a live snapshot published by the orchestrator; once
    /// complete it returns the final stats recorded in `run_crawl_job`.
    pub async fn status(&self, job_id: &str) -> JobStatus {
        let jobs = self.jobs.read().await;
        if let Some(entry) = jobs.get(job_id) {
            let e = entry.lock().await;
            let stats = match &e.stats {
                Some(final_stats) => Some(final_stats.clone()),
                None => Some(e.live_stats.read().await.clone()),
            };
            JobStatus {
                job_id: job_id.to_string(),
                status: e.status,
                stats,
            }
        } else {
            JobStatus {
                job_id: job_id.to_string(),
                status: JobStatusKind::Pending,
                stats: None,
            }
        }
    }

    /// Background loop that takes jobs off the channel and spawns a task for each.
    async fn process_loop(
        mut rx: mpsc::Receiver<CrawlJobPayload>,
        jobs: Arc<RwLock<HashMap<String, Arc<Mutex<JobEntry>>>>>,
        config: Arc<Config>,
    ) {
        while let Some(payload) = rx.recv().await {
            let job_id = payload.job_id.clone();

            let entry = {
                let map = jobs.read().await;
                match map.get(&job_id) {
                    Some(e) => e.clone(),
                    None => continue,
                }
            };

            let config = config.clone();
            tokio::spawn(async move {
                Self::run_crawl_job(payload, entry, config).await;
            });
        }
    }

    /// Drive a single job's crawl to completion via the orchestrator,
    /// delivering results to an HMAC-signed HTTP callback sink.
    async fn run_crawl_job(payload: CrawlJobPayload, entry: Arc<Mutex<JobEntry>>, config: Arc<Config>) {
        let (cancel_token, live_stats) = {
            let e = entry.lock().await;
            (e.cancel_token.clone(), e.live_stats.clone())
        };

        {
            let mut e = entry.lock().await;
            e.status = JobStatusKind::Crawling;
        }

        let callback_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build callback HTTP client");

        let sink = Arc::new(HttpCallbackSink::new(
            callback_client,
            payload.callback_url.clone(),
            config.shared_secret.clone(),
        ));

        let result = orchestrator::run(
            payload.options.clone(),
            payload.seed_url.clone(),
            sink,
            cancel_token,
            Some(live_stats),
        )
        .await;

        let mut e = entry.lock().await;
        match result {
            Ok(stats) => {
                if e.status != JobStatusKind::Cancelled {
                    e.status = JobStatusKind::Complete;
                }
                e.stats = Some(stats);
            }
            Err(err) => {
                tracing::error!(job_id = %payload.job_id, error = %err, "crawl job failed");
                e.status = JobStatusKind::Failed;
            }
        }

        tracing::info!(job_id = %payload.job_id, status = ?e.status, "crawl job finished");
    }
}
