use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::crawler::canonical::{canonicalize, identity_hash};
use crate::crawler::checkpoint::{CheckpointStore, CHECKPOINT_PAGE_INTERVAL};
use crate::crawler::fetcher::{is_success_status, Fetcher};
use crate::crawler::frontier::{AdmissionFilters, Frontier};
use crate::crawler::mime_filter;
use crate::crawler::politeness::PolitenessScheduler;
use crate::crawler::robots::RobotsChecker;
use crate::crawler::{extractor, forms, sitemap};
use crate::models::{CrawlError, CrawlOptions, CrawlResult, CrawlStats, DispatchOutcome, QueueItem};
use crate::sink::CrawlSink;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("invalid seed URL: {0}")]
    InvalidSeedUrl(String),
    #[error("invalid URL pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Outcome of one page dispatch, sent back from a fetch task to the main
/// loop so it can update the frontier, stats, and visited set under a
/// single owner (spec §4.11, §5).
struct TaskOutput {
    item: QueueItem,
    outcome: DispatchOutcome,
    page: Option<CrawlResult>,
    error: Option<CrawlError>,
}

/// Drives one crawl run to completion: initializes the frontier (from a
/// seed or a resumed checkpoint), dispatches fetch tasks up to
/// `max_concurrent`, and delivers results to `sink` as it goes (spec §4.11).
///
/// `live_stats`, if given, is published into after every dispatched task so
/// a caller can read a consistent in-progress snapshot via `get_stats`
/// (spec §4.11, §5) while the crawl is still running.
pub async fn run(
    options: CrawlOptions,
    seed_url: String,
    sink: Arc<dyn CrawlSink>,
    cancel: CancellationToken,
    live_stats: Option<Arc<RwLock<CrawlStats>>>,
) -> Result<CrawlStats, OrchestratorError> {
    let seed = canonicalize(&seed_url, None)
        .ok_or_else(|| OrchestratorError::InvalidSeedUrl(seed_url.clone()))?;
    let seed_host = seed
        .host_str()
        .ok_or_else(|| OrchestratorError::InvalidSeedUrl(seed_url.clone()))?
        .to_string();

    let filters = AdmissionFilters::new(&options, seed_host.clone())?;
    let checkpoint_store = CheckpointStore::new(options.state_dir.clone(), job_run_id(&seed));
    let fetcher = Arc::new(Fetcher::new(30, &options.user_agent));
    let robots = Arc::new(RobotsChecker::new(options.user_agent.clone()));
    let politeness = Arc::new(PolitenessScheduler::new());

    let mut stats;
    let mut visited: HashSet<String> = HashSet::new();
    let mut frontier;
    let mut errors: Vec<CrawlError> = Vec::new();

    if options.resumable {
        if let Some(checkpoint) = checkpoint_store.load_checkpoint().await {
            stats = checkpoint.stats;
            visited = checkpoint.visited.into_iter().collect();
            frontier = Frontier::restore(options.strategy, checkpoint.frontier);
            errors = checkpoint.errors;
            tracing::info!(seed = %seed, resumed_visited = visited.len(), "resumed crawl from checkpoint");
        } else {
            stats = CrawlStats::new(SystemTime::now());
            frontier = Frontier::new(options.strategy);
        }
    } else {
        stats = CrawlStats::new(SystemTime::now());
        frontier = Frontier::new(options.strategy);
    }

    if frontier.is_empty() && visited.is_empty() {
        frontier.try_push(seed.as_str(), None, 0, None, &visited, &filters);

        if options.follow_sitemaps {
            let origin = format!("{}://{}", seed.scheme(), seed_host);
            let declared = robots.sitemaps(seed.as_str()).await;
            let discovered = sitemap::discover(&fetcher_http_client(&options), &origin, &declared).await;
            for url in discovered.urls {
                frontier.try_push(&url, None, 0, None, &visited, &filters);
            }
        }
    }

    publish_stats(&live_stats, &stats).await;

    let mut join_set: JoinSet<TaskOutput> = JoinSet::new();

    loop {
        while join_set.len() < options.max_concurrent {
            if stats.total_pages + join_set.len() as u64 >= options.max_pages as u64 {
                break;
            }
            let Some(item) = frontier.pop() else {
                break;
            };
            if visited.contains(&item.hash) {
                continue;
            }
            visited.insert(item.hash.clone());

            let fetcher = fetcher.clone();
            let robots = robots.clone();
            let politeness = politeness.clone();
            let options = options.clone();
            join_set.spawn(dispatch(item, fetcher, robots, politeness, options));
        }

        if join_set.is_empty() {
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(seed = %seed, "crawl cancelled");
                join_set.abort_all();
                break;
            }
            Some(joined) = join_set.join_next() => {
                let Ok(output) = joined else {
                    stats.failed_pages += 1;
                    continue;
                };

                stats.total_pages += 1;
                match output.outcome {
                    DispatchOutcome::Succeeded => {
                        stats.successful_pages += 1;
                        if let Some(page) = output.page {
                            stats.total_links += page.links.len() as u64;
                            stats.total_forms += page.forms.len() as u64;
                            stats.record_load_time(page.load_time_ms);

                            for link in &page.links {
                                frontier.try_push(
                                    &link.canonical_url,
                                    None,
                                    output.item.depth + 1,
                                    Some(output.item.url.clone()),
                                    &visited,
                                    &filters,
                                );
                            }

                            sink.on_page(page).await;
                        }
                    }
                    DispatchOutcome::RobotsDisallowed | DispatchOutcome::MimeRejected => {
                        // Not counted as a failure, and not retried (spec §4.11).
                    }
                    DispatchOutcome::Failed => {
                        stats.failed_pages += 1;
                        if let Some(error) = output.error {
                            errors.push(error.clone());
                            sink.on_error(error).await;
                        }
                    }
                }

                publish_stats(&live_stats, &stats).await;

                if stats.total_pages % CHECKPOINT_PAGE_INTERVAL == 0 {
                    let visited_vec: Vec<String> = visited.iter().cloned().collect();
                    checkpoint_store
                        .save_checkpoint(&visited_vec, &frontier.snapshot(), &stats)
                        .await;
                }
            }
        }
    }

    stats.end_time = Some(SystemTime::now());
    publish_stats(&live_stats, &stats).await;
    sink.on_complete(stats.clone()).await;

    if options.resumable {
        let visited_vec: Vec<String> = visited.iter().cloned().collect();
        if cancel.is_cancelled() {
            checkpoint_store
                .save_final(&options, &visited_vec, &frontier.snapshot(), &stats, &errors)
                .await;
        } else {
            checkpoint_store.clear().await;
        }
    }

    Ok(stats)
}

/// Fetch, filter, and extract a single frontier item (spec §4.11 per-task
/// steps). Runs as an independent task so slow hosts don't block others.
async fn dispatch(
    item: QueueItem,
    fetcher: Arc<Fetcher>,
    robots: Arc<RobotsChecker>,
    politeness: Arc<PolitenessScheduler>,
    options: CrawlOptions,
) -> TaskOutput {
    if options.respect_robots_txt && !robots.is_allowed(&item.url, &options.user_agent).await {
        return TaskOutput {
            item,
            outcome: DispatchOutcome::RobotsDisallowed,
            page: None,
            error: None,
        };
    }

    let Ok(parsed_url) = Url::parse(&item.url) else {
        return TaskOutput {
            item: item.clone(),
            outcome: DispatchOutcome::Failed,
            page: None,
            error: Some(CrawlError {
                url: item.url,
                error: "unparseable URL".to_string(),
                timestamp: SystemTime::now(),
                depth: item.depth,
            }),
        };
    };
    let Some(host) = parsed_url.host_str() else {
        return TaskOutput {
            item: item.clone(),
            outcome: DispatchOutcome::Failed,
            page: None,
            error: Some(CrawlError {
                url: item.url,
                error: "URL has no host".to_string(),
                timestamp: SystemTime::now(),
                depth: item.depth,
            }),
        };
    };

    let delay = robots
        .crawl_delay(&item.url, &options.user_agent)
        .await
        .map(Duration::from_secs_f64)
        .unwrap_or_else(|| Duration::from_millis(options.delay_ms));
    politeness.wait_for_host(host, delay).await;

    let started = std::time::Instant::now();
    let fetched = match fetcher.fetch(&item.url).await {
        Ok(f) => f,
        Err(e) => {
            return TaskOutput {
                item: item.clone(),
                outcome: DispatchOutcome::Failed,
                page: None,
                error: Some(CrawlError {
                    url: item.url,
                    error: e.to_string(),
                    timestamp: SystemTime::now(),
                    depth: item.depth,
                }),
            };
        }
    };

    if !is_success_status(fetched.status_code) {
        return TaskOutput {
            item: item.clone(),
            outcome: DispatchOutcome::Failed,
            page: None,
            error: Some(CrawlError {
                url: item.url,
                error: format!("non-success HTTP status {}", fetched.status_code),
                timestamp: SystemTime::now(),
                depth: item.depth,
            }),
        };
    }

    let content_type = fetched
        .headers
        .get("content-type")
        .cloned()
        .unwrap_or_default();
    if !mime_filter::is_allowed(&content_type, &options.allowed_mime_types, &options.blocked_mime_types) {
        return TaskOutput {
            item,
            outcome: DispatchOutcome::MimeRejected,
            page: None,
            error: None,
        };
    }

    let final_url = Url::parse(&fetched.final_url).unwrap_or(parsed_url);
    let body_str = String::from_utf8_lossy(&fetched.body).into_owned();

    let mut links = extractor::extract_links(&body_str, &final_url, options.extract_js_links);
    let mut forms_found = Vec::new();
    if options.extract_forms {
        let (extracted_forms, form_links) = forms::extract_forms(&body_str, &final_url);
        forms_found = extracted_forms;
        links.extend(form_links);
    }

    let page = CrawlResult {
        url: item.url.clone(),
        canonical_url: final_url.to_string(),
        depth: item.depth,
        status_code: fetched.status_code,
        content_type,
        body: fetched.body,
        links,
        forms: forms_found,
        headers: fetched.headers,
        completed_at: SystemTime::now(),
        load_time_ms: started.elapsed().as_millis() as u64,
        from_url: item.from_url.clone(),
        redirect_chain: fetched.redirect_chain,
    };

    TaskOutput {
        item,
        outcome: DispatchOutcome::Succeeded,
        page: Some(page),
        error: None,
    }
}

fn job_run_id(seed: &Url) -> String {
    identity_hash(seed)[..16].to_string()
}

/// Publish a clone of `stats` into the shared live-stats handle, if any, so
/// `get_stats`-style readers observe a consistent in-progress snapshot.
async fn publish_stats(live_stats: &Option<Arc<RwLock<CrawlStats>>>, stats: &CrawlStats) {
    if let Some(handle) = live_stats {
        *handle.write().await = stats.clone();
    }
}

/// Build a throwaway HTTP client for sitemap probing, matching the seed
/// crawl's user agent. Kept separate from [`Fetcher`] since sitemap
/// discovery needs HEAD support and raw XML bodies, not redirect-chain
/// recording or MIME filtering.
fn fetcher_http_client(options: &CrawlOptions) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(options.user_agent.clone())
        .timeout(Duration::from_secs(15))
        .build()
        .expect("failed to build sitemap HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CrawlStats as Stats;
    use std::sync::Mutex;

    struct RecordingSink {
        pages: Mutex<Vec<CrawlResult>>,
        errors: Mutex<Vec<CrawlError>>,
        completed: Mutex<Option<Stats>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            RecordingSink {
                pages: Mutex::new(Vec::new()),
                errors: Mutex::new(Vec::new()),
                completed: Mutex::new(None),
            }
        }
    }

    #[async_trait::async_trait]
    impl CrawlSink for RecordingSink {
        async fn on_page(&self, result: CrawlResult) {
            self.pages.lock().unwrap().push(result);
        }
        async fn on_error(&self, error: CrawlError) {
            self.errors.lock().unwrap().push(error);
        }
        async fn on_complete(&self, stats: Stats) {
            *self.completed.lock().unwrap() = Some(stats);
        }
    }

    #[tokio::test]
    async fn rejects_invalid_seed_url() {
        let sink = Arc::new(RecordingSink::new());
        let result = run(
            CrawlOptions::default(),
            "not a url".to_string(),
            sink,
            CancellationToken::new(),
            None,
        )
        .await;
        assert!(matches!(result, Err(OrchestratorError::InvalidSeedUrl(_))));
    }

    #[tokio::test]
    async fn unreachable_seed_completes_with_zero_pages_and_calls_on_complete() {
        let sink = Arc::new(RecordingSink::new());
        let mut options = CrawlOptions::default();
        options.max_pages = 1;
        options.delay_ms = 0;
        let stats = run(
            options,
            "http://127.0.0.1:1/".to_string(),
            sink.clone(),
            CancellationToken::new(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(stats.total_pages, 1);
        assert_eq!(stats.failed_pages, 1);
        assert!(sink.completed.lock().unwrap().is_some());
        assert_eq!(sink.errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn live_stats_handle_reflects_final_snapshot() {
        let sink = Arc::new(RecordingSink::new());
        let mut options = CrawlOptions::default();
        options.max_pages = 1;
        options.delay_ms = 0;
        let live_stats = Arc::new(RwLock::new(Stats::new(SystemTime::now())));

        let stats = run(
            options,
            "http://127.0.0.1:1/".to_string(),
            sink,
            CancellationToken::new(),
            Some(live_stats.clone()),
        )
        .await
        .unwrap();

        let published = live_stats.read().await.clone();
        assert_eq!(published.total_pages, stats.total_pages);
        assert_eq!(published.failed_pages, stats.failed_pages);
        assert!(published.end_time.is_some());
    }
}
