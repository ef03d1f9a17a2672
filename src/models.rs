use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;

/// Traversal order the frontier pops items in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Strategy {
    #[default]
    Bfs,
    Dfs,
}

/// Immutable per-run crawl configuration.
///
/// Sink callbacks are not part of this value — they are supplied
/// separately to the orchestrator (see [`crate::sink::CrawlSink`]) since a
/// trait object isn't `Serialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlOptions {
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    #[serde(default)]
    pub blocked_domains: Vec<String>,
    #[serde(default)]
    pub stay_in_domain: bool,
    #[serde(default)]
    pub url_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
    #[serde(default)]
    pub blocked_mime_types: Vec<String>,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_true")]
    pub respect_robots_txt: bool,
    #[serde(default)]
    pub follow_sitemaps: bool,
    #[serde(default)]
    pub extract_forms: bool,
    #[serde(default)]
    pub extract_js_links: bool,
    #[serde(default)]
    pub resumable: bool,
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    #[serde(default = "default_worker_id")]
    pub worker_id: String,
    #[serde(default = "default_total_workers")]
    pub total_workers: usize,
}

fn default_true() -> bool {
    true
}
fn default_max_depth() -> u32 {
    3
}
fn default_max_pages() -> u32 {
    1000
}
fn default_allowed_mime_types() -> Vec<String> {
    crate::crawler::mime_filter::CRAWLABLE
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_delay_ms() -> u64 {
    1000
}
fn default_max_concurrent() -> usize {
    5
}
fn default_user_agent() -> String {
    "OSINT-Crawler/1.0".to_string()
}
fn default_state_dir() -> String {
    ".crawl-state".to_string()
}
fn default_worker_id() -> String {
    "worker-0".to_string()
}
fn default_total_workers() -> usize {
    1
}

impl Default for CrawlOptions {
    fn default() -> Self {
        CrawlOptions {
            strategy: Strategy::Bfs,
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
            allowed_domains: Vec::new(),
            blocked_domains: Vec::new(),
            stay_in_domain: false,
            url_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            allowed_mime_types: default_allowed_mime_types(),
            blocked_mime_types: Vec::new(),
            delay_ms: default_delay_ms(),
            max_concurrent: default_max_concurrent(),
            user_agent: default_user_agent(),
            respect_robots_txt: true,
            follow_sitemaps: false,
            extract_forms: false,
            extract_js_links: false,
            resumable: false,
            state_dir: default_state_dir(),
            worker_id: default_worker_id(),
            total_workers: default_total_workers(),
        }
    }
}

/// An item pending dispatch in the frontier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueItem {
    pub url: String,
    pub depth: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_url: Option<String>,
    /// Hex digest of the canonical URL; the frontier's identity key.
    pub hash: String,
}

/// Type of an outbound link as classified by its originating HTML element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkType {
    Anchor,
    Image,
    Script,
    Stylesheet,
    Frame,
    FormAction,
    Javascript,
    Other,
}

/// A single outbound link discovered on a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedLink {
    pub url: String,
    pub canonical_url: String,
    #[serde(rename = "type")]
    pub link_type: LinkType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// A single form input control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormInput {
    pub name: String,
    #[serde(rename = "type")]
    pub input_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub required: bool,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// A `<form>` extracted from a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    pub action: String,
    pub method: String,
    pub inputs: Vec<FormInput>,
}

/// One redirect hop followed while fetching a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectHop {
    pub url: String,
    pub status_code: u16,
}

/// The full result of successfully fetching and extracting a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub url: String,
    pub canonical_url: String,
    pub depth: u32,
    pub status_code: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    pub links: Vec<ExtractedLink>,
    pub forms: Vec<Form>,
    pub headers: HashMap<String, String>,
    #[serde(with = "humantime_serde_system_time")]
    pub completed_at: SystemTime,
    pub load_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_url: Option<String>,
    #[serde(default)]
    pub redirect_chain: Vec<RedirectHop>,
}

/// A per-URL failure reported to [`crate::sink::CrawlSink::on_error`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlError {
    pub url: String,
    pub error: String,
    #[serde(with = "humantime_serde_system_time")]
    pub timestamp: SystemTime,
    pub depth: u32,
}

/// Running statistics for a crawl, updated under a single discipline by the
/// orchestrator (see spec §3, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlStats {
    pub total_pages: u64,
    pub successful_pages: u64,
    pub failed_pages: u64,
    pub total_links: u64,
    pub total_forms: u64,
    #[serde(with = "humantime_serde_system_time")]
    pub start_time: SystemTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<SystemTime>,
    pub avg_load_time_ms: f64,
}

impl CrawlStats {
    pub fn new(start_time: SystemTime) -> Self {
        CrawlStats {
            total_pages: 0,
            successful_pages: 0,
            failed_pages: 0,
            total_links: 0,
            total_forms: 0,
            start_time,
            end_time: None,
            avg_load_time_ms: 0.0,
        }
    }

    /// Fold one more successful page's load time into the running mean.
    pub fn record_load_time(&mut self, load_time_ms: u64) {
        let n = self.successful_pages as f64;
        self.avg_load_time_ms += (load_time_ms as f64 - self.avg_load_time_ms) / n;
    }
}

/// Status of a single [`QueueItem`] across its lifetime in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchOutcome {
    RobotsDisallowed,
    MimeRejected,
    Succeeded,
    Failed,
}

/// Schema-versioned on-disk snapshot written by the checkpoint store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub schema_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<CrawlOptions>,
    pub stats: CrawlStats,
    pub visited: Vec<String>,
    pub frontier: Vec<QueueItem>,
    #[serde(default)]
    pub errors: Vec<CrawlError>,
    #[serde(with = "humantime_serde_system_time")]
    pub timestamp: SystemTime,
}

pub const CHECKPOINT_SCHEMA_VERSION: u32 = 1;

/// Incoming job submission accepted by the HTTP ingress (spec §6 "external
/// collaborators submit crawl jobs" — one job runs exactly one crawl).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJobPayload {
    pub job_id: String,
    pub seed_url: String,
    #[serde(default)]
    pub options: CrawlOptions,
    pub callback_url: String,
}

/// Coarse job lifecycle state tracked by the job manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatusKind {
    Pending,
    Queued,
    Crawling,
    Complete,
    Cancelled,
    Failed,
}

/// Response shape for job-status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub status: JobStatusKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<CrawlStats>,
}

/// (de)serialize a `SystemTime` as seconds-since-epoch so checkpoints stay
/// portable JSON instead of platform-specific `serde` time reprs.
mod humantime_serde_system_time {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S: Serializer>(t: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
        let secs = t
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        secs.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SystemTime, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(UNIX_EPOCH + Duration::from_secs_f64(secs))
    }
}
