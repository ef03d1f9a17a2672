use std::env;

/// Process-wide server configuration, loaded once at start-up (spec §6
/// "configuration surface" — the server-ingress portion; per-crawl tuning
/// lives in [`crate::models::CrawlOptions`] instead).
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared secret for HMAC-signed job submission and callback requests.
    pub shared_secret: String,
    pub port: u16,
    /// Ceiling on simultaneously running crawl jobs across this process.
    pub max_concurrent_jobs: usize,
    /// Root directory under which each job's checkpoint state is stored.
    pub state_dir_root: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let shared_secret =
            env::var("SHARED_SECRET").map_err(|_| ConfigError::Missing("SHARED_SECRET"))?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue("PORT", "must be a valid u16"))?;

        let max_concurrent_jobs = env::var("MAX_CONCURRENT_JOBS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::InvalidValue("MAX_CONCURRENT_JOBS", "must be a valid usize")
            })?;

        let state_dir_root =
            env::var("STATE_DIR_ROOT").unwrap_or_else(|_| ".crawl-state".to_string());

        Ok(Config {
            shared_secret,
            port,
            max_concurrent_jobs,
            state_dir_root,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, &'static str),
}
