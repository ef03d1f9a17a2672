use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

use crate::models::RedirectHop;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("too many redirects fetching {url}")]
    TooManyRedirects { url: String },
}

/// Result of a successful HTTP fetch, after following any redirects.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status_code: u16,
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
    pub final_url: String,
    pub redirect_chain: Vec<RedirectHop>,
}

const MAX_REDIRECTS: usize = 5;

/// Plain HTTP GET fetcher (spec §6 "HTTP client contract"). Redirects are
/// followed manually rather than by `reqwest`'s built-in policy so each hop
/// can be recorded into the result's `redirect_chain`.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// - `timeout_secs`: per-request timeout in seconds (spec default 30)
    /// - `user_agent`: custom User-Agent header string
    pub fn new(timeout_secs: u64, user_agent: &str) -> Self {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .gzip(true)
            .pool_max_idle_per_host(20)
            .build()
            .expect("failed to build HTTP client");

        Fetcher { client }
    }

    /// Fetch `url`, following up to [`MAX_REDIRECTS`] redirects. A response
    /// counts as success iff its final status is in `[200, 400)` (spec §4.11
    /// per-task contract); anything else is still returned as `Ok` so the
    /// orchestrator can decide how to record it.
    pub async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        let mut current = url.to_string();
        let mut redirect_chain = Vec::new();

        for _ in 0..=MAX_REDIRECTS {
            let response = self.client.get(&current).send().await?;
            let status = response.status();

            if status.is_redirection() {
                let Some(location) = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                else {
                    return Ok(to_result(response, redirect_chain).await?);
                };
                redirect_chain.push(RedirectHop {
                    url: current.clone(),
                    status_code: status.as_u16(),
                });
                current = resolve_location(&current, location);
                continue;
            }

            return Ok(to_result(response, redirect_chain).await?);
        }

        Err(FetchError::TooManyRedirects { url: url.to_string() })
    }
}

fn resolve_location(base: &str, location: &str) -> String {
    match url::Url::parse(base).and_then(|b| b.join(location)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => location.to_string(),
    }
}

async fn to_result(
    response: reqwest::Response,
    redirect_chain: Vec<RedirectHop>,
) -> Result<FetchResult, reqwest::Error> {
    let status_code = response.status().as_u16();
    let final_url = response.url().to_string();

    let mut headers = HashMap::new();
    for (name, value) in response.headers().iter() {
        if let Ok(v) = value.to_str() {
            headers.insert(name.to_string(), v.to_string());
        }
    }

    let body = response.bytes().await?.to_vec();

    Ok(FetchResult {
        status_code,
        body,
        headers,
        final_url,
        redirect_chain,
    })
}

/// `true` if an HTTP status code counts as a successful fetch (spec §4.11:
/// `[200, 400)`).
pub fn is_success_status(status_code: u16) -> bool {
    (200..400).contains(&status_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_status_range() {
        assert!(is_success_status(200));
        assert!(is_success_status(204));
        assert!(is_success_status(399));
        assert!(!is_success_status(400));
        assert!(!is_success_status(500));
        assert!(!is_success_status(199));
    }

    #[test]
    fn resolves_relative_redirect_locations() {
        let resolved = resolve_location("http://example.com/a/b", "/c");
        assert_eq!(resolved, "http://example.com/c");
    }

    #[test]
    fn resolves_absolute_redirect_locations() {
        let resolved = resolve_location("http://example.com/a", "https://other.com/x");
        assert_eq!(resolved, "https://other.com/x");
    }

    #[tokio::test]
    async fn network_failure_surfaces_as_fetch_error() {
        let fetcher = Fetcher::new(5, "OSINT-Crawler/1.0");
        let result = fetcher.fetch("http://127.0.0.1:1/x").await;
        assert!(result.is_err());
    }
}
