use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use url::Url;

/// Per-origin parsed `robots.txt` state (spec §3 `RobotsRecord`, §4.4).
#[derive(Debug, Clone, Default)]
struct RobotsRecord {
    /// lowercase user-agent -> disallowed path prefixes
    rules: HashMap<String, Vec<String>>,
    /// lowercase user-agent -> crawl-delay in seconds
    crawl_delays: HashMap<String, f64>,
    sitemaps: Vec<String>,
}

/// Fetches, parses, and caches `robots.txt` per origin for the lifetime of
/// one crawl run (spec §4.4; scoped to a single [`RobotsChecker`] instance,
/// never shared across runs — spec §9 design note).
pub struct RobotsChecker {
    client: reqwest::Client,
    cache: RwLock<HashMap<String, RobotsRecord>>,
}

impl RobotsChecker {
    pub fn new(user_agent: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.into())
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build robots.txt HTTP client");
        RobotsChecker {
            client,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn origin_key(url: &Url) -> Option<String> {
        let scheme = url.scheme();
        let host = url.host_str()?;
        match url.port() {
            Some(p) => Some(format!("{scheme}://{host}:{p}")),
            None => Some(format!("{scheme}://{host}")),
        }
    }

    /// Fetch-and-cache the record for `url`'s origin. Network failures and
    /// non-200 statuses both yield a permissive (empty) record, never an
    /// error — spec §4.4's "failure semantics".
    async fn record_for(&self, url: &Url) -> RobotsRecord {
        let Some(origin) = Self::origin_key(url) else {
            return RobotsRecord::default();
        };

        if let Some(record) = self.cache.read().await.get(&origin) {
            return record.clone();
        }

        // Coalescing fetch-then-insert under the write lock: a second
        // caller racing in here just overwrites with an equivalent record,
        // which spec §5 explicitly allows ("last-writer-wins is acceptable").
        let robots_url = format!("{origin}/robots.txt");
        let record = match self.client.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let body = resp.text().await.unwrap_or_default();
                parse_robots_txt(&body)
            }
            _ => RobotsRecord::default(),
        };

        self.cache.write().await.insert(origin, record.clone());
        record
    }

    /// `true` if `ua` is allowed to fetch `url` per the cached record.
    pub async fn is_allowed(&self, url: &str, ua: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };
        let record = self.record_for(&parsed).await;
        let path = parsed.path();
        let ua_lower = ua.to_ascii_lowercase();

        for agent in [ua_lower.as_str(), "*"] {
            if let Some(disallowed) = record.rules.get(agent) {
                for pattern in disallowed {
                    if !pattern.is_empty() && path.starts_with(pattern) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// The declared crawl-delay for `ua` at `url`'s origin, in seconds.
    pub async fn crawl_delay(&self, url: &str, ua: &str) -> Option<f64> {
        let parsed = Url::parse(url).ok()?;
        let record = self.record_for(&parsed).await;
        let ua_lower = ua.to_ascii_lowercase();
        record
            .crawl_delays
            .get(ua_lower.as_str())
            .or_else(|| record.crawl_delays.get("*"))
            .copied()
    }

    /// Sitemaps declared in `url`'s origin's `robots.txt`.
    pub async fn sitemaps(&self, url: &str) -> Vec<String> {
        let Ok(parsed) = Url::parse(url) else {
            return Vec::new();
        };
        self.record_for(&parsed).await.sitemaps
    }

    #[cfg(test)]
    async fn seed_cache(&self, origin: &str, content: &str) {
        self.cache
            .write()
            .await
            .insert(origin.to_string(), parse_robots_txt(content));
    }
}

fn parse_robots_txt(content: &str) -> RobotsRecord {
    let mut record = RobotsRecord::default();
    let mut current_agents: Vec<String> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        let line = match line.find('#') {
            Some(idx) => line[..idx].trim(),
            None => line,
        };

        if line.is_empty() {
            current_agents.clear();
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => current_agents.push(value.to_ascii_lowercase()),
            "disallow" => {
                for agent in &current_agents {
                    record
                        .rules
                        .entry(agent.clone())
                        .or_default()
                        .push(value.to_string());
                }
            }
            "crawl-delay" => {
                if let Ok(secs) = value.parse::<f64>() {
                    for agent in &current_agents {
                        record.crawl_delays.insert(agent.clone(), secs);
                    }
                }
            }
            "sitemap" => record.sitemaps.push(value.to_string()),
            _ => {}
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
User-agent: *
Disallow: /admin/
Disallow: /private/
Crawl-delay: 2

User-agent: GPTBot
Disallow: /

Sitemap: https://example.com/sitemap.xml
"#;

    #[test]
    fn parses_wildcard_rules_and_delay() {
        let record = parse_robots_txt(SAMPLE);
        assert_eq!(record.crawl_delays.get("*"), Some(&2.0));
        assert!(record
            .rules
            .get("*")
            .unwrap()
            .contains(&"/admin/".to_string()));
        assert_eq!(
            record.sitemaps,
            vec!["https://example.com/sitemap.xml".to_string()]
        );
    }

    #[tokio::test]
    async fn s4_disallow_blocks_matching_path() {
        let checker = RobotsChecker::new("OSINT-Crawler/1.0");
        checker.seed_cache("http://h", SAMPLE).await;

        assert!(!checker.is_allowed("http://h/private/secret", "*").await);
        assert!(checker.is_allowed("http://h/public/ok", "*").await);
    }

    #[tokio::test]
    async fn unparseable_url_is_permissive() {
        let checker = RobotsChecker::new("OSINT-Crawler/1.0");
        assert!(checker.is_allowed("not a url", "*").await);
    }

    #[tokio::test]
    async fn crawl_delay_falls_back_to_wildcard() {
        let checker = RobotsChecker::new("OSINT-Crawler/1.0");
        checker.seed_cache("http://h", SAMPLE).await;
        assert_eq!(checker.crawl_delay("http://h/x", "SomeBot").await, Some(2.0));
    }

    #[tokio::test]
    async fn network_failure_yields_permissive_record() {
        // Connection refused on an unroutable-port host: the fetch fails,
        // and the checker must fall back to permissive, never an error.
        let checker = RobotsChecker::new("OSINT-Crawler/1.0");
        assert!(checker.is_allowed("http://127.0.0.1:1/x", "*").await);
    }
}
