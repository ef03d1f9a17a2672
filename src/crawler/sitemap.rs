use std::collections::HashSet;
use std::time::Duration;

use regex::Regex;

/// Well-known sitemap locations probed under the seed origin (spec §4.5).
const WELL_KNOWN_PATHS: &[&str] = &[
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/sitemap-index.xml",
    "/sitemap1.xml",
    "/sitemap/sitemap.xml",
];

/// Result of discovering and expanding sitemaps for one crawl.
#[derive(Debug, Clone)]
pub struct SitemapResult {
    /// All page URLs discovered across every expanded sitemap.
    pub urls: Vec<String>,
    /// Sitemap documents visited, including index documents.
    pub sitemaps_fetched: u32,
}

/// Discover and recursively expand sitemaps into candidate page URLs.
///
/// `declared` are the sitemap URLs found in `robots.txt`; `origin` is the
/// seed's scheme+host(+port). The well-known probe set is unioned with
/// `declared` rather than treated as an alternative to it (spec §4.5).
/// Cycles across `sitemapindex` recursion are prevented by a
/// visited-sitemap-URL set spanning the whole discovery call, and a failing
/// or malformed sitemap is skipped rather than aborting the others.
pub async fn discover(client: &reqwest::Client, origin: &str, declared: &[String]) -> SitemapResult {
    let mut entry_points: Vec<String> = declared.to_vec();
    for path in WELL_KNOWN_PATHS {
        let url = format!("{origin}{path}");
        if probe_exists(client, &url).await {
            entry_points.push(url);
        }
    }

    let mut visited_sitemaps = HashSet::new();
    let mut urls = Vec::new();
    for entry in entry_points {
        expand(client, &entry, &mut visited_sitemaps, &mut urls).await;
    }

    SitemapResult {
        urls,
        sitemaps_fetched: visited_sitemaps.len() as u32,
    }
}

async fn probe_exists(client: &reqwest::Client, url: &str) -> bool {
    client
        .head(url)
        .send()
        .await
        .map(|resp| resp.status().is_success())
        .unwrap_or(false)
}

/// Recursively expand one sitemap URL into page URLs, appending into `out`.
fn expand<'a>(
    client: &'a reqwest::Client,
    sitemap_url: &'a str,
    visited: &'a mut HashSet<String>,
    out: &'a mut Vec<String>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        if !visited.insert(sitemap_url.to_string()) {
            return;
        }

        let Some(xml) = fetch_xml(client, sitemap_url).await else {
            return;
        };

        if xml.contains("<sitemapindex") {
            for child in extract_locs(&xml) {
                expand(client, &child, visited, out).await;
            }
        } else {
            extract_locs(&xml).into_iter().for_each(|u| out.push(u));
        }
    })
}

/// Fetch XML content from a URL. Returns `None` on any error.
async fn fetch_xml(client: &reqwest::Client, url: &str) -> Option<String> {
    let resp = client
        .get(url)
        .timeout(Duration::from_secs(15))
        .send()
        .await
        .ok()?;
    if !resp.status().is_success() {
        return None;
    }
    resp.text().await.ok()
}

/// Extract all `<loc>` values from a sitemap or sitemap-index document.
fn extract_locs(xml: &str) -> Vec<String> {
    let loc_re = Regex::new(r"<loc>\s*(.*?)\s*</loc>").expect("valid regex");
    loc_re
        .captures_iter(xml)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_locs_from_standard_sitemap() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/</loc></url>
  <url><loc>https://example.com/about</loc></url>
  <url><loc>https://example.com/blog</loc></url>
</urlset>"#;
        let urls = extract_locs(xml);
        assert_eq!(urls, vec![
            "https://example.com/".to_string(),
            "https://example.com/about".to_string(),
            "https://example.com/blog".to_string(),
        ]);
    }

    #[test]
    fn extract_locs_empty_urlset_yields_nothing() {
        assert!(extract_locs("<urlset></urlset>").is_empty());
    }

    #[test]
    fn extract_locs_invalid_xml_yields_nothing() {
        assert!(extract_locs("this is not xml at all").is_empty());
    }

    #[test]
    fn extract_locs_trims_whitespace() {
        let xml = r#"<urlset>
  <url><loc>
    https://example.com/page
  </loc></url>
</urlset>"#;
        assert_eq!(extract_locs(xml), vec!["https://example.com/page".to_string()]);
    }

    #[test]
    fn detects_sitemap_index_marker() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://example.com/sitemap-1.xml</loc></sitemap>
  <sitemap><loc>https://example.com/sitemap-2.xml</loc></sitemap>
</sitemapindex>"#;
        assert!(xml.contains("<sitemapindex"));
    }

    #[tokio::test]
    async fn unreachable_sitemap_yields_empty_result() {
        let client = reqwest::Client::new();
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        expand(&client, "https://nonexistent.invalid/sitemap.xml", &mut visited, &mut out).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn expand_does_not_revisit_a_cycle() {
        let client = reqwest::Client::new();
        let mut visited = HashSet::new();
        visited.insert("http://already-visited.invalid/sitemap.xml".to_string());
        let mut out = Vec::new();
        expand(&client, "http://already-visited.invalid/sitemap.xml", &mut visited, &mut out).await;
        assert!(out.is_empty());
        assert_eq!(visited.len(), 1);
    }
}
