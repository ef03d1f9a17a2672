use sha2::Digest;
use url::Url;

/// Canonicalize `raw`, resolving against `base` if it is relative.
///
/// Applies, in order: absolute-URL parse (resolving relative to `base`),
/// scheme/host lowercasing (handled by the `url` crate itself), default-port
/// stripping, fragment removal, query-parameter key sorting, trailing-slash
/// stripping, and directory-index removal. Returns `None` if the candidate
/// cannot be parsed or is not `http`/`https`.
pub fn canonicalize(raw: &str, base: Option<&Url>) -> Option<Url> {
    let mut url = match base {
        Some(base) => base.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    strip_default_port(&mut url);
    url.set_fragment(None);
    sort_query(&mut url);
    strip_trailing_slash(&mut url);
    strip_index_file(&mut url);

    Some(url)
}

fn strip_default_port(url: &mut Url) {
    let default_port = match url.scheme() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    };
    if url.port() == default_port {
        let _ = url.set_port(None);
    }
}

fn sort_query(url: &mut Url) {
    if url.query().is_none() {
        return;
    }
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    // Stable sort by key only; values keep their relative order for equal keys.
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    url.query_pairs_mut().clear().extend_pairs(&pairs);
}

fn strip_trailing_slash(url: &mut Url) {
    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        url.set_path(&trimmed);
    }
}

/// Matches `index.html`, `default.php`, etc., as the final path segment.
fn is_directory_index(segment: &str) -> bool {
    let lower = segment.to_ascii_lowercase();
    let stem = match lower.rsplit_once('.') {
        Some((stem, ext)) => {
            if !matches!(ext, "html" | "htm" | "php" | "asp" | "aspx" | "jsp") {
                return false;
            }
            stem
        }
        None => return false,
    };
    stem == "index" || stem == "default"
}

fn strip_index_file(url: &mut Url) {
    let path = url.path().to_string();
    let (dir, last) = match path.rsplit_once('/') {
        Some((dir, last)) => (dir, last),
        None => return,
    };
    if is_directory_index(last) {
        let new_path = if dir.is_empty() { "/" } else { dir };
        url.set_path(new_path);
        strip_trailing_slash(url);
    }
}

/// Hex SHA-256 digest of the canonical string form, used as the frontier and
/// visited-set identity key.
pub fn identity_hash(canonical: &Url) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(canonical.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

/// Convenience: canonicalize then hash in one call.
pub fn canonicalize_and_hash(raw: &str, base: Option<&Url>) -> Option<(Url, String)> {
    let canonical = canonicalize(raw, base)?;
    let hash = identity_hash(&canonical);
    Some((canonical, hash))
}

/// True if `a` and `b` share the same (lowercased) host.
pub fn same_host(a: &Url, b: &Url) -> bool {
    a.host_str().map(|h| h.to_ascii_lowercase()) == b.host_str().map(|h| h.to_ascii_lowercase())
}

/// Matches `url`'s host against a list of domain patterns. A pattern
/// `*.example.com` matches `example.com` itself or any subdomain; any other
/// pattern must match the host exactly (case-insensitively).
pub fn matches_domain_list(url: &Url, patterns: &[String]) -> bool {
    let host = match url.host_str() {
        Some(h) => h.to_ascii_lowercase(),
        None => return false,
    };
    patterns.iter().any(|pattern| {
        let pattern = pattern.to_ascii_lowercase();
        match pattern.strip_prefix("*.") {
            Some(suffix) => host == suffix || host.ends_with(&format!(".{suffix}")),
            None => host == pattern,
        }
    })
}

/// True if `url`'s full string matches any of `patterns` (compiled as regexes).
pub fn matches_any(url: &Url, patterns: &[regex::Regex]) -> bool {
    patterns.iter().any(|re| re.is_match(url.as_str()))
}
