/// Presets referenced by configuration (spec §4.3).
pub const HTML_ONLY: &[&str] = &["text/html"];
pub const TEXT_TYPES: &[&str] = &["text/plain", "text/html", "text/css", "text/markdown"];
pub const IMAGES: &[&str] = &["image/*"];
pub const DOCUMENTS: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
];
pub const CRAWLABLE: &[&str] = &["text/html", "application/xhtml+xml", "text/xml", "application/xml", "text/plain"];

/// Strip `;`-delimited parameters, lowercase, and trim a raw `Content-Type`
/// header value down to the bare MIME type.
pub fn normalize_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn mime_matches(mime: &str, pattern: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    match pattern.strip_suffix("/*") {
        Some(category) => mime.split('/').next() == Some(category),
        None => mime == pattern,
    }
}

fn matches_any(mime: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| mime_matches(mime, p))
}

/// Decide whether to accept a response with the given raw `Content-Type`.
///
/// Blocklist wins over allowlist; an empty allowlist accepts anything not
/// blocked.
pub fn is_allowed(content_type: &str, allowed: &[String], blocked: &[String]) -> bool {
    let mime = normalize_mime(content_type);
    if !blocked.is_empty() && matches_any(&mime, blocked) {
        return false;
    }
    if !allowed.is_empty() {
        return matches_any(&mime, allowed);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalizes_parameters_and_case() {
        assert_eq!(normalize_mime("Text/HTML; charset=utf-8"), "text/html");
        assert_eq!(normalize_mime("  application/JSON  "), "application/json");
    }

    #[test]
    fn blocked_wins_over_allowed() {
        let allowed = strings(&["text/html"]);
        let blocked = strings(&["text/html"]);
        assert!(!is_allowed("text/html", &allowed, &blocked));
    }

    #[test]
    fn allowlist_restricts() {
        let allowed = strings(&["text/html"]);
        assert!(is_allowed("text/html; charset=utf-8", &allowed, &[]));
        assert!(!is_allowed("image/png", &allowed, &[]));
    }

    #[test]
    fn category_wildcard_matches() {
        let allowed = strings(&["image/*"]);
        assert!(is_allowed("image/png", &allowed, &[]));
        assert!(is_allowed("image/jpeg", &allowed, &[]));
        assert!(!is_allowed("text/html", &allowed, &[]));
    }

    #[test]
    fn empty_filters_accept_everything() {
        assert!(is_allowed("anything/weird", &[], &[]));
    }

    #[test]
    fn blocklist_monotonicity() {
        let allowed: Vec<String> = vec![];
        let blocked_before: Vec<String> = vec![];
        let blocked_after = strings(&["image/png"]);
        assert!(is_allowed("image/png", &allowed, &blocked_before));
        assert!(!is_allowed("image/png", &allowed, &blocked_after));
    }
}
