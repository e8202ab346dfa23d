use super::HOME_PATH;

/// Whether `url` stays on this site.
///
/// Accepts `/path` (but not `//host` or `/\host`, which browsers treat as
/// protocol-relative) and app-relative `~/path`. Control characters are
/// rejected outright.
#[must_use]
pub fn is_local_url(url: &str) -> bool {
    if url.chars().any(char::is_control) {
        return false;
    }
    let bytes = url.as_bytes();
    match bytes {
        [b'/'] => true,
        [b'/', b'/' | b'\\', ..] => false,
        [b'/', ..] => true,
        [b'~', b'/', rest @ ..] => !matches!(rest, [b'/' | b'\\', ..]),
        _ => false,
    }
}

/// Redirect target after a successful login.
pub(super) fn return_target(return_url: Option<&str>) -> String {
    match return_url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) if is_local_url(url) => url.strip_prefix('~').unwrap_or(url).to_string(),
        _ => HOME_PATH.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_paths_are_accepted() {
        assert!(is_local_url("/"));
        assert!(is_local_url("/Notes/5"));
        assert!(is_local_url("/Notes?id=5&tab=a"));
        assert!(is_local_url("~/Notes/5"));
    }

    #[test]
    fn external_and_protocol_relative_urls_are_rejected() {
        assert!(!is_local_url("https://evil.example/"));
        assert!(!is_local_url("//evil.example/"));
        assert!(!is_local_url("/\\evil.example/"));
        assert!(!is_local_url("~//evil.example/"));
        assert!(!is_local_url("Notes/5"));
        assert!(!is_local_url(""));
        assert!(!is_local_url("/Notes\n/5"));
        assert!(!is_local_url("javascript:alert(1)"));
    }

    #[test]
    fn return_target_falls_back_to_home() {
        assert_eq!(return_target(Some("/Notes/5")), "/Notes/5");
        assert_eq!(return_target(Some("~/Notes/5")), "/Notes/5");
        assert_eq!(return_target(Some("https://evil.example/")), HOME_PATH);
        assert_eq!(return_target(Some("  ")), HOME_PATH);
        assert_eq!(return_target(None), HOME_PATH);
    }
}
