//! Owner/repository extraction from GitHub blob URLs.

/// Derives `(owner, repo)` from a canonical file URL such as
/// `https://github.com/rust-lang/rust/blob/master/src/main.rs`.
///
/// Everything from the first `/blob/` onwards is dropped, the rest is split
/// on `/` (ignoring trailing empty segments) and the last two segments are
/// returned. `None` when either segment would be empty.
pub fn parse_owner_repo(url: &str) -> Option<(String, String)> {
    let head = url.split("/blob/").next().unwrap_or(url);

    let mut segments: Vec<&str> = head.split('/').collect();
    while segments.last().is_some_and(|s| s.is_empty()) {
        segments.pop();
    }

    let n = segments.len();
    if n < 2 {
        return None;
    }
    let (owner, repo) = (segments[n - 2], segments[n - 1]);
    if owner.is_empty() || repo.is_empty() {
        return None;
    }

    Some((owner.to_string(), repo.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(owner: &str, repo: &str) -> Option<(String, String)> {
        Some((owner.to_string(), repo.to_string()))
    }

    #[test]
    fn canonical_blob_url() {
        assert_eq!(
            parse_owner_repo("https://github.com/rust-lang/rust/blob/master/src/main.rs"),
            pair("rust-lang", "rust")
        );
    }

    #[test]
    fn only_first_blob_delimiter_counts() {
        assert_eq!(
            parse_owner_repo("https://github.com/o/r/blob/main/docs/blob/readme.md"),
            pair("o", "r")
        );
    }

    #[test]
    fn url_without_blob_uses_last_two_segments() {
        assert_eq!(
            parse_owner_repo("https://github.com/owner/repo/"),
            pair("owner", "repo")
        );
    }

    #[test]
    fn missing_owner_is_rejected() {
        assert_eq!(parse_owner_repo("https://github.com/blob/main/a.rs"), None);
        assert_eq!(parse_owner_repo("repo/blob/main/a.rs"), None);
        assert_eq!(parse_owner_repo(""), None);
    }

    #[test]
    fn empty_middle_segment_is_rejected() {
        assert_eq!(parse_owner_repo("https://github.com//repo/blob/main/a.rs"), None);
    }
}
