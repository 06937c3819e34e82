//! Remote URL parsing.

/// Parse a GitHub remote URL into `(owner, repo)`.
///
/// Accepts the SSH (`git@github.com:owner/repo.git`), HTTPS and
/// `ssh://git@github.com/owner/repo` forms.
#[must_use]
pub fn parse_github_remote(url: &str) -> Option<(String, String)> {
    let url = url.trim();
    let rest = url
        .strip_prefix("git@github.com:")
        .or_else(|| url.strip_prefix("https://github.com/"))
        .or_else(|| url.strip_prefix("ssh://git@github.com/"))?;
    let path = rest.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, repo) = path.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ssh_remote() {
        assert_eq!(
            parse_github_remote("git@github.com:acme/widgets.git"),
            Some(("acme".to_string(), "widgets".to_string()))
        );
    }

    #[test]
    fn test_parse_https_remote() {
        assert_eq!(
            parse_github_remote("https://github.com/acme/widgets"),
            Some(("acme".to_string(), "widgets".to_string()))
        );
        assert_eq!(
            parse_github_remote("ssh://git@github.com/acme/widgets.git\n"),
            Some(("acme".to_string(), "widgets".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_other_hosts() {
        assert_eq!(parse_github_remote("https://gitlab.com/acme/widgets.git"), None);
        assert_eq!(parse_github_remote("git@github.com:acme"), None);
    }
}
