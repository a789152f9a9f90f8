//! Endpoint link handling.
//!
//! A link is the configured prefix followed by a username segment, optionally with a query string
//! (`https://ngl.link/alice?ref=share`). The query is never part of the recipient.

use url::Url;

pub const DEFAULT_LINK_PREFIX: &str = "https://ngl.link/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    WrongPrefix,
    MissingUsername,
    Malformed(String),
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkError::WrongPrefix => write!(f, "link does not start with the expected prefix"),
            LinkError::MissingUsername => write!(f, "link has no username"),
            LinkError::Malformed(e) => write!(f, "malformed link: {}", e),
        }
    }
}

impl std::error::Error for LinkError {}

/// Checks user input and returns the link as it should be stored.
pub fn validate(input: &str, prefix: &str) -> Result<String, LinkError> {
    let trimmed = input.trim();
    recipient_username(trimmed, prefix)?;
    Ok(trimmed.to_string())
}

/// Extracts the recipient username, dropping any query string or fragment.
pub fn recipient_username(link: &str, prefix: &str) -> Result<String, LinkError> {
    let rest = link.strip_prefix(prefix).ok_or(LinkError::WrongPrefix)?;

    let parsed = Url::parse(link).map_err(|e| LinkError::Malformed(e.to_string()))?;
    if parsed.host_str().is_none() {
        return Err(LinkError::Malformed("missing host".into()));
    }

    let username = rest
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');

    if username.is_empty() || username.contains('/') || username.contains(char::is_whitespace) {
        return Err(LinkError::MissingUsername);
    }

    Ok(username.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_link() {
        assert_eq!(
            validate("https://ngl.link/alice", DEFAULT_LINK_PREFIX),
            Ok("https://ngl.link/alice".to_string())
        );
    }

    #[test]
    fn test_trims_surrounding_whitespace() {
        assert_eq!(
            validate("  https://ngl.link/alice \n", DEFAULT_LINK_PREFIX),
            Ok("https://ngl.link/alice".to_string())
        );
    }

    #[test]
    fn test_rejects_other_hosts() {
        assert_eq!(
            validate("http://wrong.com/x", DEFAULT_LINK_PREFIX),
            Err(LinkError::WrongPrefix)
        );
        assert_eq!(
            validate("http://ngl.link/alice", DEFAULT_LINK_PREFIX),
            Err(LinkError::WrongPrefix)
        );
    }

    #[test]
    fn test_rejects_missing_username() {
        assert_eq!(
            validate("https://ngl.link/", DEFAULT_LINK_PREFIX),
            Err(LinkError::MissingUsername)
        );
        assert_eq!(
            validate("https://ngl.link/?x=1", DEFAULT_LINK_PREFIX),
            Err(LinkError::MissingUsername)
        );
    }

    #[test]
    fn test_username_strips_query_string() {
        assert_eq!(
            recipient_username("https://ngl.link/alice?lng=en", DEFAULT_LINK_PREFIX),
            Ok("alice".to_string())
        );
        assert_eq!(
            recipient_username("https://ngl.link/bob/", DEFAULT_LINK_PREFIX),
            Ok("bob".to_string())
        );
    }
}
