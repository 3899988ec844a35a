use thiserror::Error;

/// Result type alias for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Network unreachable: {0}")]
    Unreachable(String),

    #[error("Unexpected status {status} for {url}")]
    BadStatus { url: String, status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid cache store name: {0}")]
    InvalidStoreName(String),

    #[error("Cache storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Client {0} is no longer reachable")]
    ClientGone(u64),

    #[error("Client {0} has too many unread messages")]
    ClientBusy(u64),
}

/// Maximum length for URLs quoted in error messages
const MAX_ERROR_URL_LENGTH: usize = 200;

impl ProxyError {
    /// Truncate a URL to keep log lines readable (data: URLs can be huge)
    fn truncate_url(url: &str) -> String {
        if url.len() <= MAX_ERROR_URL_LENGTH {
            url.to_string()
        } else {
            let cut: String = url.chars().take(MAX_ERROR_URL_LENGTH).collect();
            format!("{}... (truncated, {} total bytes)", cut, url.len())
        }
    }

    pub fn network(url: &str, source: reqwest::Error) -> Self {
        ProxyError::Network {
            url: Self::truncate_url(url),
            source,
        }
    }

    pub fn bad_status(url: &str, status: u16) -> Self {
        ProxyError::BadStatus {
            url: Self::truncate_url(url),
            status,
        }
    }

    /// True when no response could be obtained at all
    pub fn is_network(&self) -> bool {
        matches!(self, ProxyError::Network { .. } | ProxyError::Unreachable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_status_truncates_long_urls() {
        let url = format!("https://example.com/{}", "a".repeat(500));
        let err = ProxyError::bad_status(&url, 404);
        let msg = err.to_string();
        assert!(msg.contains("truncated"));
        assert!(msg.contains("404"));
    }

    #[test]
    fn test_short_url_kept_verbatim() {
        let err = ProxyError::bad_status("https://example.com/x", 500);
        assert_eq!(
            err.to_string(),
            "Unexpected status 500 for https://example.com/x"
        );
        assert!(!err.is_network());
    }

    #[test]
    fn test_unreachable_is_network() {
        assert!(ProxyError::Unreachable("offline".to_string()).is_network());
    }
}
