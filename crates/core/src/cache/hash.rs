//! Request identity keys for the cache store.

use sha2::{Digest, Sha256};

/// Compute the store key for a request: SHA-256 over the upper-cased
/// method and the full URL, hex encoded.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stability() {
        let a = compute_request_key("GET", "https://example.com/index.html");
        let b = compute_request_key("GET", "https://example.com/index.html");
        assert_eq!(a, b);
    }

    #[test]
    fn test_method_case_insensitive() {
        assert_eq!(
            compute_request_key("get", "https://example.com/"),
            compute_request_key("GET", "https://example.com/")
        );
    }

    #[test]
    fn test_method_distinguishes() {
        assert_ne!(
            compute_request_key("GET", "https://example.com/contact"),
            compute_request_key("POST", "https://example.com/contact")
        );
    }

    #[test]
    fn test_query_distinguishes() {
        assert_ne!(
            compute_request_key("GET", "https://example.com/data/team.json"),
            compute_request_key("GET", "https://example.com/data/team.json?v=2")
        );
    }

    #[test]
    fn test_key_format() {
        let key = compute_request_key("GET", "https://example.com/");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
