use std::sync::atomic::{AtomicU64, Ordering};

/// Mints `u<n>` tokens from a process-wide monotonic counter.
///
/// A token is never handed out twice by the same minter.
#[derive(Debug, Default)]
pub struct TokenMinter {
    counter: AtomicU64,
}

impl TokenMinter {
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("u{}", n)
    }
}

/// Turn a unique bus name (":1.42") into the form used in portal object paths ("1_42")
pub fn sender_path_element(unique_name: &str) -> String {
    unique_name.trim_start_matches(':').replace('.', "_")
}

pub fn request_path_namespace(sender: &str) -> String {
    format!("{}/request/{}", super::PORTAL_PATH, sender)
}

pub fn session_path(sender: &str, token: &str) -> String {
    format!("{}/session/{}/{}", super::PORTAL_PATH, sender, token)
}

/// Token part of a request object path
pub fn token_from_request_path(path: &str) -> Option<&str> {
    path.rsplit_once('/')
        .map(|(_, token)| token)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tokens_are_monotonic_and_unique() {
        let minter = TokenMinter::new();
        assert_eq!(minter.next(), "u1");
        assert_eq!(minter.next(), "u2");

        let seen: HashSet<String> = (0..1000).map(|_| minter.next()).collect();
        assert_eq!(seen.len(), 1000);
        assert!(!seen.contains("u1"));
    }

    #[test]
    fn independent_minters_count_separately() {
        let requests = TokenMinter::new();
        let sessions = TokenMinter::new();
        requests.next();
        requests.next();
        assert_eq!(sessions.next(), "u1");
    }

    #[test]
    fn builds_portal_paths() {
        let sender = sender_path_element(":1.42");
        assert_eq!(sender, "1_42");
        assert_eq!(
            request_path_namespace(&sender),
            "/org/freedesktop/portal/desktop/request/1_42"
        );
        assert_eq!(
            session_path(&sender, "u1"),
            "/org/freedesktop/portal/desktop/session/1_42/u1"
        );
    }

    #[test]
    fn extracts_token_from_request_path() {
        assert_eq!(
            token_from_request_path("/org/freedesktop/portal/desktop/request/1_42/u7"),
            Some("u7")
        );
        assert_eq!(token_from_request_path("/trailing/"), None);
        assert_eq!(token_from_request_path("no-slash"), None);
    }
}
