use std::fmt;

/// Pagination marker for one forum's "new" feed
///
/// `Cursor::start()` is the beginning of the feed. Otherwise the cursor holds
/// the fullname of the newest submission seen so far, and the next request
/// asks only for items newer than it. A cursor lives inside its crawl task
/// and is never persisted.
///
/// If the anchoring submission is removed upstream, requests carrying it come
/// back empty. The crawl task resets to `start()` after a run of empty pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor(Option<String>);

impl Cursor {
    pub fn start() -> Self {
        Self(None)
    }

    pub fn at(fullname: impl Into<String>) -> Self {
        Self(Some(fullname.into()))
    }

    pub fn is_start(&self) -> bool {
        self.0.is_none()
    }

    /// The fullname to pass as the `before` query parameter, if any
    pub fn before(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_cursor() {
        let cursor = Cursor::start();
        assert!(cursor.is_start());
        assert_eq!(cursor.before(), None);
        assert_eq!(cursor.to_string(), "none");
        assert_eq!(cursor, Cursor::default());
    }

    #[test]
    fn test_positioned_cursor() {
        let cursor = Cursor::at("t3_abc");
        assert!(!cursor.is_start());
        assert_eq!(cursor.before(), Some("t3_abc"));
        assert_eq!(cursor.to_string(), "t3_abc");
    }
}
