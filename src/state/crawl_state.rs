/// Crawl task state definitions
///
/// A crawl task cycles through these states until it is cancelled. There is
/// no terminal state.
use std::fmt;

/// Represents where a crawl task currently is in its polling cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    /// Waiting for a rate limiter slot (or backing off after a failed fetch)
    Idle,

    /// A page request is in flight
    Fetching,

    /// Submissions from the last page are being handed to the store
    Delivering,
}

impl CrawlState {
    /// Returns true if the task may move from `self` to `next`
    ///
    /// `Fetching → Idle` covers a failed fetch: the cursor is kept and the
    /// task backs off before trying again.
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Fetching)
                | (Self::Fetching, Self::Delivering)
                | (Self::Fetching, Self::Idle)
                | (Self::Delivering, Self::Idle)
        )
    }

    /// Returns the state that follows `self` on the success path
    pub fn next(&self) -> Self {
        match self {
            Self::Idle => Self::Fetching,
            Self::Fetching => Self::Delivering,
            Self::Delivering => Self::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Delivering => "delivering",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
