use std::time::Duration;

/// Default time after which an unanswered request is forgotten.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Node behavior configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Age after which a pending request is swept without a callback.
    pub reply_timeout: Duration,
    /// Answer discovery queries with a self-report.
    pub answer_queries: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            answer_queries: true,
        }
    }
}
