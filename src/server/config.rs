use super::RequestsLoggingLevel;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    /// Suggestion count used when a request does not set one.
    pub default_suggestion_count: usize,
    /// Upper bound for the `count` field of suggestion requests.
    pub max_suggestion_count: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 6001,
            default_suggestion_count: 30,
            max_suggestion_count: 100,
        }
    }
}
