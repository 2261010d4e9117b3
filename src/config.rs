//! Client timeouts and identification

use std::env;
use std::time::Duration;

/// Default timeout for ordinary config fetches
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default timeout for the notification long-poll
///
/// The server holds the request for up to 60 seconds before answering 304,
/// so this must stay comfortably above that.
pub const DEFAULT_LONG_POLL_TIMEOUT: Duration = Duration::from_secs(70);
/// Default TCP/TLS connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP behaviour of a [`ConfigClient`](crate::ConfigClient)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub request_timeout: Duration,
    pub long_poll_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            long_poll_timeout: DEFAULT_LONG_POLL_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: format!("apollo-client-rust/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `APOLLO_REQUEST_TIMEOUT_MS`,
    /// `APOLLO_LONG_POLL_TIMEOUT_MS` and `APOLLO_CONNECT_TIMEOUT_MS`
    pub fn from_env() -> Self {
        Self::from_env_iter(env::vars())
    }

    /// Same as [`ClientConfig::from_env`] over an explicit variable list
    pub fn from_env_iter<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in vars {
            let target = match key.as_ref() {
                "APOLLO_REQUEST_TIMEOUT_MS" => &mut config.request_timeout,
                "APOLLO_LONG_POLL_TIMEOUT_MS" => &mut config.long_poll_timeout,
                "APOLLO_CONNECT_TIMEOUT_MS" => &mut config.connect_timeout,
                _ => continue,
            };
            match value.as_ref().trim().parse::<u64>() {
                Ok(ms) if ms > 0 => *target = Duration::from_millis(ms),
                _ => tracing::warn!(
                    variable = key.as_ref(),
                    value = value.as_ref(),
                    "ignoring invalid timeout override"
                ),
            }
        }
        config
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_long_poll_timeout(mut self, timeout: Duration) -> Self {
        self.long_poll_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
