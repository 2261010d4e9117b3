//! HTTP exchange with the configuration service
//!
//! [`ConfigClient`] issues the GET requests produced by the
//! [`request`](crate::request) builders and turns responses into typed
//! results:
//!
//! - `304 Not Modified` → `Ok(None)`, the body is never read
//! - anything other than `200`/`304` → [`ApolloError::HttpStatus`]
//! - bodies flagged as encrypted by a response header are decrypted with the
//!   caller's [`PrivateKeyHandle`] before parsing
//! - empty bodies → `Ok(None)`
//!
//! Both fetches are ordinary futures. Dropping one cancels the request and
//! releases its connection.
//!
//! # Example
//!
//! ```no_run
//! use apollo_client::{build_config_url, ConfigClient, ConfigUrlOptions};
//! use reqwest::header::HeaderMap;
//!
//! # async fn example() -> Result<(), apollo_client::ApolloError> {
//! let client = ConfigClient::new(Default::default())?;
//! let url = build_config_url(&ConfigUrlOptions::new(
//!     "http://localhost:8080",
//!     "demo",
//!     "default",
//!     "application",
//! ));
//! if let Some(snapshot) = client
//!     .fetch_config::<apollo_client::Configurations>(&url, None, HeaderMap::new())
//!     .await?
//! {
//!     println!("release {}", snapshot.release_key);
//! }
//! # Ok(())
//! # }
//! ```

use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::decrypt::ChunkedRsaDecryptor;
use crate::error::ApolloError;
use crate::key::PrivateKeyHandle;
use crate::request::Notification;
use crate::response::{decode_config, decode_notifications, ConfigSnapshot};

/// Response headers that mark a body as RSA-encrypted when set to `"true"`
pub const ENCRYPTION_SIGNAL_HEADERS: [&str; 3] =
    ["HTX_CRYPTO_ENABLE", "APOLLO_SECRET_KEY", "HEADER_ENCRYPT_FLAG"];

/// Returns true if any encryption signal header is set to the literal `"true"`
///
/// Header names are matched case-insensitively.
pub fn is_encrypted_response(headers: &HeaderMap) -> bool {
    ENCRYPTION_SIGNAL_HEADERS.iter().any(|name| {
        headers
            .get_all(*name)
            .iter()
            .any(|value| value.as_bytes() == b"true")
    })
}

/// Client for the config and notification endpoints
#[derive(Debug, Clone)]
pub struct ConfigClient {
    http_client: Client,
    config: ClientConfig,
}

impl ConfigClient {
    /// Build a client with its own connection pool
    pub fn new(config: ClientConfig) -> Result<Self, ApolloError> {
        let http_client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// Reuse an existing `reqwest::Client`
    ///
    /// Timeouts from `config` are still applied per request.
    pub fn with_http_client(http_client: Client, config: ClientConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch the latest configuration of one namespace
    ///
    /// Returns `Ok(None)` when the server answers `304` or sends an empty body.
    /// Encrypted bodies require `private_key`; without it the call fails with
    /// [`ApolloError::MissingKey`] before any decryption is attempted.
    pub async fn fetch_config<T: DeserializeOwned>(
        &self,
        url: &str,
        private_key: Option<&PrivateKeyHandle>,
        headers: HeaderMap,
    ) -> Result<Option<ConfigSnapshot<T>>, ApolloError> {
        let response = self
            .http_client
            .get(url)
            .headers(headers)
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        let Some(response) = check_status(url, response)? else {
            return Ok(None);
        };

        let encrypted = is_encrypted_response(response.headers());
        tracing::debug!(
            url = %url,
            encrypted = encrypted,
            content_length = ?response.content_length(),
            "config response received"
        );

        let text = if encrypted {
            let Some(key) = private_key else {
                tracing::warn!(url = %url, "encrypted config response but no private key configured");
                return Err(ApolloError::MissingKey);
            };
            let body = response.bytes().await?;
            ChunkedRsaDecryptor::new(key).decrypt(&body)?
        } else {
            response.text().await?
        };

        decode_config(&text)
    }

    /// Long-poll for namespace changes
    ///
    /// Blocks until the server reports a change, answers `304`, or the
    /// long-poll timeout elapses. A timeout returns `Ok(None)` just like `304`;
    /// the caller is expected to reissue the call right away.
    pub async fn fetch_notifications(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> Result<Option<Vec<Notification>>, ApolloError> {
        let sent = self
            .http_client
            .get(url)
            .headers(headers)
            .timeout(self.config.long_poll_timeout)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Ok(long_poll_timed_out(url)),
            Err(e) => return Err(e.into()),
        };

        let Some(response) = check_status(url, response)? else {
            return Ok(None);
        };

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) if e.is_timeout() => return Ok(long_poll_timed_out(url)),
            Err(e) => return Err(e.into()),
        };

        decode_notifications(&text)
    }
}

fn long_poll_timed_out<T>(url: &str) -> Option<T> {
    tracing::debug!(url = %url, "long poll timed out without changes");
    None
}

/// Maps the status line: `None` for 304, the response for 200, an error otherwise
fn check_status(url: &str, response: Response) -> Result<Option<Response>, ApolloError> {
    let status = response.status();
    match status {
        StatusCode::OK => Ok(Some(response)),
        StatusCode::NOT_MODIFIED => {
            tracing::debug!(url = %url, "not modified");
            Ok(None)
        }
        _ => {
            tracing::debug!(url = %url, status = %status, "unexpected response status");
            Err(ApolloError::HttpStatus {
                status: status.as_u16(),
                text: status_text(status),
            })
        }
    }
}

/// Canonical reason phrase, or the numeric code when the status has none
fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
        map
    }

    #[test]
    fn test_encryption_signal_headers() {
        assert!(!is_encrypted_response(&HeaderMap::new()));
        assert!(is_encrypted_response(&headers(&[("htx_crypto_enable", "true")])));
        assert!(is_encrypted_response(&headers(&[("apollo_secret_key", "true")])));
        assert!(is_encrypted_response(&headers(&[("header_encrypt_flag", "true")])));
    }

    #[test]
    fn test_encryption_signal_requires_literal_true() {
        assert!(!is_encrypted_response(&headers(&[("htx_crypto_enable", "false")])));
        assert!(!is_encrypted_response(&headers(&[("htx_crypto_enable", "1")])));
        assert!(!is_encrypted_response(&headers(&[("htx_crypto_enable", "TRUE")])));
        assert!(!is_encrypted_response(&headers(&[("x-encrypted", "true")])));
    }

    #[test]
    fn test_encryption_signal_any_repeated_value() {
        assert!(is_encrypted_response(&headers(&[
            ("apollo_secret_key", "false"),
            ("apollo_secret_key", "true"),
        ])));
    }

    #[test]
    fn test_status_text() {
        assert_eq!(status_text(StatusCode::INTERNAL_SERVER_ERROR), "Internal Server Error");
        assert_eq!(status_text(StatusCode::from_u16(599).unwrap()), "599");
    }

    #[test]
    fn test_client_keeps_config() {
        let config = ClientConfig::default().with_user_agent("tests/1.0");
        let client = ConfigClient::new(config.clone()).unwrap();
        assert_eq!(client.config(), &config);
    }
}
