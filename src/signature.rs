//! Access-key request signing
//!
//! Namespaces protected by an access key only answer requests carrying
//!
//! ```text
//! Authorization: Apollo {appId}:{signature}
//! Timestamp: {unix millis}
//! ```
//!
//! where `signature = Base64(HMAC-SHA1(secret, "{timestamp}\n{pathWithQuery}"))`.
//! The resulting [`HeaderMap`] is passed straight to
//! [`ConfigClient`](crate::ConfigClient) fetches.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use sha1::Sha1;
use url::Url;

use crate::error::ApolloError;

type HmacSha1 = Hmac<Sha1>;

/// Header carrying the signing timestamp in milliseconds
pub const TIMESTAMP_HEADER: &str = "timestamp";

/// Compute the request signature for `path_with_query` at `timestamp_ms`
pub fn sign(timestamp_ms: i64, path_with_query: &str, secret: &str) -> Result<String, ApolloError> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| ApolloError::KeyFormat {
        reason: "access key secret rejected by HMAC".to_string(),
    })?;
    mac.update(format!("{}\n{}", timestamp_ms, path_with_query).as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Path plus query of an absolute URL, e.g. `/configs/a/c/n?ip=1.2.3.4`
pub fn path_with_query(url: &str) -> Result<String, ApolloError> {
    let parsed = Url::parse(url).map_err(|e| ApolloError::InvalidUrl(format!("{}: {}", url, e)))?;
    Ok(match parsed.query() {
        Some(query) if !query.is_empty() => format!("{}?{}", parsed.path(), query),
        _ => parsed.path().to_string(),
    })
}

/// Build the `Authorization` and `Timestamp` headers for a request to `url`
pub fn auth_headers(
    app_id: &str,
    secret: &str,
    url: &str,
    timestamp_ms: i64,
) -> Result<HeaderMap, ApolloError> {
    let signature = sign(timestamp_ms, &path_with_query(url)?, secret)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Apollo {}:{}", app_id, signature)).map_err(|_| {
            ApolloError::InvalidHeader {
                name: AUTHORIZATION.to_string(),
            }
        })?,
    );
    headers.insert(
        HeaderName::from_static(TIMESTAMP_HEADER),
        HeaderValue::from(timestamp_ms),
    );
    Ok(headers)
}

/// [`auth_headers`] stamped with the current wall-clock time
pub fn auth_headers_now(app_id: &str, secret: &str, url: &str) -> Result<HeaderMap, ApolloError> {
    auth_headers(app_id, secret, url, chrono::Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "33d3e923b5df4d12be3c7fb43a5d7bd8";
    const TIMESTAMP: i64 = 1576478257344;

    #[test]
    fn test_sign_known_vector() {
        let signature = sign(
            TIMESTAMP,
            "/configs/100004458/default/application?ip=10.0.0.1",
            SECRET,
        )
        .unwrap();
        assert_eq!(signature, "zBRKYwo1p99IrIfqkDOhksNp0C0=");
    }

    #[test]
    fn test_path_with_query() {
        assert_eq!(
            path_with_query("http://localhost:8080/configs/a/default/application?ip=10.0.0.1").unwrap(),
            "/configs/a/default/application?ip=10.0.0.1"
        );
        assert_eq!(
            path_with_query("http://localhost:8080/notifications/v2").unwrap(),
            "/notifications/v2"
        );
        assert_eq!(
            path_with_query("http://localhost:8080/configs/a/default/application?").unwrap(),
            "/configs/a/default/application"
        );
        assert!(matches!(
            path_with_query("/relative/only"),
            Err(ApolloError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_auth_headers() {
        let headers = auth_headers(
            "100004458",
            SECRET,
            "http://config.example.com/configs/100004458/default/application?ip=10.0.0.1",
            TIMESTAMP,
        )
        .unwrap();

        assert_eq!(
            headers.get(AUTHORIZATION).unwrap(),
            "Apollo 100004458:zBRKYwo1p99IrIfqkDOhksNp0C0="
        );
        assert_eq!(headers.get("timestamp").unwrap(), "1576478257344");
    }

    #[test]
    fn test_auth_headers_now_uses_current_time() {
        let before = chrono::Utc::now().timestamp_millis();
        let headers = auth_headers_now("app", "secret", "http://host/configs/app/default/application?").unwrap();
        let stamped: i64 = headers
            .get(TIMESTAMP_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(stamped >= before);
    }
}
