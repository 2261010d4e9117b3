//! Unified error type for the Apollo client
//!
//! Every fallible operation in the crate returns [`ApolloError`]. The variants
//! fall into three categories that callers usually treat differently:
//!
//! - **Transient**: the server or network misbehaved; retrying later may help
//!   ([`ApolloError::HttpStatus`], [`ApolloError::Transport`])
//! - **Fatal configuration**: bad or missing key material, invalid inputs
//!   ([`ApolloError::KeyFormat`], [`ApolloError::MissingKey`], ...)
//! - **Data corruption**: the response could not be decrypted or parsed
//!   ([`ApolloError::Decryption`], [`ApolloError::MalformedResponse`], ...)
//!
//! None of these are retried inside the crate.
//!
//! # Example
//!
//! ```
//! use apollo_client::ApolloError;
//!
//! let err = ApolloError::HttpStatus {
//!     status: 503,
//!     text: "Service Unavailable".to_string(),
//! };
//! assert!(err.is_transient());
//! assert_eq!(err.error_code(), "HTTP_STATUS");
//! ```

use thiserror::Error;

/// Errors produced while talking to the configuration service
///
/// Messages never contain response bodies or decrypted content.
#[derive(Debug, Error)]
pub enum ApolloError {
    /// Base64 or DER/PKCS#8 decoding of the private key failed
    #[error("invalid private key material: {reason}")]
    KeyFormat { reason: String },

    /// The server encrypted the response but no private key was supplied
    #[error("response is encrypted but no private key was supplied")]
    MissingKey,

    /// RSA decryption of one ciphertext chunk failed
    #[error("RSA decryption failed for chunk {chunk_index}: {reason}")]
    Decryption { chunk_index: usize, reason: String },

    /// Decrypted bytes are not valid UTF-8
    #[error("decrypted payload is not valid UTF-8")]
    InvalidPlaintext,

    /// A chunk size of zero was requested
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    /// Server answered with something other than 200 or 304
    #[error("HTTP request error: {status}, {text}")]
    HttpStatus { status: u16, text: String },

    /// Non-empty body that is not the expected JSON document
    #[error("malformed response body: {reason}")]
    MalformedResponse { reason: String },

    /// DNS, connect, TLS, or body read failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL could not be parsed
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Header name or value rejected by the HTTP layer
    #[error("invalid header value for '{name}'")]
    InvalidHeader { name: String },
}

impl ApolloError {
    /// Returns true if the error might be resolved by retrying later
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::HttpStatus { .. } | Self::Transport(_))
    }

    /// Returns true if the caller's setup must change before retrying
    pub fn is_fatal_config(&self) -> bool {
        matches!(
            self,
            Self::KeyFormat { .. }
                | Self::MissingKey
                | Self::InvalidChunkSize
                | Self::InvalidUrl(_)
                | Self::InvalidHeader { .. }
        )
    }

    /// Returns true if the server delivered data that could not be decoded
    pub fn is_data_corruption(&self) -> bool {
        matches!(
            self,
            Self::Decryption { .. } | Self::InvalidPlaintext | Self::MalformedResponse { .. }
        )
    }

    /// Returns a suggestion for how to fix this error, if available
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::KeyFormat { .. } => {
                Some("Supply the private key as Base64 of the DER-encoded PKCS#8 document")
            }
            Self::MissingKey => Some("Configure the RSA private key matching the server's public key"),
            Self::Decryption { .. } => {
                Some("Check that the private key matches the key the server encrypts for")
            }
            Self::HttpStatus { status, .. } if *status == 401 => {
                Some("Verify the access key secret used to sign requests")
            }
            Self::HttpStatus { status, .. } if *status == 404 => {
                Some("Check the app id, cluster and namespace names")
            }
            _ => None,
        }
    }

    /// Returns an error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::KeyFormat { .. } => "KEY_FORMAT",
            Self::MissingKey => "MISSING_KEY",
            Self::Decryption { .. } => "DECRYPTION",
            Self::InvalidPlaintext => "INVALID_PLAINTEXT",
            Self::InvalidChunkSize => "INVALID_CHUNK_SIZE",
            Self::HttpStatus { .. } => "HTTP_STATUS",
            Self::MalformedResponse { .. } => "MALFORMED_RESPONSE",
            Self::Transport(_) => "TRANSPORT",
            Self::InvalidUrl(_) => "INVALID_URL",
            Self::InvalidHeader { .. } => "INVALID_HEADER",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let status = ApolloError::HttpStatus {
            status: 500,
            text: "Internal Server Error".to_string(),
        };
        assert!(status.is_transient());
        assert!(!status.is_fatal_config());
        assert!(!status.is_data_corruption());

        assert!(ApolloError::MissingKey.is_fatal_config());
        assert!(ApolloError::KeyFormat {
            reason: "bad".to_string()
        }
        .is_fatal_config());

        let corrupt = ApolloError::Decryption {
            chunk_index: 3,
            reason: "decryption error".to_string(),
        };
        assert!(corrupt.is_data_corruption());
        assert!(!corrupt.is_transient());
        assert!(ApolloError::MalformedResponse {
            reason: "expected value".to_string()
        }
        .is_data_corruption());
    }

    #[test]
    fn test_error_display() {
        let err = ApolloError::HttpStatus {
            status: 500,
            text: "Internal Server Error".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP request error: 500, Internal Server Error");

        let err = ApolloError::Decryption {
            chunk_index: 2,
            reason: "decryption error".to_string(),
        };
        assert!(err.to_string().contains("chunk 2"));
    }

    #[test]
    fn test_suggestions() {
        assert!(ApolloError::MissingKey.suggestion().is_some());
        let not_found = ApolloError::HttpStatus {
            status: 404,
            text: "Not Found".to_string(),
        };
        assert!(not_found.suggestion().unwrap().contains("namespace"));
        assert!(ApolloError::InvalidPlaintext.suggestion().is_none());
    }
}
