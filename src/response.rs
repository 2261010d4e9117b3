//! Response body decoding
//!
//! Config and notification responses share the same emptiness rule: an empty
//! body means "nothing new" rather than an error. Anything else must be the
//! expected JSON document.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ApolloError;
use crate::request::Notification;

/// Key/value configurations as served for `properties` namespaces
pub type Configurations = HashMap<String, String>;

/// One released configuration of a namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot<T = Configurations> {
    pub app_id: String,
    pub cluster: String,
    pub namespace_name: String,
    pub configurations: T,
    pub release_key: String,
}

/// Decode a configuration response body
pub fn decode_config<T: DeserializeOwned>(
    text: &str,
) -> Result<Option<ConfigSnapshot<T>>, ApolloError> {
    decode_json(text)
}

/// Decode a notification long-poll response body
pub fn decode_notifications(text: &str) -> Result<Option<Vec<Notification>>, ApolloError> {
    decode_json(text)
}

fn decode_json<T: DeserializeOwned>(text: &str) -> Result<Option<T>, ApolloError> {
    if text.is_empty() {
        return Ok(None);
    }
    // Data errors quote offending values; keep only the category and position.
    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| ApolloError::MalformedResponse {
            reason: format!(
                "{:?} error at line {} column {}",
                e.classify(),
                e.line(),
                e.column()
            ),
        })
}
