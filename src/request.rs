//! Request URL construction
//!
//! Pure string formatting for the two endpoints the client talks to:
//!
//! - `GET {base}/configs/{appId}/{cluster}/{namespace}?ip=..&releaseKey=..`
//! - `GET {base}/notifications/v2?appId=..&cluster=..&notifications=[..]`
//!
//! Query values are strictly percent-encoded: only ASCII alphanumerics and
//! `-._~` pass through, so a space becomes `%20` and `!'()*` are escaped.
//! Identical inputs always produce identical URLs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::form_urlencoded;

/// Parameters for a configuration fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigUrlOptions {
    /// Config service base URL, e.g. `http://localhost:8080`
    pub server_base_url: String,
    pub app_id: String,
    pub cluster_name: String,
    pub namespace_name: String,
    /// Release key of the snapshot the caller already holds
    pub release_key: Option<String>,
    /// Client IP reported to the server for gray releases
    pub client_ip: Option<String>,
}

impl ConfigUrlOptions {
    pub fn new(
        server_base_url: impl Into<String>,
        app_id: impl Into<String>,
        cluster_name: impl Into<String>,
        namespace_name: impl Into<String>,
    ) -> Self {
        Self {
            server_base_url: server_base_url.into(),
            app_id: app_id.into(),
            cluster_name: cluster_name.into(),
            namespace_name: namespace_name.into(),
            release_key: None,
            client_ip: None,
        }
    }

    pub fn with_release_key(mut self, release_key: impl Into<String>) -> Self {
        self.release_key = Some(release_key.into());
        self
    }

    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = Some(client_ip.into());
        self
    }
}

/// Parameters for a notification long-poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationsUrlOptions {
    pub server_base_url: String,
    pub app_id: String,
    pub cluster_name: String,
}

impl NotificationsUrlOptions {
    pub fn new(
        server_base_url: impl Into<String>,
        app_id: impl Into<String>,
        cluster_name: impl Into<String>,
    ) -> Self {
        Self {
            server_base_url: server_base_url.into(),
            app_id: app_id.into(),
            cluster_name: cluster_name.into(),
        }
    }
}

/// Latest known notification id for one namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub namespace_name: String,
    pub notification_id: i64,
}

impl Notification {
    /// Notification id to send for a namespace that has never been fetched
    pub const INITIAL_ID: i64 = -1;

    pub fn new(namespace_name: impl Into<String>, notification_id: i64) -> Self {
        Self {
            namespace_name: namespace_name.into(),
            notification_id,
        }
    }
}

/// Percent-encode one query value, escaping everything outside `A-Za-z0-9-._~`
fn encode_component(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for piece in form_urlencoded::byte_serialize(value.as_bytes()) {
        match piece {
            "+" => encoded.push_str("%20"),
            "%7E" => encoded.push('~'),
            // `*` is left untouched inside runs of safe bytes
            run => encoded.push_str(&run.replace('*', "%2A")),
        }
    }
    encoded
}

fn encode_query(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, encode_component(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// JSON array `[{"namespaceName":..,"notificationId":..},..]` in input order
fn notifications_json(notifications: &[Notification]) -> String {
    let entries = notifications
        .iter()
        .map(|n| {
            let mut entry = Map::new();
            entry.insert("namespaceName".into(), Value::String(n.namespace_name.clone()));
            entry.insert("notificationId".into(), Value::from(n.notification_id));
            Value::Object(entry)
        })
        .collect();
    Value::Array(entries).to_string()
}

fn trim_base(base: &str) -> &str {
    base.strip_suffix('/').unwrap_or(base)
}

/// Build the configuration fetch URL
///
/// `ip` and `releaseKey` are only present when supplied and non-empty.
pub fn build_config_url(options: &ConfigUrlOptions) -> String {
    let mut pairs = Vec::with_capacity(2);
    if let Some(ip) = options.client_ip.as_deref().filter(|ip| !ip.is_empty()) {
        pairs.push(("ip", ip));
    }
    if let Some(release_key) = options.release_key.as_deref().filter(|key| !key.is_empty()) {
        pairs.push(("releaseKey", release_key));
    }

    format!(
        "{}/configs/{}/{}/{}?{}",
        trim_base(&options.server_base_url),
        options.app_id,
        options.cluster_name,
        options.namespace_name,
        encode_query(&pairs)
    )
}

/// Build the notification long-poll URL
///
/// The `notifications` parameter carries the JSON array of `notifications`
/// in the order given.
pub fn build_notifications_url(
    options: &NotificationsUrlOptions,
    notifications: &[Notification],
) -> String {
    let notifications = notifications_json(notifications);
    let query = encode_query(&[
        ("appId", options.app_id.as_str()),
        ("cluster", options.cluster_name.as_str()),
        ("notifications", notifications.as_str()),
    ]);

    format!(
        "{}/notifications/v2?{}",
        trim_base(&options.server_base_url),
        query
    )
}
