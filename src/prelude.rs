//! Apollo client prelude
//!
//! The prelude module provides a convenient way to import the types needed for
//! a typical fetch/long-poll loop.
//!
//! # Example
//!
//! ```rust
//! use apollo_client::prelude::*;
//!
//! let options = NotificationsUrlOptions::new("http://localhost:8080", "demo", "default");
//! let url = build_notifications_url(&options, &[Notification::new("application", -1)]);
//! assert!(url.starts_with("http://localhost:8080/notifications/v2?appId=demo"));
//! ```

pub use crate::config::ClientConfig;
pub use crate::decrypt::{BlockDecryptor, ChunkedRsaDecryptor};
pub use crate::error::ApolloError;
pub use crate::key::PrivateKeyHandle;
pub use crate::request::{
    build_config_url, build_notifications_url, ConfigUrlOptions, Notification,
    NotificationsUrlOptions,
};
pub use crate::response::{ConfigSnapshot, Configurations};
pub use crate::signature::auth_headers_now;
pub use crate::transport::ConfigClient;
