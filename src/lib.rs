pub mod config;
pub mod decrypt;
mod error;
pub mod key;
pub mod prelude;
pub mod request;
pub mod response;
pub mod signature;
pub mod transport;

pub use config::ClientConfig;
pub use decrypt::{decrypt_response_body, BlockDecryptor, ChunkedRsaDecryptor};
pub use error::ApolloError;
pub use key::PrivateKeyHandle;
pub use request::{
    build_config_url, build_notifications_url, ConfigUrlOptions, Notification,
    NotificationsUrlOptions,
};
pub use response::{ConfigSnapshot, Configurations};
pub use transport::{is_encrypted_response, ConfigClient, ENCRYPTION_SIGNAL_HEADERS};
