use std::collections::HashMap;
use std::env;
use std::error::Error;
use std::time::Duration;

use apollo_client::{
    build_config_url, build_notifications_url, signature, ApolloError, ClientConfig,
    ConfigClient, ConfigSnapshot, ConfigUrlOptions, Configurations, Notification,
    NotificationsUrlOptions, PrivateKeyHandle,
};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use reqwest::header::HeaderMap;
use tracing::{debug, error, info, warn};
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Read when neither `--private-key` nor `APOLLO_PRIVATE_KEY` is set
const RSA_KEY_FALLBACK_ENV: &str = "APOLLO_RSA_PRIVATE_KEY";

const MIN_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(120);

#[derive(Parser, Debug)]
#[command(name = "apollo-watch")]
#[command(about = "Fetch Apollo configuration namespaces and print every new release")]
#[command(version)]
struct Cli {
    /// Config service base URL
    #[arg(long, env = "APOLLO_CONFIG_SERVER_URL")]
    server_url: String,

    /// Application id
    #[arg(long, env = "APOLLO_APP_ID")]
    app_id: String,

    /// Cluster name
    #[arg(long, env = "APOLLO_CLUSTER", default_value = "default")]
    cluster: String,

    /// Comma separated namespaces to watch
    #[arg(
        long,
        env = "APOLLO_NAMESPACES",
        value_delimiter = ',',
        default_value = "application"
    )]
    namespaces: Vec<String>,

    /// Sign requests with this access key secret
    #[arg(long, env = "APOLLO_ACCESS_KEY_SECRET", hide_env_values = true)]
    access_key_secret: Option<String>,

    /// Client IP reported to the service for gray releases
    #[arg(long, env = "APOLLO_CLIENT_IP")]
    client_ip: Option<String>,

    /// Base64 of the DER-encoded PKCS#8 RSA private key for encrypted namespaces
    /// (falls back to APOLLO_RSA_PRIVATE_KEY)
    #[arg(long, env = "APOLLO_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Fetch every namespace once and exit
    #[arg(long)]
    once: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct WatchOptions {
    server_url: String,
    app_id: String,
    cluster: String,
    namespaces: Vec<String>,
    access_key_secret: Option<String>,
    client_ip: Option<String>,
    private_key: Option<String>,
    once: bool,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Cli {
    /// Normalise parsed arguments; `rsa_key_fallback` is consulted only when
    /// no other key source is set
    fn into_options(self, rsa_key_fallback: Option<String>) -> Result<WatchOptions, String> {
        let server_url = non_blank(Some(self.server_url)).ok_or("server url is empty")?;
        let app_id = non_blank(Some(self.app_id)).ok_or("app id is empty")?;
        let namespaces: Vec<String> = self
            .namespaces
            .iter()
            .map(|ns| ns.trim())
            .filter(|ns| !ns.is_empty())
            .map(String::from)
            .collect();
        if namespaces.is_empty() {
            return Err("no namespace to watch".to_string());
        }

        Ok(WatchOptions {
            server_url,
            app_id,
            cluster: non_blank(Some(self.cluster)).unwrap_or_else(|| "default".to_string()),
            namespaces,
            access_key_secret: non_blank(self.access_key_secret),
            client_ip: non_blank(self.client_ip),
            private_key: non_blank(self.private_key).or_else(|| non_blank(rsa_key_fallback)),
            once: self.once,
        })
    }
}

/// Capped exponential delay between failed attempts
#[derive(Debug, Clone, Copy)]
struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            current: min,
        }
    }

    fn reset(&mut self) {
        self.current = self.min;
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (delay * 2).min(self.max);
        delay
    }
}

/// Server, network and undecodable-payload errors are retried; configuration errors are not
fn is_retryable(e: &ApolloError) -> bool {
    e.is_transient() || e.is_data_corruption()
}

/// Per-namespace progress of the watch loop
#[derive(Debug, Default)]
struct NamespaceState {
    notification_id: Option<i64>,
    release_key: Option<String>,
}

struct Watcher {
    options: WatchOptions,
    client: ConfigClient,
    private_key: Option<PrivateKeyHandle>,
    state: HashMap<String, NamespaceState>,
    backoff: Backoff,
}

impl Watcher {
    fn new(options: WatchOptions) -> Result<Self, ApolloError> {
        let private_key = options
            .private_key
            .as_deref()
            .map(PrivateKeyHandle::from_base64_der)
            .transpose()?;
        if let Some(key) = &private_key {
            info!(modulus_bits = key.modulus_len() * 8, "loaded private key");
        }
        let state = options
            .namespaces
            .iter()
            .map(|ns| (ns.clone(), NamespaceState::default()))
            .collect();

        Ok(Self {
            client: ConfigClient::new(ClientConfig::from_env())?,
            options,
            private_key,
            state,
            backoff: Backoff::new(MIN_RETRY_DELAY, MAX_RETRY_DELAY),
        })
    }

    fn headers_for(&self, url: &str) -> Result<HeaderMap, ApolloError> {
        match &self.options.access_key_secret {
            Some(secret) => signature::auth_headers_now(&self.options.app_id, secret, url),
            None => Ok(HeaderMap::new()),
        }
    }

    async fn refresh(&mut self, namespace: &str) -> Result<(), ApolloError> {
        let mut url_options = ConfigUrlOptions::new(
            self.options.server_url.as_str(),
            self.options.app_id.as_str(),
            self.options.cluster.as_str(),
            namespace,
        );
        if let Some(release_key) = self.state.get(namespace).and_then(|s| s.release_key.clone()) {
            url_options = url_options.with_release_key(release_key);
        }
        if let Some(ip) = &self.options.client_ip {
            url_options = url_options.with_client_ip(ip.as_str());
        }
        let url = build_config_url(&url_options);
        let headers = self.headers_for(&url)?;

        let fetched: Option<ConfigSnapshot<Configurations>> = self
            .client
            .fetch_config(&url, self.private_key.as_ref(), headers)
            .await?;

        match fetched {
            Some(snapshot) => {
                info!(
                    namespace = namespace,
                    release_key = %snapshot.release_key,
                    keys = snapshot.configurations.len(),
                    "configuration updated"
                );
                print_snapshot(&snapshot);
                self.state.entry(namespace.to_string()).or_default().release_key =
                    Some(snapshot.release_key);
            }
            None => debug!(namespace = namespace, "configuration unchanged"),
        }
        Ok(())
    }

    async fn refresh_all(&mut self) -> Result<(), ApolloError> {
        for namespace in self.options.namespaces.clone() {
            self.refresh(&namespace).await?;
        }
        Ok(())
    }

    /// One long-poll round; returns the notifications whose id moved
    ///
    /// Ids are not stored here. They are committed once the namespace has
    /// been refreshed, so a failed refresh is polled for again.
    async fn poll(&self) -> Result<Vec<Notification>, ApolloError> {
        let notifications: Vec<Notification> = self
            .options
            .namespaces
            .iter()
            .map(|ns| {
                let id = self
                    .state
                    .get(ns)
                    .and_then(|s| s.notification_id)
                    .unwrap_or(Notification::INITIAL_ID);
                Notification::new(ns.as_str(), id)
            })
            .collect();
        let url = build_notifications_url(
            &NotificationsUrlOptions::new(
                self.options.server_url.as_str(),
                self.options.app_id.as_str(),
                self.options.cluster.as_str(),
            ),
            &notifications,
        );
        let headers = self.headers_for(&url)?;

        let Some(changes) = self.client.fetch_notifications(&url, headers).await? else {
            return Ok(Vec::new());
        };

        Ok(changes
            .into_iter()
            .filter(|change| match self.state.get(&change.namespace_name) {
                Some(state) => state.notification_id != Some(change.notification_id),
                None => {
                    warn!(namespace = %change.namespace_name, "notification for unwatched namespace");
                    false
                }
            })
            .collect())
    }

    async fn poll_and_refresh(&mut self) -> Result<(), ApolloError> {
        for change in self.poll().await? {
            self.refresh(&change.namespace_name).await?;
            if let Some(state) = self.state.get_mut(&change.namespace_name) {
                state.notification_id = Some(change.notification_id);
            }
        }
        Ok(())
    }

    async fn wait_before_retry(&mut self, e: &ApolloError, message: &str) {
        let delay = self.backoff.next_delay();
        warn!(
            error = %e,
            code = e.error_code(),
            retry_in_ms = delay.as_millis() as u64,
            "{}",
            message
        );
        tokio::time::sleep(delay).await;
    }

    /// Fetch every namespace, retrying until it succeeds or fails fatally
    async fn initial_fetch(&mut self) -> Result<(), ApolloError> {
        loop {
            match self.refresh_all().await {
                Ok(()) => {
                    self.backoff.reset();
                    return Ok(());
                }
                Err(e) if is_retryable(&e) => self.wait_before_retry(&e, "initial fetch failed").await,
                Err(e) => return Err(e),
            }
        }
    }

    async fn watch(&mut self) -> Result<(), ApolloError> {
        loop {
            match self.poll_and_refresh().await {
                Ok(()) => self.backoff.reset(),
                Err(e) if is_retryable(&e) => self.wait_before_retry(&e, "long poll failed").await,
                Err(e) => return Err(e),
            }
        }
    }

    async fn run(&mut self) -> Result<(), ApolloError> {
        self.initial_fetch().await?;
        if self.options.once {
            return Ok(());
        }
        self.watch().await
    }
}

fn print_snapshot(snapshot: &ConfigSnapshot<Configurations>) {
    match serde_json::to_string(snapshot) {
        Ok(line) => println!("{}", line),
        Err(e) => error!(namespace = %snapshot.namespace_name, "failed to serialize snapshot: {}", e),
    }
}

async fn run(options: WatchOptions) -> Result<(), Box<dyn Error>> {
    info!(
        server = %options.server_url,
        app_id = %options.app_id,
        cluster = %options.cluster,
        namespaces = ?options.namespaces,
        signed = options.access_key_secret.is_some(),
        "starting apollo watcher"
    );
    let mut watcher = Watcher::new(options)?;

    tokio::select! {
        result = watcher.run() => result?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("interrupted, shutting down");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let options = match Cli::parse().into_options(env::var(RSA_KEY_FALLBACK_ENV).ok()) {
        Ok(options) => options,
        Err(message) => Cli::command().error(ErrorKind::ValueValidation, message).exit(),
    };

    if let Err(e) = run(options).await {
        if let Some(apollo) = e.downcast_ref::<ApolloError>() {
            match apollo.suggestion() {
                Some(hint) => error!(code = apollo.error_code(), "{} ({})", apollo, hint),
                None => error!(code = apollo.error_code(), "{}", apollo),
            }
        } else {
            error!("{}", e);
        }
        return Err(e);
    }
    Ok(())
}
