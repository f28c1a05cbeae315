//! Configuration loaded from environment variables.

use crate::error::ControllerError;
use crate::registry::RegistrySettings;
use crate::selector::Selector;
use resource_watch::{RetryPolicy, RetryStrategy, WatchConfig};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Label marking objects as registerable unless `REGISTER_SELECTOR` says otherwise.
pub const DEFAULT_SELECTOR: &str = "romulus/route";

/// Server-side watch timeout. Values of 295s or more are rejected by kube's
/// watch parameter validation.
pub const DEFAULT_WATCH_TIMEOUT_SECS: u32 = 290;

/// How received events are written to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFormat {
    /// One-line human readable summary
    #[default]
    Text,
    /// Full event as JSON
    Json,
}

impl FromStr for EventFormat {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ControllerError::InvalidConfig(format!(
                "EVENT_LOG_FORMAT must be 'text' or 'json', got '{other}'"
            ))),
        }
    }
}

/// Service Watcher configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace to watch, `None` for all namespaces
    pub namespace: Option<String>,
    /// Retry policy and channel capacity shared by every supervisor
    pub watch: WatchConfig,
    /// Server-side timeout of each watch request
    pub watch_timeout_secs: u32,
    /// Selector deciding which objects are registerable
    pub selector: Arc<Selector>,
    /// Rendering used when logging events
    pub event_format: EventFormat,
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ControllerError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            ControllerError::InvalidConfig(format!("{key} has invalid value '{raw}'"))
        }),
        None => Ok(default),
    }
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which returns the value of a
    /// variable if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.trim().is_empty());

        let interval = Duration::from_secs(parse_var(&lookup, "WATCH_RETRY_INTERVAL_SECS", 2u64)?);
        let strategy = match lookup("WATCH_RETRY_STRATEGY") {
            Some(raw) => raw.parse::<RetryStrategy>()?,
            None => RetryStrategy::Constant,
        };
        let max_interval = Duration::from_secs(parse_var(&lookup, "WATCH_RETRY_MAX_SECS", 60u64)?);
        let jitter = Duration::from_millis(parse_var(&lookup, "WATCH_RETRY_JITTER_MS", 0u64)?);

        let retry = match strategy {
            RetryStrategy::Constant => RetryPolicy::constant(interval),
            RetryStrategy::Fibonacci => RetryPolicy::fibonacci(interval, max_interval),
        }
        .with_jitter(jitter);

        let watch = WatchConfig {
            retry,
            channel_capacity: parse_var(&lookup, "EVENT_CHANNEL_CAPACITY", resource_watch::config::DEFAULT_CHANNEL_CAPACITY)?,
        };
        watch.validate()?;

        let watch_timeout_secs = parse_var(&lookup, "WATCH_TIMEOUT_SECS", DEFAULT_WATCH_TIMEOUT_SECS)?;
        if watch_timeout_secs == 0 || watch_timeout_secs >= 295 {
            return Err(ControllerError::InvalidConfig(format!(
                "WATCH_TIMEOUT_SECS must be between 1 and 294, got {watch_timeout_secs}"
            )));
        }

        let selector = lookup("REGISTER_SELECTOR").unwrap_or_else(|| DEFAULT_SELECTOR.to_string());
        let event_format = match lookup("EVENT_LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => EventFormat::default(),
        };

        Ok(Self {
            namespace,
            watch,
            watch_timeout_secs,
            selector: Arc::new(selector.parse()?),
            event_format,
        })
    }

    /// Settings for the cluster registry.
    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            namespace: self.namespace.clone(),
            watch_timeout_secs: self.watch_timeout_secs,
            selector: Arc::clone(&self.selector),
        }
    }
}
