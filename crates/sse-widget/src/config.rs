//! Widget configuration.
//!
//! [`WidgetConfig`] is the single canonical configuration record. Partial
//! changes arrive as a [`ConfigUpdate`] (built directly or parsed from an
//! attribute name/value pair) and are merged with [`WidgetConfig::apply`],
//! which validates the result and reports what changed.

use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_PLACEHOLDER: &str = "Waiting for data…";
const DEFAULT_ERROR_TEXT: &str = "Connection error. Retrying…";

/// Configuration for a stream widget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WidgetConfig {
    /// SSE endpoint URL. Empty means "not configured" and keeps the widget idle.
    pub stream_url: String,
    /// Attach credentials (cookies/authorization) to the stream request.
    pub send_credentials: bool,
    /// Retry automatically after transport errors.
    pub auto_reconnect: bool,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for retry delays (before jitter).
    pub max_delay: Duration,
    /// Maximum consecutive retries (None = unbounded).
    pub max_attempts: Option<u32>,
    /// Text shown while waiting for the first message.
    pub placeholder_text: String,
    /// Text shown when the connection or a payload fails.
    pub error_text: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            stream_url: String::new(),
            send_credentials: false,
            auto_reconnect: true,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: None,
            placeholder_text: DEFAULT_PLACEHOLDER.to_string(),
            error_text: DEFAULT_ERROR_TEXT.to_string(),
        }
    }
}

impl WidgetConfig {
    /// Create a configuration for the given stream URL.
    #[must_use]
    pub fn new(stream_url: impl Into<String>) -> Self {
        Self {
            stream_url: stream_url.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn send_credentials(mut self, send: bool) -> Self {
        self.send_credentials = send;
        self
    }

    #[must_use]
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    #[must_use]
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the maximum number of consecutive retries (`None` = unbounded).
    #[must_use]
    pub fn max_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn placeholder_text(mut self, text: impl Into<String>) -> Self {
        self.placeholder_text = text.into();
        self
    }

    #[must_use]
    pub fn error_text(mut self, text: impl Into<String>) -> Self {
        self.error_text = text.into();
        self
    }

    /// Returns `true` if a stream URL is configured.
    pub fn has_url(&self) -> bool {
        !self.stream_url.is_empty()
    }

    /// Returns `true` if another retry is allowed after `attempts` retries.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        self.auto_reconnect && self.max_attempts.is_none_or(|max| attempts < max)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the URL is malformed or a delay bound is
    /// out of range. An empty URL is valid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.has_url() {
            check_stream_url(&self.stream_url)?;
        }
        if self.base_delay.is_zero() {
            return Err(ConfigError::out_of_range("base_delay", "must be > 0"));
        }
        if self.max_delay < self.base_delay {
            return Err(ConfigError::out_of_range(
                "max_delay",
                format!(
                    "must be >= base_delay ({}ms)",
                    self.base_delay.as_millis()
                ),
            ));
        }
        Ok(())
    }

    /// Merge `update` into a copy of this configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the merged configuration is invalid; `self`
    /// is left untouched either way.
    pub fn apply(&self, update: &ConfigUpdate) -> Result<(Self, ConfigChange), ConfigError> {
        let mut next = self.clone();
        if let Some(url) = &update.stream_url {
            next.stream_url.clone_from(url);
        }
        if let Some(send) = update.send_credentials {
            next.send_credentials = send;
        }
        if let Some(enabled) = update.auto_reconnect {
            next.auto_reconnect = enabled;
        }
        if let Some(delay) = update.base_delay {
            next.base_delay = delay;
        }
        if let Some(delay) = update.max_delay {
            next.max_delay = delay;
        }
        if let Some(attempts) = update.max_attempts {
            next.max_attempts = attempts;
        }
        if let Some(text) = &update.placeholder_text {
            next.placeholder_text.clone_from(text);
        }
        if let Some(text) = &update.error_text {
            next.error_text.clone_from(text);
        }
        next.validate()?;

        let change = ConfigChange {
            endpoint_changed: next.stream_url != self.stream_url
                || next.send_credentials != self.send_credentials,
            placeholder_changed: next.placeholder_text != self.placeholder_text,
        };
        Ok((next, change))
    }
}

/// Summary of what a configuration update changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfigChange {
    /// The URL or credential flag changed; the active session is stale.
    pub endpoint_changed: bool,
    /// The placeholder text changed.
    pub placeholder_changed: bool,
}

/// Partial configuration change. Unset fields keep their current value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub stream_url: Option<String>,
    pub send_credentials: Option<bool>,
    pub auto_reconnect: Option<bool>,
    pub base_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
    pub max_attempts: Option<Option<u32>>,
    pub placeholder_text: Option<String>,
    pub error_text: Option<String>,
}

impl ConfigUpdate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn send_credentials(mut self, send: bool) -> Self {
        self.send_credentials = Some(send);
        self
    }

    #[must_use]
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = Some(enabled);
        self
    }

    #[must_use]
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn max_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    #[must_use]
    pub fn placeholder_text(mut self, text: impl Into<String>) -> Self {
        self.placeholder_text = Some(text.into());
        self
    }

    #[must_use]
    pub fn error_text(mut self, text: impl Into<String>) -> Self {
        self.error_text = Some(text.into());
        self
    }

    /// Translate an attribute mutation into an update.
    ///
    /// `value` is `None` when the attribute was removed. Removing a numeric
    /// attribute restores its default; removing `reconnect` re-enables
    /// auto-reconnect.
    ///
    /// | attribute                | field              |
    /// |--------------------------|--------------------|
    /// | `sse-url`                | `stream_url`       |
    /// | `with-credentials`       | `send_credentials` |
    /// | `reconnect`              | `auto_reconnect`   |
    /// | `reconnect-delay`        | `base_delay` (ms)  |
    /// | `max-reconnect-delay`    | `max_delay` (ms)   |
    /// | `max-reconnect-attempts` | `max_attempts`     |
    /// | `placeholder-text`       | `placeholder_text` |
    /// | `error-message`          | `error_text`       |
    ///
    /// `debug` is accepted and ignored. Log verbosity comes from the
    /// `tracing` subscriber's filter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownAttribute`] for names outside the table
    /// and [`ConfigError::InvalidValue`] for unparsable numbers.
    pub fn from_attribute(name: &str, value: Option<&str>) -> Result<Self, ConfigError> {
        let defaults = WidgetConfig::default();
        let update = Self::new();
        let update = match name {
            "sse-url" => update.stream_url(value.unwrap_or_default()),
            // Boolean presence attribute.
            "with-credentials" => update.send_credentials(value.is_some()),
            "reconnect" => update.auto_reconnect(value.is_none_or(|v| v != "false")),
            "reconnect-delay" => update.base_delay(match value {
                Some(v) => parse_millis(name, v)?,
                None => defaults.base_delay,
            }),
            "max-reconnect-delay" => update.max_delay(match value {
                Some(v) => parse_millis(name, v)?,
                None => defaults.max_delay,
            }),
            "max-reconnect-attempts" => update.max_attempts(match value {
                Some(v) => parse_attempts(name, v)?,
                None => defaults.max_attempts,
            }),
            "placeholder-text" => update.placeholder_text(value.unwrap_or_default()),
            "error-message" => update.error_text(value.unwrap_or_default()),
            "debug" => update,
            _ => {
                return Err(ConfigError::UnknownAttribute {
                    name: name.to_string(),
                });
            }
        };
        Ok(update)
    }
}

fn check_stream_url(raw: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let url = url::Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}

fn invalid_value(name: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn parse_millis(name: &str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| invalid_value(name, value))
}

fn parse_attempts(name: &str, value: &str) -> Result<Option<u32>, ConfigError> {
    match value.trim() {
        "Infinity" | "infinity" | "inf" => Ok(None),
        v => v
            .parse::<u32>()
            .map(Some)
            .map_err(|_| invalid_value(name, value)),
    }
}
