use crate::github::DEFAULT_API_BASE;
use config::{Config, ConfigError, Environment, File};
use serde_derive::Deserialize;
use std::time::Duration;

#[derive(Deserialize, Debug, Default, PartialEq)]
pub struct DispatchbroConfig {
    #[serde(default)]
    pub github: GithubConfig,

    #[serde(default)]
    pub tracker: TrackerConfig,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct GithubConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// How long run listings may back off while rate limited. Zero hands a 429 straight to
    /// the tracker.
    #[serde(default)]
    pub rate_limit_retry_secs: u64,
}

impl GithubConfig {
    pub fn rate_limit_budget(&self) -> Option<Duration> {
        match self.rate_limit_retry_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            rate_limit_retry_secs: 0,
        }
    }
}

/// Tuning knobs for the completion tracker's polling loop.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Whether a failed run listing counts as a spent attempt rather than aborting.
    #[serde(default = "default_continue_on_query_error")]
    pub continue_on_query_error: bool,

    /// Whether matching runs must also report the repository dispatch event.
    #[serde(default)]
    pub require_dispatch_event: bool,
}

impl TrackerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Message(
                "tracker.max_attempts must be greater than zero".into(),
            ));
        }
        if self.window_secs == 0 {
            return Err(ConfigError::Message(
                "tracker.window_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            poll_interval_secs: default_poll_interval_secs(),
            window_secs: default_window_secs(),
            continue_on_query_error: default_continue_on_query_error(),
            require_dispatch_event: false,
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.into()
}

fn default_max_attempts() -> u32 {
    16
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_window_secs() -> u64 {
    30
}

fn default_continue_on_query_error() -> bool {
    true
}

impl DispatchbroConfig {
    pub fn new(config_file_path: &str) -> Result<Self, ConfigError> {
        let mut config = Config::new();
        let config_file_path = shellexpand::tilde(config_file_path);
        config.merge(File::with_name(&config_file_path).required(false))?;
        config.merge(Environment::with_prefix("dispatchbro").separator("__"))?;
        let config: Self = config.try_into()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.tracker.validate()?;
        if self.github.rate_limit_retry_secs >= self.tracker.poll_interval_secs
            && self.github.rate_limit_retry_secs > 0
        {
            return Err(ConfigError::Message(
                "github.rate_limit_retry_secs must be shorter than tracker.poll_interval_secs"
                    .into(),
            ));
        }
        Ok(())
    }
}
