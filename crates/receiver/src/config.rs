//! Receiver configuration.
//!
//! Built through [`ReceiverConfigBuilder`]; every knob has a default matching
//! the device's conventional behavior, so `ReceiverConfig::builder().build()`
//! is a working configuration.

use std::time::Duration;

use thiserror::Error;

const DEFAULT_PORT: u16 = 8032;
const DEFAULT_BACKLOG: u32 = 5;
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_READ_ERRORS: u32 = 8;

/// What to do once the update attempt has reached a terminal state.
///
/// Restarting is a deliberate, named policy rather than a side effect: on an
/// unattended device the priority is returning to a bootable state, but a
/// bench setup may prefer to keep a failed process around for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicy {
    /// Restart whatever the outcome; the device always returns to a
    /// bootable state
    #[default]
    Always,
    /// Restart only after a successful activation; a failed attempt leaves
    /// the process (and its diagnostic state) running
    OnSuccess,
}

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    port: u16,
    backlog: u32,
    read_timeout: Duration,
    max_read_errors: u32,
    restart_policy: RestartPolicy,
}

#[derive(Error, Debug)]
pub enum ConfigBuildError {
    #[error("backlog must be non-zero")]
    ZeroBacklog,
    #[error("read-error budget must be non-zero")]
    ZeroReadErrorBudget,
}

impl ReceiverConfig {
    pub fn builder() -> ReceiverConfigBuilder {
        ReceiverConfigBuilder::new()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn backlog(&self) -> u32 {
        self.backlog
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn max_read_errors(&self) -> u32 {
        self.max_read_errors
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        self.restart_policy
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            backlog: DEFAULT_BACKLOG,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_read_errors: DEFAULT_MAX_READ_ERRORS,
            restart_policy: RestartPolicy::default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ReceiverConfigBuilder {
    port: Option<u16>,
    backlog: Option<u32>,
    read_timeout: Option<Duration>,
    max_read_errors: Option<u32>,
    restart_policy: Option<RestartPolicy>,
}

impl ReceiverConfigBuilder {
    fn new() -> Self {
        Default::default()
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn backlog(mut self, backlog: u32) -> Self {
        self.backlog = Some(backlog);
        self
    }

    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = Some(read_timeout);
        self
    }

    pub fn max_read_errors(mut self, max_read_errors: u32) -> Self {
        self.max_read_errors = Some(max_read_errors);
        self
    }

    pub fn restart_policy(mut self, restart_policy: RestartPolicy) -> Self {
        self.restart_policy = Some(restart_policy);
        self
    }

    pub fn build(self) -> Result<ReceiverConfig, ConfigBuildError> {
        let defaults = ReceiverConfig::default();
        let config = ReceiverConfig {
            port: self.port.unwrap_or(defaults.port),
            backlog: self.backlog.unwrap_or(defaults.backlog),
            read_timeout: self.read_timeout.unwrap_or(defaults.read_timeout),
            max_read_errors: self.max_read_errors.unwrap_or(defaults.max_read_errors),
            restart_policy: self.restart_policy.unwrap_or(defaults.restart_policy),
        };

        if config.backlog == 0 {
            return Err(ConfigBuildError::ZeroBacklog);
        }
        if config.max_read_errors == 0 {
            return Err(ConfigBuildError::ZeroReadErrorBudget);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReceiverConfig::builder().build().unwrap();
        assert_eq!(config.port(), 8032);
        assert_eq!(config.backlog(), 5);
        assert_eq!(config.restart_policy(), RestartPolicy::Always);
    }

    #[test]
    fn test_overrides() {
        let config = ReceiverConfig::builder()
            .port(9000)
            .read_timeout(Duration::from_secs(5))
            .restart_policy(RestartPolicy::OnSuccess)
            .build()
            .unwrap();

        assert_eq!(config.port(), 9000);
        assert_eq!(config.read_timeout(), Duration::from_secs(5));
        assert_eq!(config.restart_policy(), RestartPolicy::OnSuccess);
    }

    #[test]
    fn test_zero_backlog_rejected() {
        let err = ReceiverConfig::builder().backlog(0).build().unwrap_err();
        assert!(matches!(err, ConfigBuildError::ZeroBacklog));
    }
}
