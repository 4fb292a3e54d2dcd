use std::time::Duration;

/// Session lifecycle configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Cadence of background anti-forgery token renewal.
    pub renew_interval: Duration,
    /// Grace period after authentication before the first renewal attempt,
    /// so a token issued moments ago is not immediately re-issued.
    pub renew_initial_delay: Duration,
    /// Consecutive renewal failures tolerated before the session is
    /// terminated.
    pub renew_max_retries: u32,
    /// Cadence of the durable-storage tamper watch.
    pub storage_watch_interval: Duration,
    /// Revalidate a restored session against the provider during bootstrap.
    pub validate_on_restore: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            renew_interval: Duration::from_secs(30 * 60),
            renew_initial_delay: Duration::from_secs(10 * 60),
            renew_max_retries: 2,
            storage_watch_interval: Duration::from_secs(5),
            validate_on_restore: false,
        }
    }
}

impl SessionConfig {
    pub fn with_renew_interval(mut self, interval: Duration) -> Self {
        self.renew_interval = interval;
        self
    }

    pub fn with_renew_initial_delay(mut self, delay: Duration) -> Self {
        self.renew_initial_delay = delay;
        self
    }

    pub fn with_renew_max_retries(mut self, retries: u32) -> Self {
        self.renew_max_retries = retries;
        self
    }

    pub fn with_storage_watch_interval(mut self, interval: Duration) -> Self {
        self.storage_watch_interval = interval;
        self
    }

    pub fn with_validate_on_restore(mut self, validate: bool) -> Self {
        self.validate_on_restore = validate;
        self
    }
}
