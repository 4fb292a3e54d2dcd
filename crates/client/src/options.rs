use std::time::Duration;

/// Connection settings for [`crate::HttpIdentityApi`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Identity provider base URL, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Send the authenticated user's email as `X-User-Email` alongside the
    /// CSRF header. Some provider deployments key audit logs off it.
    pub send_user_email: bool,
}

impl ClientOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            request_timeout: Duration::from_secs(30),
            send_user_email: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_user_email_header(mut self) -> Self {
        self.send_user_email = true;
        self
    }
}
