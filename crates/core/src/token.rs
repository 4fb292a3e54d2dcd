//! Anti-forgery token value object.

use serde::{Deserialize, Serialize};

/// Anti-forgery token issued alongside an authenticated session.
///
/// The value is opaque: it is stored, mirrored, and echoed back on
/// authenticated requests, never inspected. `Debug` prints a short prefix
/// only; the full value must never reach a log line.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CsrfToken(String);

impl CsrfToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    pub fn preview(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl core::fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "CsrfToken({}..)", self.preview())
    }
}
