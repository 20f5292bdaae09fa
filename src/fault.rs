//! Over-limit fault arguments.
//!
//! When a request is rejected, the API layer renders its standard over-limit
//! fault from three values: a short message, a detailed explanation naming
//! the limit, and the time at which a retry may succeed.

use serde::{Deserialize, Serialize};

use crate::limits::LimitDefinition;

/// Short message carried by every over-limit fault.
pub const RATE_LIMITED_MESSAGE: &str = "This request was rate-limited.";

/// Arguments for the API's over-limit fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverLimitFault {
    pub message: String,
    pub details: String,
    /// Epoch seconds at which the request may be retried
    #[serde(rename = "retryAt")]
    pub retry_at: f64,
}

impl OverLimitFault {
    /// Describe the rejection of a `verb` request by `limit`, retryable after `delay` seconds.
    pub fn new(limit: &LimitDefinition, verb: &str, delay: f64, now: f64) -> Self {
        Self {
            message: RATE_LIMITED_MESSAGE.to_string(),
            details: format!(
                "Only {} {} request(s) can be made to {} every {}.",
                limit.value,
                verb,
                limit.uri,
                limit.unit.to_uppercase()
            ),
            retry_at: now + delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault() {
        let limit = LimitDefinition {
            uuid: "uuid".to_string(),
            uri: "/spam".to_string(),
            verbs: Vec::new(),
            unit: "second".to_string(),
            value: 23,
            queries: Vec::new(),
            rate_class: None,
        };

        let fault = OverLimitFault::new(&limit, "SPAM", 18.0, 1000000.0);

        assert_eq!(fault.message, "This request was rate-limited.");
        assert_eq!(
            fault.details,
            "Only 23 SPAM request(s) can be made to /spam every SECOND."
        );
        assert_eq!(fault.retry_at, 1000018.0);
    }
}
