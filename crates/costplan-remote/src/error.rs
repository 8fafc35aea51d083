//! Remote failure classification.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    /// Timeouts, connection failures, interrupted bodies, 5xx, 408 and 429.
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("authentication rejected (HTTP {status})")]
    Auth { status: u16 },

    #[error("not found: {0}")]
    NotFound(String),

    /// Any other 4xx.
    #[error("request rejected (HTTP {status}): {message}")]
    NonTransient { status: u16, message: String },

    /// The body could not be decoded or violates the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("gave up after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<RemoteError>,
    },
}

impl RemoteError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn is_auth(&self) -> bool {
        match self {
            Self::Auth { .. } => true,
            Self::RetriesExhausted { last, .. } => last.is_auth(),
            _ => false,
        }
    }

    /// Classify an HTTP error status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Auth { status },
            404 => Self::NotFound(message),
            408 | 429 | 500..=599 => Self::Transient(format!("HTTP {}: {}", status, message)),
            _ => Self::NonTransient { status, message },
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            Self::Transient(err.to_string())
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), err.to_string())
        } else {
            Self::NonTransient {
                status: 0,
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<RemoteError> for costplan_core::Error {
    fn from(err: RemoteError) -> Self {
        costplan_core::Error::Remote(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(RemoteError::from_status(500, "boom").is_transient());
        assert!(RemoteError::from_status(503, "busy").is_transient());
        assert!(RemoteError::from_status(429, "slow down").is_transient());
        assert!(RemoteError::from_status(408, "timeout").is_transient());

        assert!(RemoteError::from_status(401, "").is_auth());
        assert!(RemoteError::from_status(403, "").is_auth());
        assert!(!RemoteError::from_status(403, "").is_transient());

        assert!(matches!(
            RemoteError::from_status(404, "gone"),
            RemoteError::NotFound(_)
        ));
        assert!(matches!(
            RemoteError::from_status(422, "bad"),
            RemoteError::NonTransient { status: 422, .. }
        ));
    }

    #[test]
    fn test_exhausted_keeps_auth() {
        let err = RemoteError::RetriesExhausted {
            attempts: 3,
            last: Box::new(RemoteError::Auth { status: 401 }),
        };
        assert!(err.is_auth());
        assert!(!err.is_transient());
        assert!(err.to_string().contains("3 attempt(s)"));
    }
}
