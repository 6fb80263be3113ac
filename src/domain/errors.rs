use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

/// Postgres error codes that signal a permission or row-level security failure.
const PERMISSION_CODES: &[&str] = &["42501", "PGRST301", "PGRST302"];

/// Closed error taxonomy for every operation that passes through the
/// resilience layer.
///
/// Upstream errors (HTTP statuses, PostgREST codes, storage failures) are
/// mapped into one of these variants once, at the boundary, so retry
/// classifiers never have to sniff ad hoc properties.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Client error ({status}): {message}")]
    Client { status: u16, message: String },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Permission denied: {message}")]
    Permission { message: String },

    #[error("Circuit breaker open for {dependency}")]
    CircuitOpen { dependency: String },

    #[error("Operation aborted")]
    Aborted,
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn network(message: impl Into<String>) -> Self {
        ServiceError::Network {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
        }
    }

    pub fn permission(message: impl Into<String>) -> Self {
        ServiceError::Permission {
            message: message.into(),
        }
    }

    /// HTTP-like status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::RateLimited { .. } => Some(StatusCode::TOO_MANY_REQUESTS.as_u16()),
            ServiceError::Client { status, .. } | ServiceError::Server { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ServiceError::CircuitOpen { .. })
    }

    /// Default retry classification: network and 5xx failures are transient,
    /// anything carrying a 4xx meaning is permanent.
    pub fn is_retryable_by_default(&self) -> bool {
        matches!(self, ServiceError::Network { .. } | ServiceError::Server { .. })
    }

    /// Map a raw HTTP status into the taxonomy
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();

        let Ok(code) = StatusCode::from_u16(status) else {
            return ServiceError::Network { message };
        };

        match code {
            StatusCode::TOO_MANY_REQUESTS => ServiceError::RateLimited {
                message,
                retry_after: None,
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ServiceError::Permission { message }
            }
            StatusCode::UNPROCESSABLE_ENTITY => ServiceError::Validation { message },
            c if c.is_client_error() => ServiceError::Client { status, message },
            c if c.is_server_error() => ServiceError::Server { status, message },
            _ => ServiceError::Network { message },
        }
    }

    /// Map a PostgREST / Postgres failure (status, error code, message)
    pub fn from_postgrest(status: Option<u16>, code: Option<&str>, message: &str) -> Self {
        let lowered = message.to_lowercase();

        if let Some(code) = code {
            // Class 23: integrity constraint violations
            if code.starts_with("23") {
                return ServiceError::validation(message);
            }
            if PERMISSION_CODES.contains(&code) {
                return ServiceError::permission(message);
            }
        }

        if lowered.contains("row-level security") || lowered.contains("permission denied") {
            return ServiceError::permission(message);
        }

        match status {
            Some(status) => Self::from_status(status, message),
            None if looks_like_network_failure(&lowered) => ServiceError::network(message),
            None => ServiceError::Server {
                status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                message: message.to_string(),
            },
        }
    }

    /// Map a storage upload failure
    pub fn from_upload_failure(status: Option<u16>, message: &str) -> Self {
        let lowered = message.to_lowercase();

        let rejected_file = ["file size", "too large", "file type", "unsupported", "mime"]
            .iter()
            .any(|needle| lowered.contains(needle));
        if rejected_file {
            return ServiceError::validation(message);
        }

        match status {
            Some(status) => Self::from_status(status, message),
            None => ServiceError::network(message),
        }
    }
}

fn looks_like_network_failure(lowered: &str) -> bool {
    ["network", "timeout", "timed out", "fetch", "connection"]
        .iter()
        .any(|needle| lowered.contains(needle))
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return ServiceError::network(err.to_string());
        }

        match err.status() {
            Some(status) => ServiceError::from_status(status.as_u16(), err.to_string()),
            None => ServiceError::network(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            ServiceError::from_status(429, "slow down"),
            ServiceError::RateLimited { .. }
        ));
        assert!(matches!(
            ServiceError::from_status(403, "nope"),
            ServiceError::Permission { .. }
        ));
        assert!(matches!(
            ServiceError::from_status(422, "bad field"),
            ServiceError::Validation { .. }
        ));
        assert_eq!(
            ServiceError::from_status(404, "missing"),
            ServiceError::Client {
                status: 404,
                message: "missing".to_string()
            }
        );
        assert_eq!(ServiceError::from_status(503, "down").status(), Some(503));
    }

    #[test]
    fn test_postgrest_constraint_and_rls_codes() {
        let unique = ServiceError::from_postgrest(Some(409), Some("23505"), "duplicate key");
        assert!(matches!(unique, ServiceError::Validation { .. }));

        let denied = ServiceError::from_postgrest(Some(403), Some("42501"), "denied");
        assert!(matches!(denied, ServiceError::Permission { .. }));

        let rls = ServiceError::from_postgrest(
            None,
            None,
            "new row violates row-level security policy for table \"tenants\"",
        );
        assert!(matches!(rls, ServiceError::Permission { .. }));
    }

    #[test]
    fn test_postgrest_statusless_failures() {
        let network = ServiceError::from_postgrest(None, None, "Failed to fetch");
        assert!(matches!(network, ServiceError::Network { .. }));

        let unknown = ServiceError::from_postgrest(None, None, "something odd");
        assert_eq!(unknown.status(), Some(500));
    }

    #[test]
    fn test_upload_failure_mapping() {
        let too_big = ServiceError::from_upload_failure(Some(413), "The object exceeded the maximum allowed file size");
        assert!(matches!(too_big, ServiceError::Validation { .. }));

        let flaky = ServiceError::from_upload_failure(None, "socket hang up");
        assert!(matches!(flaky, ServiceError::Network { .. }));
    }

    #[tokio::test]
    async fn test_reqwest_connect_error_maps_to_network() {
        // Nothing listens on port 1, so the connection is refused
        let err = reqwest::get("http://127.0.0.1:1/rest/v1/payments")
            .await
            .unwrap_err();
        assert!(err.is_connect());

        let mapped = ServiceError::from(err);
        assert!(matches!(mapped, ServiceError::Network { .. }));
        assert!(mapped.is_retryable_by_default());
    }

    #[tokio::test]
    async fn test_reqwest_error_converts_with_question_mark() {
        async fn fetch_units() -> ServiceResult<String> {
            let body = reqwest::get("http://127.0.0.1:1/units").await?.text().await?;
            Ok(body)
        }

        assert!(matches!(fetch_units().await, Err(ServiceError::Network { .. })));
    }

    #[test]
    fn test_default_classification() {
        assert!(ServiceError::network("offline").is_retryable_by_default());
        assert!(ServiceError::from_status(502, "bad gateway").is_retryable_by_default());
        assert!(!ServiceError::from_status(404, "missing").is_retryable_by_default());
        assert!(!ServiceError::from_status(429, "slow").is_retryable_by_default());
        assert!(!ServiceError::Aborted.is_retryable_by_default());
    }
}
