use syncbridge_core::error::CoreError;
use syncbridge_core::types::DbId;

/// Errors raised while talking to an external system.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The external system answered with a non-2xx status.
    #[error("{system} API error ({status}): {body}")]
    Api {
        system: String,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The integration row carries unusable connection settings.
    #[error("Invalid connection settings for integration {integration_id}: {message}")]
    Settings {
        integration_id: DbId,
        message: String,
    },

    #[error("No connector available for system '{0}'")]
    UnsupportedSystem(String),

    #[error("Integration {0} is inactive")]
    Inactive(DbId),
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;

impl ConnectorError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<ConnectorError> for CoreError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Settings { .. }
            | ConnectorError::UnsupportedSystem(_)
            | ConnectorError::Inactive(_) => CoreError::Validation(err.to_string()),
            other => CoreError::Connectivity(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn server_errors_are_transient() {
        let err = ConnectorError::Api {
            system: "shopify".into(),
            status: 503,
            body: "busy".into(),
        };
        assert!(err.is_transient());

        let err = ConnectorError::Api {
            system: "shopify".into(),
            status: 404,
            body: "missing".into(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn converts_to_core_error() {
        let err: CoreError = ConnectorError::Protocol("missing 'records'".into()).into();
        assert_matches!(err, CoreError::Connectivity(m) if m.contains("missing 'records'"));

        let err: CoreError = ConnectorError::UnsupportedSystem("sap".into()).into();
        assert_matches!(err, CoreError::Validation(_));
    }
}
