//! VPC client errors

use thiserror::Error;

/// Errors that can occur when interacting with the VPC and CVM APIs
#[derive(Debug, Error)]
pub enum VpcError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport failure that carries no `reqwest::Error`
    ///
    /// `MockVpcClient` raises it for scripted connection failures, and
    /// custom `VpcClientTrait` implementations may use it for their own
    /// transports. Classified like [`VpcError::Http`] by `is_transport`.
    #[error("Transport error: {0}")]
    Transport(String),

    /// VPC API was reached but answered with a non-zero code
    #[error("VPC API error: code {code}, message {message}")]
    Api {
        /// Numeric status code from the response body (or HTTP status)
        code: i64,
        /// Human-readable message from the provider
        message: String,
    },

    /// CVM API answered with an error object
    #[error("CVM API error: {code}: {message}")]
    InstanceApi {
        /// Provider error code, e.g. `AuthFailure.SignatureFailure`
        code: String,
        /// Human-readable message from the provider
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., missing required fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl VpcError {
    /// True when the API could not be reached at all.
    ///
    /// Retry accounting treats this separately from a provider rejection.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Transport(_))
    }

    /// True when the API was reached and refused the request.
    #[must_use]
    pub fn is_remote_rejection(&self) -> bool {
        matches!(self, Self::Api { .. } | Self::InstanceApi { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let transport = VpcError::Transport("connection reset".to_string());
        assert!(transport.is_transport());
        assert!(!transport.is_remote_rejection());

        let rejected = VpcError::Api {
            code: 9003,
            message: "resource busy".to_string(),
        };
        assert!(rejected.is_remote_rejection());
        assert!(!rejected.is_transport());

        let missing = VpcError::NotFound("eni-1".to_string());
        assert!(!missing.is_transport());
        assert!(!missing.is_remote_rejection());
    }

    #[test]
    fn test_api_error_message_names_code() {
        let err = VpcError::Api {
            code: 9003,
            message: "resource busy".to_string(),
        };
        assert_eq!(err.to_string(), "VPC API error: code 9003, message resource busy");
    }
}
