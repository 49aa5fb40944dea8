//! Error types for the dnsync system
//!
//! This module defines all error types used throughout the crate.
//!
//! Provider failures are carried as [`ProviderError`] so callers can tell a
//! rate limit (HTTP 429) apart from any other failed request. Both are
//! currently handled the same way: the enclosing domain reconciliation is
//! abandoned and the cycle moves on.

use thiserror::Error;

/// Result type alias for dnsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the dnsync system
#[derive(Error, Debug)]
pub enum Error {
    /// Startup configuration is missing or malformed (fatal, scheduler never starts)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The provider rejected the API credential (halts scheduling)
    #[error("Credential invalid: {0}")]
    CredentialInvalid(String),

    /// The public IP address could not be determined (aborts the current cycle)
    #[error("IP resolution failed: {0}")]
    IpResolution(String),

    /// A single provider call failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A status notification could not be delivered
    #[error("Notification failed: {0}")]
    Notification(String),

    /// A cycle ended abnormally (panic inside a provider, source or notifier)
    #[error("Cycle failed: {0}")]
    CycleFailed(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create an IP resolution error
    pub fn ip_resolution(msg: impl Into<String>) -> Self {
        Self::IpResolution(msg.into())
    }

    /// Create a notification error
    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    /// HTTP-like status code attached to this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider(err) => err.status(),
            _ => None,
        }
    }
}

/// Failure of a single provider call
///
/// No provider operation retries internally; each variant describes one
/// failed attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider answered 429 Too Many Requests
    #[error("rate limited (status {status})")]
    RateLimited {
        /// Always 429 today, kept for symmetry with `RequestFailed`
        status: u16,
    },

    /// The provider answered with a non-success status other than 429
    #[error("request failed (status {status}): {message}")]
    RequestFailed {
        /// HTTP status code
        status: u16,
        /// Provider supplied error text, possibly empty
        message: String,
    },

    /// The request never produced a response (connect, timeout, TLS)
    #[error("transport failure: {0}")]
    Transport(String),

    /// The response body did not match the expected envelope
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Classify a non-success HTTP status
    ///
    /// 429 maps to [`ProviderError::RateLimited`]; everything else maps to
    /// [`ProviderError::RequestFailed`].
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        if status == 429 {
            Self::RateLimited { status }
        } else {
            Self::RequestFailed {
                status,
                message: message.into(),
            }
        }
    }

    /// HTTP status code, if the provider answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { status } | Self::RequestFailed { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }

    /// True for [`ProviderError::RateLimited`]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
