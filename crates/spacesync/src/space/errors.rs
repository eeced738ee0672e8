use thiserror::Error;

/// Errors reported by a space client.
#[derive(Debug, Error)]
pub enum SpaceError {
    /// API error from the space.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The space throttled the request.
    #[error("Rate limit exceeded: {message}")]
    Throttled { message: String },

    /// The space rejected the payload as unprocessable.
    #[error("Unprocessable entity: {message}")]
    Unprocessable { message: String },

    /// Authentication required or failed.
    #[error("Authentication required")]
    AuthRequired,

    /// Resource not found.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Network or connection error.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Unexpected/internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SpaceError {
    /// Create an API error.
    #[inline]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a throttling error.
    #[inline]
    pub fn throttled(message: impl Into<String>) -> Self {
        Self::Throttled {
            message: message.into(),
        }
    }

    /// Create an unprocessable-entity error.
    #[inline]
    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::Unprocessable {
            message: message.into(),
        }
    }

    /// Create a not found error.
    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a network error.
    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create an internal error.
    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error indicates throttling by the space.
    ///
    /// Transports do not always map throttling to a dedicated variant, so
    /// network and internal messages are inspected as well. An API error with
    /// an HTTP status is classified by the status alone.
    pub fn is_throttled(&self) -> bool {
        match self {
            Self::Throttled { .. } => true,
            Self::Api { status, message } => {
                *status == 429
                    || (!is_http_error(*status)
                        && message_matches(message, &["429", "too many requests", "rate limit"]))
            }
            Self::Network { message } | Self::Internal { message } => {
                message_matches(message, &["429", "too many requests", "rate limit"])
            }
            Self::Unprocessable { .. } | Self::AuthRequired | Self::NotFound { .. } => false,
        }
    }

    /// Check if this error is an unprocessable-entity rejection.
    ///
    /// For content writes this almost always means the parent folder is missing.
    pub fn is_unprocessable(&self) -> bool {
        match self {
            Self::Unprocessable { .. } => true,
            Self::Api { status, message } => {
                *status == 422
                    || (!is_http_error(*status)
                        && message_matches(message, &["422", "unprocessable"]))
            }
            Self::Network { message } | Self::Internal { message } => {
                message_matches(message, &["422", "unprocessable"])
            }
            Self::Throttled { .. } | Self::AuthRequired | Self::NotFound { .. } => false,
        }
    }
}

/// A real 4xx/5xx status settles the classification on its own.
fn is_http_error(status: u16) -> bool {
    (400..600).contains(&status)
}

fn message_matches(message: &str, needles: &[&str]) -> bool {
    let lower = message.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which is useful for errors
/// that include multi-line details from the remote side.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for space operations.
pub type Result<T> = std::result::Result<T, SpaceError>;
