//! Standardized error handling patterns for HTTP collaborators

use crate::error::MirrorError;
use reqwest::StatusCode;

/// Standard error handler for HTTP responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Handle GitHub REST API errors with standardized messages
    pub fn handle_github_error(status: StatusCode, error_text: &str, operation: &str) -> MirrorError {
        let error_msg = match status.as_u16() {
            401 => format!("Bad credentials for {}: {}", operation, error_text),
            403 => format!(
                "Forbidden or rate limited during {}: {}",
                operation, error_text
            ),
            404 => format!("Resource not found for {}: {}", operation, error_text),
            409 => format!(
                "Conflict during {} - the file changed concurrently: {}",
                operation, error_text
            ),
            422 => format!("Invalid request for {}: {}", operation, error_text),
            429 => format!("Rate limited during {}: {}", operation, error_text),
            500..=599 => format!("GitHub unavailable during {}: {}", operation, error_text),
            _ => format!("{} failed (status {}): {}", operation, status, error_text),
        };

        MirrorError::GitHub(error_msg)
    }

    /// Handle registry-related HTTP errors
    pub fn handle_registry_error(
        status: StatusCode,
        error_text: &str,
        operation: &str,
    ) -> MirrorError {
        let error_msg = match status.as_u16() {
            403 => format!(
                "Forbidden: insufficient permissions for {}: {}",
                operation, error_text
            ),
            429 => format!("Rate limited during {}: {}", operation, error_text),
            500 => format!("Registry server error during {}: {}", operation, error_text),
            502 | 503 => format!("Registry unavailable for {}: {}", operation, error_text),
            _ => format!("{} failed (status {}): {}", operation, status, error_text),
        };

        MirrorError::Registry(error_msg)
    }
}

/// Network error categorization and handling
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Categorize and format network errors with helpful context
    pub fn handle_network_error(error: &reqwest::Error, context: &str) -> MirrorError {
        if error.is_timeout() {
            MirrorError::Network(format!("{} timeout: {}", context, error))
        } else if error.is_connect() {
            MirrorError::Network(format!("Connection error during {}: {}", context, error))
        } else if error.is_decode() {
            MirrorError::Parse(format!("Failed to decode {} response: {}", context, error))
        } else if error.to_string().contains("certificate") {
            MirrorError::Network(format!(
                "TLS certificate error during {}: {}",
                context, error
            ))
        } else {
            MirrorError::Network(format!("{} network error: {}", context, error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_error_messages() {
        let err = HttpErrorHandler::handle_github_error(
            StatusCode::CONFLICT,
            "sha mismatch",
            "workflow update",
        );
        assert!(matches!(err, MirrorError::GitHub(_)));
        assert!(err.to_string().contains("changed concurrently"));

        let err = HttpErrorHandler::handle_github_error(
            StatusCode::BAD_GATEWAY,
            "",
            "workflow dispatch",
        );
        assert!(err.to_string().contains("GitHub unavailable during workflow dispatch"));
    }

    #[test]
    fn test_registry_error_fallback() {
        let err = HttpErrorHandler::handle_registry_error(
            StatusCode::IM_A_TEAPOT,
            "nope",
            "manifest check",
        );
        assert_eq!(
            err.to_string(),
            "Registry error: manifest check failed (status 418 I'm a teapot): nope"
        );
    }
}
