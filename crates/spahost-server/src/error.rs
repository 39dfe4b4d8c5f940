//! Request pipeline errors and their HTTP mapping.

use http::StatusCode;
use thiserror::Error;

/// Errors produced while serving a request.
#[derive(Debug, Error)]
pub enum ServeError {
    /// No matching file and no resolvable `index.html`.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Request used a method other than GET or HEAD.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Invalid or unsatisfiable `Range` header.
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// I/O error while loading or compressing content.
    #[error("I/O error: {0}")]
    ContentLoad(#[from] std::io::Error),
}

impl ServeError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidRange(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::ContentLoad(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Renders the JSON error body `{"code": <status>, "status": "<reason>"}`.
#[must_use]
pub fn error_body(status: StatusCode) -> String {
    serde_json::json!({
        "code": status.as_u16(),
        "status": status.canonical_reason().unwrap_or("Unknown"),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            ServeError::NotFound("/missing".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServeError::MethodNotAllowed.status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            ServeError::InvalidRange("bad".into()).status_code(),
            StatusCode::RANGE_NOT_SATISFIABLE
        );
        assert_eq!(
            ServeError::ContentLoad(std::io::Error::other("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn body_shape() {
        assert_eq!(
            error_body(StatusCode::NOT_FOUND),
            r#"{"code":404,"status":"Not Found"}"#
        );
        assert_eq!(
            error_body(StatusCode::METHOD_NOT_ALLOWED),
            r#"{"code":405,"status":"Method Not Allowed"}"#
        );
    }
}
