use thiserror::Error;

use crate::cache::CacheError;
use crate::domain::error::DomainError;
use crate::infra::error::RemoteError;

/// Application-level failure, as surfaced to the view layer.
///
/// Screens branch on three outcomes: validation blocks the submission with
/// its message, not-found swaps in a fallback view, everything else becomes
/// a toast with [`AppError::user_message`]. Details stay on the error chain
/// for logging; there is no retry policy.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("remote operation failed: {0}")]
    Remote(#[from] RemoteError),
    #[error("not signed in")]
    SignedOut,
}

impl AppError {
    /// True when the referenced entity is gone and the screen should fall
    /// back to its missing-content view.
    pub fn is_not_found(&self) -> bool {
        match self {
            AppError::Domain(DomainError::NotFound { .. }) => true,
            AppError::Remote(remote) => remote.is_not_found(),
            AppError::Cache(cache) => cache.remote().is_some_and(RemoteError::is_not_found),
            _ => false,
        }
    }

    /// Message suitable for direct display.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Domain(DomainError::Validation { message }) => message.clone(),
            AppError::Domain(DomainError::NotFound { .. }) => {
                "This content is no longer available".to_string()
            }
            AppError::Domain(DomainError::Invariant { .. }) => {
                "Unexpected error occurred".to_string()
            }
            AppError::Remote(_) | AppError::Cache(_) if self.is_not_found() => {
                "This content is no longer available".to_string()
            }
            AppError::Remote(_) | AppError::Cache(_) => {
                "Something went wrong. Check your connection and try again.".to_string()
            }
            AppError::SignedOut => "Sign in to continue".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn validation_message_passes_through() {
        let err = AppError::from(DomainError::validation("passwords do not match"));
        assert_eq!(err.user_message(), "passwords do not match");
        assert!(!err.is_not_found());
    }

    #[test]
    fn not_found_detected_through_cache_layer() {
        let err = AppError::from(CacheError::Remote(Arc::new(RemoteError::NotFound)));
        assert!(err.is_not_found());
        assert_eq!(err.user_message(), "This content is no longer available");
    }

    #[test]
    fn remote_failures_become_toasts() {
        let err = AppError::from(RemoteError::Status {
            status: 503,
            body: String::new(),
        });
        assert!(!err.is_not_found());
        assert!(err.user_message().contains("try again"));
    }
}
