//! Error type for retried calls.

use std::fmt;

/// Why a retried call did not produce a value.
///
/// [`Failure`](RetryError::Failure) carries the last attempt's error exactly as
/// the unit of work returned it. The engine never replaces it with a synthetic
/// "retries exhausted" error, so callers can keep matching on their own error
/// type.
///
/// # Examples
///
/// ```rust
/// use rebound::{RetryEngine, RetryError};
/// use std::io;
///
/// let engine = RetryEngine::times(3);
/// let result: Result<(), _> = engine.call(|| Err(io::Error::new(io::ErrorKind::NotFound, "gone")));
///
/// match result {
///     Err(RetryError::Failure(e)) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The last attempt failed and no further retry was permitted.
    Failure(E),
    /// A blocking backoff wait was interrupted; no further attempts were made.
    Interrupted,
    /// A scheduled call was cancelled, or its pending task was dropped by the
    /// scheduler before it could complete.
    Cancelled,
}

impl<E> RetryError<E> {
    /// Returns true if this carries a failure from the unit of work.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returns true if a backoff wait was interrupted.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    /// Returns true if a scheduled call was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Get the failure if present.
    pub fn failure(&self) -> Option<&E> {
        match self {
            Self::Failure(e) => Some(e),
            Self::Interrupted | Self::Cancelled => None,
        }
    }

    /// Extract the failure, discarding interruption and cancellation.
    pub fn into_failure(self) -> Option<E> {
        match self {
            Self::Failure(e) => Some(e),
            Self::Interrupted | Self::Cancelled => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failure(e) => write!(f, "{}", e),
            Self::Interrupted => f.write_str("retry interrupted during backoff"),
            Self::Cancelled => f.write_str("retry cancelled"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    /// `Failure` displays as the inner error, so its source is the inner
    /// error's source rather than the inner error itself.
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Failure(e) => e.source(),
            Self::Interrupted | Self::Cancelled => None,
        }
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_failure_is_transparent() {
        let err = RetryError::Failure("connection refused".to_string());
        assert!(err.is_failure());
        assert_eq!(format!("{}", err), "connection refused");
        assert_eq!(err.failure().map(String::as_str), Some("connection refused"));
        assert_eq!(err.into_failure(), Some("connection refused".to_string()));
    }

    #[test]
    fn test_interrupted() {
        let err: RetryError<String> = RetryError::Interrupted;
        assert!(err.is_interrupted());
        assert!(!err.is_failure());
        assert!(format!("{}", err).contains("interrupted"));
        assert!(err.into_failure().is_none());
    }

    #[test]
    fn test_cancelled() {
        let err: RetryError<String> = RetryError::Cancelled;
        assert!(err.is_cancelled());
        assert!(format!("{}", err).contains("cancelled"));
        assert!(err.failure().is_none());
    }

    #[test]
    fn test_source_skips_transparent_failure() {
        use std::error::Error;

        #[derive(Debug)]
        struct Upload(std::io::Error);

        impl fmt::Display for Upload {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("upload failed")
            }
        }

        impl Error for Upload {
            fn source(&self) -> Option<&(dyn Error + 'static)> {
                Some(&self.0)
            }
        }

        let err = RetryError::Failure(Upload(std::io::Error::other("disk full")));
        let chain: Vec<String> =
            std::iter::successors(Some(&err as &(dyn Error + 'static)), |&e| e.source())
                .map(|e| e.to_string())
                .collect();
        assert_eq!(chain, vec!["upload failed".to_string(), "disk full".to_string()]);

        let err: RetryError<std::io::Error> = RetryError::Cancelled;
        assert!(err.source().is_none());
    }
}
