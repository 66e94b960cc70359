//! Error types and result definitions for coordination primitives.
//!
//! [`CoordError`] is a classified error carrying an [`ErrorKind`], a static description, an
//! optional dynamic detail, an optional source and the callsite where it was created. Failures
//! from several workers are aggregated into a single [`CoordError`] so that a pool shutdown can
//! report every failure at once.
//!
//! Absence and cancellation are not errors in this crate: lookups return [`Option`] and
//! cancellable operations return [`crate::concurrency::cancel::CancelResult`].

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type using [`CoordError`] as the error type.
pub type CoordResult<T> = Result<T, CoordError>;

/// Detailed payload stored for single [`CoordError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for coordination operations.
#[derive(Debug, Clone)]
pub struct CoordError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Single error payload holding rich metadata.
    Single(ErrorPayload),
    /// Multiple aggregated errors, typically one per failed worker.
    Many {
        errors: Vec<CoordError>,
        location: &'static Location<'static>,
    },
}

/// Categories of errors raised by the coordination primitives.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Contract Violations
    SemaphoreOverRelease,
    CompletionUnderflow,
    InvalidConfiguration,

    // Closed Resources
    SemaphoreClosed,
    QueueClosed,

    // Timeouts & Backpressure
    OperationTimedOut,
    QueueFull,

    // Worker & Job Failures
    JobFailed,
    WorkerPanic,
    WorkerAborted,

    // Unknown / Uncategorized
    Unknown,

    // Error kind produced by fault injection in tests.
    #[cfg(feature = "failpoints")]
    InjectedFault,
}

impl ErrorKind {
    /// Returns `true` when retrying the same operation may succeed.
    ///
    /// Timeouts and full queues are retriable: the operation was abandoned or refused, not
    /// failed.
    pub fn is_retriable(self) -> bool {
        matches!(self, ErrorKind::OperationTimedOut | ErrorKind::QueueFull)
    }

    /// Returns `true` when the error reports misuse of a primitive by its caller.
    pub fn is_contract_violation(self) -> bool {
        matches!(
            self,
            ErrorKind::SemaphoreOverRelease
                | ErrorKind::CompletionUnderflow
                | ErrorKind::InvalidConfiguration
        )
    }
}

impl CoordError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For aggregated errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the aggregate is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error, flattened.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the aggregated errors, or [`None`] for a single error.
    pub fn errors(&self) -> Option<&[CoordError]> {
        match self.repr {
            ErrorRepr::Single(_) => None,
            ErrorRepr::Many { ref errors, .. } => Some(errors),
        }
    }

    /// Returns the detailed error information if available.
    ///
    /// For aggregated errors, returns the detail of the first error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the callsite where this error was created.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    ///
    /// Has no effect on aggregated errors, which forward their first error as the source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        CoordError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for CoordError {
    fn eq(&self, other: &CoordError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

impl Hash for CoordError {
    /// Hashes only the kind and static description so that repeated occurrences of the same
    /// failure group together regardless of location or detail.
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(&self.repr).hash(state);
        match &self.repr {
            ErrorRepr::Single(payload) => {
                payload.kind.hash(state);
                payload.description.hash(state);
            }
            ErrorRepr::Many { errors, .. } => {
                errors.len().hash(state);
                for error in errors {
                    error.hash(state);
                }
            }
        }
    }
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                write_detail(payload.detail.as_deref(), f)?;
                write_backtrace(payload.backtrace.as_ref(), f)
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if errors.is_empty() {
                    write!(f, "\n  (no inner errors provided)")?;
                }

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    match lines.next() {
                        Some(first_line) => write!(f, "\n  {}. {}", index + 1, first_line)?,
                        None => write!(f, "\n  {}.", index + 1)?,
                    }
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for CoordError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

fn write_backtrace(backtrace: &Backtrace, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let rendered = backtrace.to_string();
    if rendered.trim().is_empty() {
        return Ok(());
    }

    write!(f, "\n  Backtrace:")?;
    for line in rendered.lines() {
        write!(f, "\n    {line}")?;
    }

    Ok(())
}

fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match detail {
        Some(detail) if detail.trim().is_empty() => write!(f, "\n  Detail: <empty>"),
        Some(detail) => {
            write!(f, "\n  Detail:")?;
            for line in detail.lines() {
                write!(f, "\n    {line}")?;
            }
            Ok(())
        }
        None => Ok(()),
    }
}

/// Creates a [`CoordError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for CoordError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> CoordError {
        CoordError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`CoordError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for CoordError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> CoordError {
        CoordError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates a vector of errors.
///
/// A vector holding exactly one error yields that error unwrapped.
impl<E> From<Vec<E>> for CoordError
where
    E: Into<CoordError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> CoordError {
        let location = Location::caller();
        let mut errors: Vec<CoordError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        CoordError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

/// Converts an elapsed timer into [`ErrorKind::OperationTimedOut`].
impl From<tokio::time::error::Elapsed> for CoordError {
    #[track_caller]
    fn from(err: tokio::time::error::Elapsed) -> CoordError {
        let detail = err.to_string();
        CoordError::from_components(
            ErrorKind::OperationTimedOut,
            Cow::Borrowed("Operation timed out"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts a failed acquisition on a closed semaphore into [`ErrorKind::SemaphoreClosed`].
impl From<tokio::sync::AcquireError> for CoordError {
    #[track_caller]
    fn from(err: tokio::sync::AcquireError) -> CoordError {
        let detail = err.to_string();
        CoordError::from_components(
            ErrorKind::SemaphoreClosed,
            Cow::Borrowed("Semaphore was closed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts a task join failure into [`ErrorKind::WorkerPanic`] or [`ErrorKind::WorkerAborted`].
impl From<tokio::task::JoinError> for CoordError {
    #[track_caller]
    fn from(err: tokio::task::JoinError) -> CoordError {
        let (kind, description) = if err.is_panic() {
            (ErrorKind::WorkerPanic, "Worker task panicked")
        } else {
            (ErrorKind::WorkerAborted, "Worker task was aborted")
        };

        let detail = err.to_string();
        CoordError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts a rejected configuration into [`ErrorKind::InvalidConfiguration`].
impl From<coord_config::shared::ValidationError> for CoordError {
    #[track_caller]
    fn from(err: coord_config::shared::ValidationError) -> CoordError {
        let detail = err.to_string();
        CoordError::from_components(
            ErrorKind::InvalidConfiguration,
            Cow::Borrowed("Invalid configuration"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord_error;

    #[test]
    fn single_error_exposes_kind_and_detail() {
        let err = coord_error!(ErrorKind::JobFailed, "Job failed", "job 7 returned early");

        assert_eq!(err.kind(), ErrorKind::JobFailed);
        assert_eq!(err.detail(), Some("job 7 returned early"));
        assert!(err.errors().is_none());
        assert!(err.to_string().starts_with("[JobFailed] Job failed @ "));
    }

    #[test]
    fn aggregating_one_error_unwraps_it() {
        let err: CoordError = vec![coord_error!(ErrorKind::WorkerPanic, "Worker panicked")].into();

        assert!(err.errors().is_none());
        assert_eq!(err.kind(), ErrorKind::WorkerPanic);
    }

    #[test]
    fn aggregating_many_errors_flattens_kinds() {
        let err: CoordError = vec![
            coord_error!(ErrorKind::JobFailed, "Job failed"),
            vec![
                coord_error!(ErrorKind::WorkerPanic, "Worker panicked"),
                coord_error!(ErrorKind::JobFailed, "Job failed"),
            ]
            .into(),
        ]
        .into();

        assert_eq!(
            err.kinds(),
            vec![
                ErrorKind::JobFailed,
                ErrorKind::WorkerPanic,
                ErrorKind::JobFailed
            ]
        );
        assert_eq!(err.errors().map(<[CoordError]>::len), Some(2));
        assert!(err.to_string().starts_with("[Many] 2 errors aggregated"));
    }

    #[test]
    fn error_kind_classification() {
        assert!(ErrorKind::OperationTimedOut.is_retriable());
        assert!(!ErrorKind::JobFailed.is_retriable());
        assert!(ErrorKind::SemaphoreOverRelease.is_contract_violation());
        assert!(ErrorKind::CompletionUnderflow.is_contract_violation());
        assert!(!ErrorKind::OperationTimedOut.is_contract_violation());
    }

    #[test]
    fn source_is_preserved() {
        let io = std::io::Error::other("disk unplugged");
        let err = coord_error!(ErrorKind::JobFailed, "Job failed").with_source(io);

        let source = error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("disk unplugged"));
    }
}
