/// The single error type for all Kiroku operations.
///
/// Every fallible Kiroku API returns `kiroku::Result<T>` (alias for
/// `Result<T, kiroku::Error>`). Source failures are never mapped into this
/// type — they stay in the source's own error domain and reach the caller
/// through [`Recorder::try_next`](crate::Recorder::try_next) and
/// [`Recorder::expect_failure`](crate::Recorder::expect_failure).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The subject has already delivered its terminal notification.
    #[error("subject already terminated")]
    SubjectTerminated,
}
