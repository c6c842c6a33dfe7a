use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// The test-failure reporting collaborator.
///
/// The recorder converts every anomaly — timeout, premature completion,
/// unhandled source failure, sequence mismatch — into exactly one `report`
/// call. The default [`PanicReporter`] turns that into a panic, which is how
/// a Rust test fails; swap in a [`CollectingReporter`] to observe failures
/// non-fatally (for example, to test the recorder's own failure paths).
pub trait Reporter: Send + Sync {
    /// Record one test failure.
    fn report(&self, message: &str);
}

/// Fails the surrounding test by panicking with the failure message.
///
/// This is the default reporter for every [`Recorder`](crate::Recorder).
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicReporter;

impl Reporter for PanicReporter {
    fn report(&self, message: &str) {
        panic!("{message}");
    }
}

/// Collects failure messages instead of panicking.
///
/// Clones share the same underlying list, so a test can keep one handle and
/// hand the other to the recorder:
///
/// ```ignore
/// let failures = CollectingReporter::new();
/// let mut recorder = subject.record().with_reporter(failures.clone());
///
/// recorder.expect_sequence([1, 2, 3]).await;
/// assert_eq!(failures.messages(), ["Timeout reached"]);
/// ```
#[derive(Clone, Default)]
pub struct CollectingReporter {
    messages: Arc<Mutex<Vec<String>>>,
}

impl CollectingReporter {
    /// A reporter with an empty failure list.
    pub fn new() -> Self {
        Self::default()
    }

    /// All failure messages reported so far, in order.
    pub fn messages(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Number of failures reported so far.
    pub fn failure_count(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no failures have been reported.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Reporter for CollectingReporter {
    fn report(&self, message: &str) {
        self.lock().push(message.to_owned());
    }
}

impl fmt::Debug for CollectingReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectingReporter")
            .field("messages", &self.messages)
            .finish()
    }
}
