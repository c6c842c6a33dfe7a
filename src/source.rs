use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::Recorder;

/// A raw upstream notification, as pushed into the recorder's buffer.
pub(crate) enum Notification<O, F> {
    Value(O),
    Finished,
    Failed(F),
}

/// The push handle a [`Source`] receives when a recorder subscribes.
///
/// A well-behaved source calls [`value`](Self::value) zero or more times,
/// then at most one of [`finished`](Self::finished) or
/// [`failed`](Self::failed), and nothing afterwards. Notifications pushed
/// after the recorder tore the subscription down are silently discarded.
pub struct SourceSink<O, F> {
    tx: UnboundedSender<Notification<O, F>>,
}

impl<O, F> SourceSink<O, F> {
    pub(crate) fn channel() -> (Self, UnboundedReceiver<Notification<O, F>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Push an emitted value.
    pub fn value(&self, value: O) {
        let _ = self.tx.send(Notification::Value(value));
    }

    /// Signal that the source completed without error.
    pub fn finished(&self) {
        let _ = self.tx.send(Notification::Finished);
    }

    /// Signal that the source completed with an error.
    pub fn failed(&self, error: F) {
        let _ = self.tx.send(Notification::Failed(error));
    }
}

impl<O, F> Clone for SourceSink<O, F> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<O, F> fmt::Debug for SourceSink<O, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSink").finish_non_exhaustive()
    }
}

/// Cancellation handle returned by [`Source::subscribe`].
///
/// Cancellation runs at most once: explicit [`cancel`](Self::cancel) calls
/// after the first, and the implicit cancel on drop, are no-ops.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// A subscription that runs the given closure on cancellation.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to release.
    ///
    /// Used by sources that deliver their terminal notification during
    /// `subscribe` and hold no resources afterwards.
    pub fn unattached() -> Self {
        Self { cancel: None }
    }

    /// Release the subscription. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("live", &self.cancel.is_some())
            .finish()
    }
}

/// A push-based producer of values, completion and error notifications.
///
/// This is the recorder's only requirement on the system under test: hand
/// over a sink, get back a cancellation handle. `subscribe` is called exactly
/// once, synchronously, when a [`Recorder`] attaches; buffering starts at
/// that moment, so no notification emitted between subscription and the
/// first pull is lost.
pub trait Source {
    /// The emitted value type.
    type Output;
    /// The error type carried by a failing completion.
    type Failure;

    /// Start producing into `sink`. The returned [`Subscription`] must stop
    /// production and release resources when cancelled.
    fn subscribe(self, sink: SourceSink<Self::Output, Self::Failure>) -> Subscription;
}

/// Call-site sugar for attaching a recorder to any [`Source`].
///
/// ```ignore
/// let subject = Subject::<i32>::new();
/// let mut recorder = subject.record();
///
/// subject.send(1)?;
/// recorder.expect_sequence([1]).await;
/// ```
pub trait RecordExt: Source + Sized {
    /// Attach a [`Recorder`] with the default 1-second inactivity timeout.
    fn record(self) -> Recorder<Self::Output, Self::Failure>
    where
        Self::Output: Send + 'static,
        Self::Failure: Send + 'static,
    {
        Recorder::attach(self)
    }

    /// Attach a [`Recorder`] with a custom inactivity timeout.
    fn record_with_timeout(self, timeout: Duration) -> Recorder<Self::Output, Self::Failure>
    where
        Self::Output: Send + 'static,
        Self::Failure: Send + 'static,
    {
        Recorder::attach_with_timeout(self, timeout)
    }
}

impl<S: Source> RecordExt for S {}
