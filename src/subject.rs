use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::source::{Source, SourceSink, Subscription};
use crate::{Error, Result};

/// An in-process push source, driven by hand from test code.
///
/// This is the producer half most recorder tests start from: create a
/// subject, attach a recorder, push values, then assert.
///
/// Two flavors:
/// - [`Subject::new`] is pass-through: values sent before a subscriber
///   attaches are dropped.
/// - [`Subject::hold`] keeps the most recent value and replays it to a new
///   subscriber (current-value behavior).
///
/// A subscriber attaching after [`finish`](Self::finish) or
/// [`fail`](Self::fail) receives the terminal notification immediately.
/// Sending after termination is an error.
///
/// Clones share the same state, and the subject is subscribed by reference,
/// so it stays usable after a recorder attaches:
///
/// ```ignore
/// let subject = Subject::<i32>::hold(0);
/// let mut recorder = subject.record();
///
/// subject.send(1)?;
/// recorder.expect_sequence([0, 1]).await;
/// ```
pub struct Subject<O, F = Infallible> {
    inner: Arc<Mutex<Inner<O, F>>>,
}

struct Inner<O, F> {
    sink: Option<SourceSink<O, F>>,
    latest: Option<O>,
    replay_latest: bool,
    phase: Phase<F>,
}

enum Phase<F> {
    Live,
    Finished,
    // The error moves out when delivered; a later subscriber only learns
    // that the stream ended.
    Failed(Option<F>),
}

impl<O: Clone, F> Subject<O, F> {
    /// A pass-through subject: no replay, values without a subscriber are
    /// dropped.
    pub fn new() -> Self {
        Self::build(None, false)
    }

    /// A current-value subject: holds `initial` (and afterwards the latest
    /// sent value) and replays it to a new subscriber.
    pub fn hold(initial: O) -> Self {
        Self::build(Some(initial), true)
    }

    fn build(latest: Option<O>, replay_latest: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                sink: None,
                latest,
                replay_latest,
                phase: Phase::Live,
            })),
        }
    }

    /// Emit a value.
    ///
    /// Fails with [`Error::SubjectTerminated`] after a terminal
    /// notification has been delivered.
    pub fn send(&self, value: O) -> Result {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if !matches!(inner.phase, Phase::Live) {
            return Err(Error::SubjectTerminated);
        }
        if inner.replay_latest {
            inner.latest = Some(value.clone());
        }
        if let Some(sink) = &inner.sink {
            sink.value(value);
        }
        Ok(())
    }

    /// Complete the stream without error.
    pub fn finish(&self) -> Result {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if !matches!(inner.phase, Phase::Live) {
            return Err(Error::SubjectTerminated);
        }
        inner.phase = Phase::Finished;
        if let Some(sink) = inner.sink.take() {
            sink.finished();
        }
        Ok(())
    }

    /// Complete the stream with an error.
    pub fn fail(&self, error: F) -> Result {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if !matches!(inner.phase, Phase::Live) {
            return Err(Error::SubjectTerminated);
        }
        match inner.sink.take() {
            Some(sink) => {
                sink.failed(error);
                inner.phase = Phase::Failed(None);
            }
            None => inner.phase = Phase::Failed(Some(error)),
        }
        Ok(())
    }

    /// Returns `true` while a subscriber holds a live subscription.
    ///
    /// Turns `false` once the recorder tears the subscription down — on a
    /// terminal notification, on inactivity timeout, or on disposal.
    pub fn is_subscribed(&self) -> bool {
        self.lock().sink.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<O, F>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<O: Clone, F> Default for Subject<O, F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O, F> Clone for Subject<O, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<O, F> fmt::Debug for Subject<O, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject").finish_non_exhaustive()
    }
}

impl<O: Clone + Send + 'static, F: Send + 'static> Source for &Subject<O, F> {
    type Output = O;
    type Failure = F;

    fn subscribe(self, sink: SourceSink<O, F>) -> Subscription {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match &mut inner.phase {
            Phase::Live => {
                if inner.replay_latest {
                    if let Some(latest) = inner.latest.clone() {
                        sink.value(latest);
                    }
                }
                inner.sink = Some(sink);
                drop(guard);
                let shared = Arc::clone(&self.inner);
                Subscription::new(move || {
                    shared.lock().unwrap_or_else(PoisonError::into_inner).sink = None;
                })
            }
            Phase::Finished => {
                sink.finished();
                Subscription::unattached()
            }
            Phase::Failed(slot) => {
                match slot.take() {
                    Some(error) => sink.failed(error),
                    None => sink.finished(),
                }
                Subscription::unattached()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Notification;

    #[tokio::test]
    async fn passthrough_drops_values_sent_before_subscribe() {
        let subject = Subject::<i32>::new();
        subject.send(1).unwrap();

        let (sink, mut rx) = SourceSink::channel();
        let _subscription = (&subject).subscribe(sink);
        subject.send(2).unwrap();

        assert!(matches!(rx.recv().await, Some(Notification::Value(2))));
    }

    #[tokio::test]
    async fn hold_replays_latest_value_on_subscribe() {
        let subject = Subject::<i32>::hold(0);
        subject.send(1).unwrap();

        let (sink, mut rx) = SourceSink::channel();
        let _subscription = (&subject).subscribe(sink);

        assert!(matches!(rx.recv().await, Some(Notification::Value(1))));
    }

    #[tokio::test]
    async fn late_subscriber_receives_terminal_immediately() {
        let subject = Subject::<i32, &'static str>::new();
        subject.fail("boom").unwrap();

        let (sink, mut rx) = SourceSink::channel();
        let _subscription = (&subject).subscribe(sink);

        assert!(matches!(rx.recv().await, Some(Notification::Failed("boom"))));
    }

    #[test]
    fn sending_after_termination_errors() {
        let subject = Subject::<i32>::new();
        subject.finish().unwrap();

        assert_eq!(subject.send(1), Err(Error::SubjectTerminated));
        assert_eq!(subject.finish(), Err(Error::SubjectTerminated));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn subscription_handle_crosses_task_boundaries() {
        let subject = Subject::<i32>::new();
        let (sink, _rx) = SourceSink::channel();
        let mut subscription = (&subject).subscribe(sink);
        assert!(subject.is_subscribed());

        // The handle (and the subject state it captures) moves to another
        // task, where cancellation must still detach the sink.
        tokio::spawn(async move {
            subscription.cancel();
        })
        .await
        .unwrap();

        assert!(!subject.is_subscribed());
    }

    #[tokio::test]
    async fn cancelling_subscription_detaches_sink() {
        let subject = Subject::<i32>::new();
        let (sink, _rx) = SourceSink::channel();
        let mut subscription = (&subject).subscribe(sink);
        assert!(subject.is_subscribed());

        subscription.cancel();
        assert!(!subject.is_subscribed());
        // Sends still succeed; the values just go nowhere.
        subject.send(1).unwrap();
    }
}
