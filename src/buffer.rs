use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::item::RecordedItem;
use crate::source::{Notification, Source, SourceSink, Subscription};

/// Capacity ceiling for the item queue. Protects against unbounded memory
/// growth on a runaway producer; test workloads never get near it.
pub(crate) const DEFAULT_CAPACITY: usize = 65_536;

/// Bridges a push-based [`Source`] into a pollable FIFO queue.
///
/// Subscribes exactly once, at attach time. A pump task owns the subscription
/// and races every wait for the next notification against a fresh inactivity
/// timer; whichever resolves first produces the next [`RecordedItem`]. The
/// first terminal item closes the queue and releases the subscription.
///
/// One producer task and one consumer context; [`pull`](Self::pull) is the
/// only suspension point on the consumer side.
pub(crate) struct EventBuffer<O, F> {
    shared: Arc<Shared<O, F>>,
    disposal: CancellationToken,
}

struct Shared<O, F> {
    state: Mutex<State<O, F>>,
    notify: Notify,
    capacity: usize,
}

struct State<O, F> {
    queue: VecDeque<RecordedItem<O, F>>,
    closed: bool,
}

impl<O, F> Shared<O, F> {
    fn lock(&self) -> MutexGuard<'_, State<O, F>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, item: RecordedItem<O, F>) {
        {
            let mut state = self.lock();
            if state.closed {
                // A terminal item already ended the stream; nothing may
                // follow it.
                return;
            }
            if state.queue.len() == self.capacity {
                state.queue.pop_front();
                tracing::warn!(capacity = self.capacity, "buffer full, dropping oldest item");
            }
            if item.is_terminal() {
                state.closed = true;
            }
            state.queue.push_back(item);
        }
        self.notify.notify_one();
    }

    fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
    }
}

impl<O, F> EventBuffer<O, F>
where
    O: Send + 'static,
    F: Send + 'static,
{
    /// Subscribe to `source` and start buffering immediately.
    ///
    /// Must be called within a Tokio runtime: the pump runs as a spawned
    /// task.
    pub(crate) fn attach<S>(source: S, timeout: Duration, capacity: usize) -> Self
    where
        S: Source<Output = O, Failure = F>,
    {
        let (sink, rx) = SourceSink::channel();
        let subscription = source.subscribe(sink);
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        });
        let disposal = CancellationToken::new();
        tokio::spawn(pump(
            shared.clone(),
            rx,
            subscription,
            timeout,
            disposal.clone(),
        ));
        Self { shared, disposal }
    }
}

impl<O, F> EventBuffer<O, F> {
    /// Remove and return the oldest item, suspending until one exists.
    ///
    /// Returns `None` once the buffer is closed and drained — the terminal
    /// item has already been consumed, or the recorder was disposed.
    pub(crate) async fn pull(&self) -> Option<RecordedItem<O, F>> {
        loop {
            {
                let mut state = self.shared.lock();
                if let Some(item) = state.queue.pop_front() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            self.shared.notify.notified().await;
        }
    }
}

impl<O, F> Drop for EventBuffer<O, F> {
    fn drop(&mut self) {
        self.disposal.cancel();
    }
}

/// Producer side: forwards notifications into the queue, enforcing the
/// inactivity timeout and the one-terminal-item invariant.
async fn pump<O, F>(
    shared: Arc<Shared<O, F>>,
    mut rx: UnboundedReceiver<Notification<O, F>>,
    mut subscription: Subscription,
    timeout: Duration,
    disposal: CancellationToken,
) {
    loop {
        // Biased: a notification that arrived inside the window must win
        // over a timer that elapsed while the pump was not polled. The
        // sleep is recreated every iteration, so the inactivity timer
        // resets on each notification.
        tokio::select! {
            biased;
            _ = disposal.cancelled() => {
                subscription.cancel();
                shared.close();
                return;
            }
            notification = rx.recv() => match notification {
                Some(Notification::Value(value)) => {
                    shared.push(RecordedItem::Value(value));
                }
                Some(Notification::Finished) => {
                    shared.push(RecordedItem::Finished);
                    subscription.cancel();
                    tracing::debug!("source finished, subscription released");
                    return;
                }
                Some(Notification::Failed(error)) => {
                    shared.push(RecordedItem::Failed(error));
                    subscription.cancel();
                    tracing::debug!("source failed, subscription released");
                    return;
                }
                None => {
                    // The source dropped its sink without a terminal
                    // notification; nothing more can arrive, so wait out
                    // the inactivity window.
                    tokio::select! {
                        _ = disposal.cancelled() => {
                            shared.close();
                        }
                        _ = tokio::time::sleep(timeout) => {
                            shared.push(RecordedItem::TimedOut);
                            tracing::debug!("sink dropped, stream treated as stalled");
                        }
                    }
                    subscription.cancel();
                    return;
                }
            },
            _ = tokio::time::sleep(timeout) => {
                shared.push(RecordedItem::TimedOut);
                subscription.cancel();
                tracing::debug!("inactivity timeout, subscription released");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::subject::Subject;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn buffers_notifications_sent_before_first_pull() {
        let subject = Subject::<i32>::new();
        let buffer = EventBuffer::attach(&subject, TIMEOUT, DEFAULT_CAPACITY);

        subject.send(1).unwrap();
        subject.send(2).unwrap();
        subject.finish().unwrap();

        assert_eq!(buffer.pull().await, Some(RecordedItem::Value(1)));
        assert_eq!(buffer.pull().await, Some(RecordedItem::Value(2)));
        assert_eq!(buffer.pull().await, Some(RecordedItem::Finished));
    }

    #[tokio::test]
    async fn pull_returns_none_after_terminal_is_consumed() {
        let subject = Subject::<i32>::new();
        let buffer = EventBuffer::attach(&subject, TIMEOUT, DEFAULT_CAPACITY);

        subject.finish().unwrap();

        assert_eq!(buffer.pull().await, Some(RecordedItem::Finished));
        assert_eq!(buffer.pull().await, None);
        assert_eq!(buffer.pull().await, None);
    }

    #[tokio::test]
    async fn failure_is_buffered_as_failed_item() {
        let subject = Subject::<i32, &'static str>::new();
        let buffer = EventBuffer::attach(&subject, TIMEOUT, DEFAULT_CAPACITY);

        subject.send(1).unwrap();
        subject.fail("boom").unwrap();

        assert_eq!(buffer.pull().await, Some(RecordedItem::Value(1)));
        assert_eq!(buffer.pull().await, Some(RecordedItem::Failed("boom")));
        assert_eq!(buffer.pull().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn inactivity_enqueues_timed_out_and_closes() {
        let subject = Subject::<i32>::new();
        let buffer = EventBuffer::attach(&subject, TIMEOUT, DEFAULT_CAPACITY);

        // No notifications at all: the window elapses from subscription.
        assert_eq!(buffer.pull().await, Some(RecordedItem::TimedOut));
        assert_eq!(buffer.pull().await, None);
        assert!(!subject.is_subscribed());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_resets_on_every_notification() {
        let subject = Subject::<i32>::new();
        let buffer = EventBuffer::attach(&subject, TIMEOUT, DEFAULT_CAPACITY);

        subject.send(1).unwrap();
        assert_eq!(buffer.pull().await, Some(RecordedItem::Value(1)));

        // Stay under the window, then notify again: no timeout in between.
        tokio::time::sleep(Duration::from_millis(900)).await;
        subject.send(2).unwrap();
        assert_eq!(buffer.pull().await, Some(RecordedItem::Value(2)));

        // Now let the full window pass in silence.
        assert_eq!(buffer.pull().await, Some(RecordedItem::TimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn value_arriving_inside_window_wins_over_elapsed_timer() {
        let subject = Subject::<i32>::new();
        let buffer = EventBuffer::attach(&subject, TIMEOUT, DEFAULT_CAPACITY);

        // Let the pump arm its inactivity timer.
        tokio::task::yield_now().await;
        subject.send(1).unwrap();

        // The notification is already queued when the timer fires; it must
        // be delivered ahead of the timeout marker.
        tokio::time::advance(TIMEOUT * 2).await;
        assert_eq!(buffer.pull().await, Some(RecordedItem::Value(1)));
        assert_eq!(buffer.pull().await, Some(RecordedItem::TimedOut));
    }

    #[tokio::test]
    async fn overflow_drops_oldest() {
        let subject = Subject::<i32>::new();
        let buffer = EventBuffer::attach(&subject, TIMEOUT, 2);

        subject.send(1).unwrap();
        subject.send(2).unwrap();
        subject.send(3).unwrap();
        // Give the pump a chance to drain all three sends.
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(buffer.pull().await, Some(RecordedItem::Value(2)));
        assert_eq!(buffer.pull().await, Some(RecordedItem::Value(3)));
    }

    #[tokio::test]
    async fn disposal_cancels_subscription() {
        let subject = Subject::<i32>::new();
        let buffer = EventBuffer::attach(&subject, TIMEOUT, DEFAULT_CAPACITY);
        assert!(subject.is_subscribed());

        drop(buffer);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!subject.is_subscribed());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sink_without_terminal_stalls_into_timeout() {
        struct Silent;
        impl Source for Silent {
            type Output = i32;
            type Failure = std::convert::Infallible;
            fn subscribe(self, sink: SourceSink<i32, Self::Failure>) -> Subscription {
                sink.value(5);
                // Sink dropped here with no terminal notification.
                Subscription::unattached()
            }
        }

        let buffer = EventBuffer::attach(Silent, TIMEOUT, DEFAULT_CAPACITY);
        assert_eq!(buffer.pull().await, Some(RecordedItem::Value(5)));
        assert_eq!(buffer.pull().await, Some(RecordedItem::TimedOut));
    }
}
