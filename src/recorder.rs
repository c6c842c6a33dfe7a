use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::buffer::{EventBuffer, DEFAULT_CAPACITY};
use crate::cursor::Cursor;
use crate::item::RecordedItem;
use crate::report::{PanicReporter, Reporter};
use crate::source::Source;

/// Default inactivity timeout: the stream counts as stalled after one
/// second without a notification.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// How the next matching call consumes the stream.
///
/// `SkipAhead` is armed by [`Recorder::skipping`] and applies to the very
/// next assertion only; every matching call consumes the mode and resets it
/// to `Exact`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Mode {
    #[default]
    Exact,
    SkipAhead,
}

/// Records one push-based source and replays it as a sequential, awaitable
/// assertion chain.
///
/// Attaching subscribes immediately, so nothing emitted between attach and
/// the first assertion is lost. Every assertion pulls items in FIFO order;
/// the inactivity timeout turns a stalled stream into a failed assertion
/// instead of a hung test.
///
/// # Example
///
/// ```ignore
/// use kiroku::{RecordExt, Subject};
///
/// let subject = Subject::<i32>::hold(0);
/// let mut recorder = subject.record();
///
/// subject.send(1)?;
/// subject.finish()?;
///
/// recorder
///     .expect_sequence([0, 1])
///     .await
///     .expect_finished()
///     .await;
/// ```
///
/// All assertions return `&mut Self` for chaining, except the two that
/// yield a value ([`next`](Self::next)/[`try_next`](Self::try_next) and
/// [`expect_failure`](Self::expect_failure)).
///
/// # Failure reporting
///
/// Anomalies are reported through a [`Reporter`]; the default panics, which
/// fails the surrounding test at the first broken expectation. Use
/// [`with_reporter`](Self::with_reporter) to observe failures non-fatally.
pub struct Recorder<O, F = Infallible> {
    cursor: Cursor<O, F>,
    mode: Mode,
}

impl<O, F> fmt::Debug for Recorder<O, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl<O, F> Recorder<O, F>
where
    O: Send + 'static,
    F: Send + 'static,
{
    /// Attach to `source` with the default 1-second inactivity timeout.
    ///
    /// Subscribes immediately. Must be called within a Tokio runtime.
    pub fn attach(source: impl Source<Output = O, Failure = F>) -> Self {
        Self::attach_with_timeout(source, DEFAULT_TIMEOUT)
    }

    /// Attach to `source` with a custom inactivity timeout.
    pub fn attach_with_timeout(
        source: impl Source<Output = O, Failure = F>,
        timeout: Duration,
    ) -> Self {
        let buffer = EventBuffer::attach(source, timeout, DEFAULT_CAPACITY);
        Self {
            cursor: Cursor::new(buffer, Arc::new(PanicReporter)),
            mode: Mode::Exact,
        }
    }

    /// Replace the failure reporter.
    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.cursor.set_reporter(Arc::new(reporter));
        self
    }
}

impl<O, F> Recorder<O, F> {
    /// Arm skip-ahead mode for the next assertion only.
    ///
    /// The next matching call searches forward through the stream for its
    /// target instead of requiring it at the current position, then the
    /// mode resets. Arming twice before one assertion is the same as
    /// arming once.
    pub fn skipping(&mut self) -> &mut Self {
        self.mode = Mode::SkipAhead;
        self
    }

    fn take_mode(&mut self) -> Mode {
        std::mem::take(&mut self.mode)
    }
}

impl<O, F> Recorder<O, F>
where
    F: fmt::Debug,
{
    /// Pull the next value.
    ///
    /// A terminal item instead of a value is reported as a test failure and
    /// collapses into `None`.
    pub async fn next(&mut self) -> Option<O> {
        self.cursor.next().await
    }

    /// Pull the next value, propagating a source failure to the caller.
    ///
    /// Identical to [`next`](Self::next) except that a failed stream
    /// surfaces as `Err` with the source's error value instead of a
    /// reported failure.
    pub async fn try_next(&mut self) -> Result<Option<O>, F> {
        self.cursor.try_next().await
    }

    /// Expect exactly `count` further emissions, regardless of payload.
    ///
    /// Intended for signal-only streams (`Subject<()>` and friends) where
    /// the payload carries no information and only the invocation count
    /// matters. A shortfall surfaces as the timeout or end-of-stream
    /// failure from the failed pull.
    pub async fn expect_invocation(&mut self, count: usize) -> &mut Self {
        self.take_mode();
        for _ in 0..count {
            if self.cursor.next().await.is_none() {
                break;
            }
        }
        self
    }

    /// Expect the next value (or, when skipping, some later value) to
    /// satisfy `predicate`.
    ///
    /// The predicate receives `None` when the pull failed, so it can also
    /// assert that the stream should have ended.
    pub async fn expect_condition<P>(&mut self, predicate: P) -> &mut Self
    where
        P: Fn(Option<&O>) -> bool,
    {
        match self.take_mode() {
            Mode::Exact => {
                let value = self.cursor.next().await;
                if !predicate(value.as_ref()) {
                    self.cursor.report("Condition not met");
                }
            }
            Mode::SkipAhead => loop {
                let value = self.cursor.next().await;
                let exhausted = value.is_none();
                if predicate(value.as_ref()) {
                    break;
                }
                if exhausted {
                    // The failed pull has already been reported.
                    break;
                }
            },
        }
        self
    }
}

impl<O, F> Recorder<O, F>
where
    O: PartialEq + fmt::Debug,
    F: fmt::Debug,
{
    /// Expect the stream to continue with exactly these values, in order.
    ///
    /// When armed with [`skipping`](Self::skipping), searches forward
    /// instead: items are pulled one at a time until the *trailing* window
    /// matches `expected`, so partial overlaps are allowed and the lowest
    /// index match wins.
    pub async fn expect_sequence<I>(&mut self, expected: I) -> &mut Self
    where
        I: IntoIterator<Item = O>,
    {
        let expected: Vec<O> = expected.into_iter().collect();
        let mode = self.take_mode();

        let mut collected: Vec<O> = Vec::with_capacity(expected.len());
        let mut pull_failed = false;
        while collected.len() < expected.len() {
            match self.cursor.next().await {
                Some(value) => collected.push(value),
                None => {
                    // Stop at the first failed pull so a stalled stream
                    // produces exactly one reported failure.
                    pull_failed = true;
                    break;
                }
            }
        }
        if pull_failed {
            return self;
        }

        match mode {
            Mode::Exact => {
                if collected != expected {
                    self.cursor
                        .report(&format!("expected {expected:?}, got {collected:?}"));
                }
            }
            Mode::SkipAhead => {
                while !collected.ends_with(&expected) {
                    match self.cursor.next().await {
                        Some(value) => collected.push(value),
                        None => break,
                    }
                }
            }
        }
        self
    }

    /// Expect `value` to be emitted `times` times in a row.
    ///
    /// Sugar for [`expect_sequence`](Self::expect_sequence) with a repeated
    /// element; skip-ahead applies the same way.
    pub async fn expect_value(&mut self, value: O, times: usize) -> &mut Self
    where
        O: Clone,
    {
        self.expect_sequence(vec![value; times]).await
    }
}

impl<O, F> Recorder<O, F>
where
    O: fmt::Debug,
    F: fmt::Debug,
{
    /// Expect the stream to complete cleanly.
    ///
    /// Pulls directly from the buffer, bypassing [`next`](Self::next)'s
    /// failure mapping: the item itself must be the clean finish. When
    /// skipping, remaining values are silently discarded until the finish
    /// (or anything else, which fails) — "eventually completes, ignore the
    /// rest".
    pub async fn expect_finished(&mut self) -> &mut Self {
        let mode = self.take_mode();
        loop {
            match self.cursor.pull_raw().await {
                Some(RecordedItem::Finished) => break,
                Some(RecordedItem::Value(_)) if mode == Mode::SkipAhead => continue,
                Some(RecordedItem::Value(value)) => {
                    self.cursor
                        .report(&format!("expected end of stream, got value: {value:?}"));
                    break;
                }
                Some(RecordedItem::TimedOut) => {
                    self.cursor.report("Timeout reached");
                    break;
                }
                Some(RecordedItem::Failed(error)) => {
                    self.cursor
                        .report(&format!("expected end of stream, got error: {error:?}"));
                    break;
                }
                None => {
                    self.cursor.report("End of stream reached");
                    break;
                }
            }
        }
        self
    }

    /// Expect the stream to complete with an error and hand the error back.
    ///
    /// The error value is not itself a reported failure — asserting on it
    /// is the caller's business. Reports and returns `None` if the stream
    /// finishes cleanly or times out first. When skipping, values before
    /// the error are discarded; the first terminal wins.
    pub async fn expect_failure(&mut self) -> Option<F> {
        let mode = self.take_mode();
        loop {
            match self.cursor.pull_raw().await {
                Some(RecordedItem::Failed(error)) => return Some(error),
                Some(RecordedItem::Value(_)) if mode == Mode::SkipAhead => continue,
                Some(RecordedItem::Value(value)) => {
                    self.cursor
                        .report(&format!("expected failure, got value: {value:?}"));
                    return None;
                }
                Some(RecordedItem::TimedOut) => {
                    self.cursor.report("Timeout reached");
                    return None;
                }
                Some(RecordedItem::Finished) => {
                    self.cursor.report("End of stream reached");
                    return None;
                }
                None => {
                    self.cursor.report("expected failure, got nothing");
                    return None;
                }
            }
        }
    }
}
