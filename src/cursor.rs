use std::fmt;
use std::sync::Arc;

use crate::buffer::EventBuffer;
use crate::item::RecordedItem;
use crate::report::Reporter;

/// Resolves raw buffered items into assertion-ready outcomes.
///
/// `next` is the single choke point that converts "stream ended early",
/// "stream timed out" and "stream errored" into an immediate test failure,
/// so every higher-level assertion inherits that behavior for free. The
/// failure messages are fixed so all assertions fail consistently.
pub(crate) struct Cursor<O, F> {
    buffer: EventBuffer<O, F>,
    reporter: Arc<dyn Reporter>,
}

impl<O, F> Cursor<O, F> {
    pub(crate) fn new(buffer: EventBuffer<O, F>, reporter: Arc<dyn Reporter>) -> Self {
        Self { buffer, reporter }
    }

    pub(crate) fn set_reporter(&mut self, reporter: Arc<dyn Reporter>) {
        self.reporter = reporter;
    }

    pub(crate) fn report(&self, message: &str) {
        self.reporter.report(message);
    }

    /// Pull one item, expecting a plain value.
    ///
    /// Terminal items are reported as test failures and collapse into the
    /// `None` sentinel.
    pub(crate) async fn next(&mut self) -> Option<O>
    where
        F: fmt::Debug,
    {
        match self.buffer.pull().await {
            Some(RecordedItem::Value(value)) => Some(value),
            Some(RecordedItem::TimedOut) => {
                self.report("Timeout reached");
                None
            }
            Some(RecordedItem::Finished) | None => {
                self.report("End of stream reached");
                None
            }
            Some(RecordedItem::Failed(error)) => {
                self.report(&format!("Error not handled: {error:?}"));
                None
            }
        }
    }

    /// Pull one item, propagating a source failure to the caller instead of
    /// reporting it.
    pub(crate) async fn try_next(&mut self) -> Result<Option<O>, F> {
        match self.buffer.pull().await {
            Some(RecordedItem::Value(value)) => Ok(Some(value)),
            Some(RecordedItem::TimedOut) => {
                self.report("Timeout reached");
                Ok(None)
            }
            Some(RecordedItem::Finished) | None => {
                self.report("End of stream reached");
                Ok(None)
            }
            Some(RecordedItem::Failed(error)) => Err(error),
        }
    }

    /// Pull one item without any failure mapping.
    ///
    /// Used by the completion and failure assertions, which inspect terminal
    /// items themselves.
    pub(crate) async fn pull_raw(&mut self) -> Option<RecordedItem<O, F>> {
        self.buffer.pull().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::buffer::DEFAULT_CAPACITY;
    use crate::report::CollectingReporter;
    use crate::subject::Subject;

    fn cursor<O: Send + 'static, F: Send + 'static>(
        subject: &Subject<O, F>,
    ) -> (Cursor<O, F>, CollectingReporter)
    where
        O: Clone,
    {
        let reporter = CollectingReporter::new();
        let buffer = EventBuffer::attach(subject, Duration::from_secs(1), DEFAULT_CAPACITY);
        (Cursor::new(buffer, Arc::new(reporter.clone())), reporter)
    }

    #[tokio::test]
    async fn next_returns_values_in_order() {
        let subject = Subject::<i32>::new();
        let (mut cursor, reporter) = cursor(&subject);

        subject.send(1).unwrap();
        subject.send(2).unwrap();

        assert_eq!(cursor.next().await, Some(1));
        assert_eq!(cursor.next().await, Some(2));
        assert!(reporter.is_empty());
    }

    #[tokio::test]
    async fn next_reports_end_of_stream() {
        let subject = Subject::<i32>::new();
        let (mut cursor, reporter) = cursor(&subject);

        subject.finish().unwrap();

        assert_eq!(cursor.next().await, None);
        assert_eq!(reporter.messages(), ["End of stream reached"]);
    }

    #[tokio::test(start_paused = true)]
    async fn next_reports_timeout() {
        let subject = Subject::<i32>::new();
        let (mut cursor, reporter) = cursor(&subject);

        assert_eq!(cursor.next().await, None);
        assert_eq!(reporter.messages(), ["Timeout reached"]);
    }

    #[tokio::test]
    async fn next_reports_unhandled_error() {
        let subject = Subject::<i32, &'static str>::new();
        let (mut cursor, reporter) = cursor(&subject);

        subject.fail("boom").unwrap();

        assert_eq!(cursor.next().await, None);
        assert_eq!(reporter.messages(), ["Error not handled: \"boom\""]);
    }

    #[tokio::test]
    async fn try_next_rethrows_source_failure() {
        let subject = Subject::<i32, &'static str>::new();
        let (mut cursor, reporter) = cursor(&subject);

        subject.send(1).unwrap();
        subject.fail("boom").unwrap();

        assert_eq!(cursor.try_next().await, Ok(Some(1)));
        assert_eq!(cursor.try_next().await, Err("boom"));
        assert!(reporter.is_empty());
    }
}
