use std::convert::Infallible;
use std::fmt;
use std::pin::pin;

use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::source::{Source, SourceSink, Subscription};

/// Adapts a [`Stream`] of results into a recordable [`Source`].
///
/// Each `Ok` item becomes a value notification; the first `Err` item
/// becomes the failing terminal; stream exhaustion becomes the clean
/// finish. Forwarding runs on a spawned task, so subscribing requires a
/// Tokio runtime; cancelling the subscription stops the task.
///
/// ```ignore
/// let source = StreamSource::new(tokio_stream::iter([Ok(1), Ok(2), Err(Boom)]));
/// let mut recorder = source.record();
/// ```
pub struct StreamSource<St> {
    stream: St,
}

impl<St> StreamSource<St> {
    pub fn new(stream: St) -> Self {
        Self { stream }
    }
}

impl<St> fmt::Debug for StreamSource<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSource").finish_non_exhaustive()
    }
}

impl<St, O, F> Source for StreamSource<St>
where
    St: Stream<Item = Result<O, F>> + Send + 'static,
    O: Send + 'static,
    F: Send + 'static,
{
    type Output = O;
    type Failure = F;

    fn subscribe(self, sink: SourceSink<O, F>) -> Subscription {
        let token = CancellationToken::new();
        let guard = token.clone();
        tokio::spawn(async move {
            let mut stream = pin!(self.stream);
            loop {
                tokio::select! {
                    _ = guard.cancelled() => return,
                    item = stream.next() => match item {
                        Some(Ok(value)) => sink.value(value),
                        Some(Err(error)) => {
                            sink.failed(error);
                            return;
                        }
                        None => {
                            sink.finished();
                            return;
                        }
                    },
                }
            }
        });
        Subscription::new(move || token.cancel())
    }
}

/// Wraps a stream of plain values as an infallible [`Source`].
pub fn from_values<St>(
    stream: St,
) -> StreamSource<impl Stream<Item = Result<St::Item, Infallible>> + Send + 'static>
where
    St: Stream + Send + 'static,
{
    StreamSource::new(stream.map(Ok::<St::Item, Infallible>))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::CollectingReporter;
    use crate::source::RecordExt;

    #[tokio::test]
    async fn records_stream_values_then_finish() {
        let failures = CollectingReporter::new();
        let source = StreamSource::new(tokio_stream::iter([
            Ok::<_, &'static str>(1),
            Ok(2),
            Ok(3),
        ]));
        let mut recorder = source.record().with_reporter(failures.clone());

        recorder
            .expect_sequence([1, 2, 3])
            .await
            .expect_finished()
            .await;
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn stream_error_becomes_failure() {
        let source = StreamSource::new(tokio_stream::iter([Ok(1), Err("boom")]));
        let mut recorder = source.record();

        assert_eq!(recorder.next().await, Some(1));
        assert_eq!(recorder.expect_failure().await, Some("boom"));
    }

    #[tokio::test]
    async fn from_values_wraps_infallible_streams() {
        let failures = CollectingReporter::new();
        let mut recorder = from_values(tokio_stream::iter([10, 20]))
            .record()
            .with_reporter(failures.clone());

        recorder.expect_sequence([10, 20]).await.expect_finished().await;
        assert!(failures.is_empty());
    }
}
