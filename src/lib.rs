//! # Kiroku
//!
//! A pull-based, timeout-aware test recorder for push-based event sources,
//! built on Tokio.
//!
//! Observing asynchronous effects is non-deterministic: values arrive on
//! someone else's schedule, and a missing event hangs the test instead of
//! failing it. Kiroku attaches to a push source once, buffers everything it
//! emits, and hands test code a sequential, awaitable assertion chain with a
//! built-in inactivity timeout — expected events are matched in order, and a
//! stalled stream becomes an immediate, attributable test failure.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kiroku::{RecordExt, Subject};
//!
//! #[tokio::test]
//! async fn counter_emits_in_order() {
//!     let subject = Subject::<i32>::hold(0);
//!     let mut recorder = subject.record();
//!
//!     subject.send(1).unwrap();
//!     subject.finish().unwrap();
//!
//!     recorder
//!         .expect_sequence([0, 1])
//!         .await
//!         .expect_finished()
//!         .await;
//! }
//! ```
//!
//! ## Core Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Recorder`] | The assertion chain over one recorded source |
//! | [`Source`] | Trait for push-based producers (`subscribe` → [`Subscription`]) |
//! | [`SourceSink`] | Push handle a source emits into |
//! | [`Subject`] | Hand-driven in-process source for tests |
//! | [`StreamSource`] | Adapter from `futures` streams to [`Source`] |
//! | [`RecordedItem`] | One buffered observation (value / finished / failed / timed out) |
//! | [`Reporter`] | Failure-reporting seam ([`PanicReporter`], [`CollectingReporter`]) |
//!
//! ## Matching vocabulary
//!
//! [`Recorder::expect_sequence`] matches the next values exactly;
//! [`Recorder::expect_value`] counts repeats; [`Recorder::expect_condition`]
//! takes a predicate; [`Recorder::expect_finished`] and
//! [`Recorder::expect_failure`] assert on how the stream ends;
//! [`Recorder::expect_invocation`] counts signal-only emissions. Arming
//! [`Recorder::skipping`] first turns the next assertion into a forward
//! search instead of an exact positional match.
//!
//! ## Timeout model
//!
//! The timeout is per inactivity gap, not an overall deadline: every wait
//! races the next notification against a timer that resets on each arrival
//! (default 1 second, configurable at attach time). On timeout the
//! subscription is cancelled and a terminal timed-out item fails the pending
//! assertion.
//!
//! Kiroku is a test-time tool for a single source and a single consumer; it
//! is not a general reactive-stream library.

mod buffer;
mod cursor;
mod error;
mod item;
mod recorder;
mod report;
mod source;
mod stream_source;
mod subject;

pub use error::Error;
pub use item::RecordedItem;
pub use recorder::{Recorder, DEFAULT_TIMEOUT};
pub use report::{CollectingReporter, PanicReporter, Reporter};
pub use source::{RecordExt, Source, SourceSink, Subscription};
pub use stream_source::{from_values, StreamSource};
pub use subject::Subject;

/// Convenience alias for `Result<T, kiroku::Error>`.
pub type Result<T = ()> = std::result::Result<T, Error>;
