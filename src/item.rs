/// One recorded observation of the source.
///
/// The [`EventBuffer`](crate::buffer::EventBuffer) converts every upstream
/// notification — and the absence of one within the inactivity window — into
/// exactly one `RecordedItem`. Items are consumed strictly in the order they
/// were produced.
///
/// At most one terminal item ([`Finished`](Self::Finished),
/// [`Failed`](Self::Failed) or [`TimedOut`](Self::TimedOut)) is ever produced
/// per recorder, and it is always the last item in the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedItem<O, F> {
    /// A value emitted by the source.
    Value(O),
    /// The source completed without error.
    Finished,
    /// The source completed with an error. The error type is opaque to the
    /// recorder; its identity belongs to the source's error domain.
    Failed(F),
    /// No notification arrived within the configured inactivity window.
    TimedOut,
}

impl<O, F> RecordedItem<O, F> {
    /// Returns `true` for items that permanently end the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RecordedItem::Value(_))
    }

    /// Returns the carried value, if this is a [`Value`](Self::Value) item.
    pub fn into_value(self) -> Option<O> {
        match self {
            RecordedItem::Value(value) => Some(value),
            _ => None,
        }
    }
}
