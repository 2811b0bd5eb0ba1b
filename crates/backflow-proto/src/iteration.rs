//! Synchronous reply to a generator call.

/// The `(done, value)` pair returned by every generator call.
///
/// `done == true` means the replying side will never again answer `next`
/// on this channel. Results are transient: created per call, never retained.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IterationResult<R> {
    /// Whether the channel has ended.
    pub done: bool,
    /// The reply payload, if any.
    pub value: Option<R>,
}

impl<R> IterationResult<R> {
    /// A live reply carrying a value.
    #[must_use]
    pub fn yielded(value: R) -> Self {
        Self {
            done: false,
            value: Some(value),
        }
    }

    /// A live reply with nothing to say.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            done: false,
            value: None,
        }
    }

    /// A terminal reply, optionally carrying a final value.
    #[must_use]
    pub fn finished(value: Option<R>) -> Self {
        Self { done: true, value }
    }

    /// A terminal reply without a value.
    #[must_use]
    pub fn closed() -> Self {
        Self::finished(None)
    }

    /// Returns `true` if the channel has ended.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Take the payload.
    pub fn into_value(self) -> Option<R> {
        self.value
    }

    /// Transform the payload, keeping `done`.
    pub fn map<U, F>(self, f: F) -> IterationResult<U>
    where
        F: FnOnce(R) -> U,
    {
        IterationResult {
            done: self.done,
            value: self.value.map(f),
        }
    }
}

impl<R> Default for IterationResult<R> {
    fn default() -> Self {
        Self::pending()
    }
}
