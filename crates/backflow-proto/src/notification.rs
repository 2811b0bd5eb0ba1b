//! The three-notification vocabulary shared by both stream directions.

use std::fmt;

/// Discriminant of a [`Notification`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum NotificationKind {
    /// An ordinary value.
    Value,
    /// A terminal error.
    Error,
    /// A terminal final value.
    Final,
}

impl NotificationKind {
    /// Returns `true` for kinds that end a channel.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Value)
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Value => "value",
            Self::Error => "error",
            Self::Final => "final",
        })
    }
}

/// A single notification travelling over a channel.
///
/// Once an [`Error`](Self::Error) or [`Final`](Self::Final) has been
/// delivered, the channel is closed and nothing else may follow it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", content = "payload", rename_all = "lowercase"))]
pub enum Notification<T, E> {
    /// An ordinary value.
    Value(T),
    /// The producer failed.
    Error(E),
    /// The producer finished, optionally with a final value.
    Final(Option<T>),
}

impl<T, E> Notification<T, E> {
    /// Get the kind of this notification.
    #[must_use]
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::Value(_) => NotificationKind::Value,
            Self::Error(_) => NotificationKind::Error,
            Self::Final(_) => NotificationKind::Final,
        }
    }

    /// Returns `true` if this notification closes the channel.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }

    /// Transform the value payloads, leaving errors untouched.
    pub fn map<U, F>(self, mut f: F) -> Notification<U, E>
    where
        F: FnMut(T) -> U,
    {
        match self {
            Self::Value(v) => Notification::Value(f(v)),
            Self::Error(e) => Notification::Error(e),
            Self::Final(v) => Notification::Final(v.map(f)),
        }
    }

    /// Transform the error payload.
    pub fn map_err<E2, F>(self, f: F) -> Notification<T, E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            Self::Value(v) => Notification::Value(v),
            Self::Error(e) => Notification::Error(f(e)),
            Self::Final(v) => Notification::Final(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type N = Notification<i32, String>;

    #[test]
    fn terminal_kinds() {
        assert!(!N::Value(1).is_terminal());
        assert!(N::Error("boom".into()).is_terminal());
        assert!(N::Final(None).is_terminal());
        assert!(N::Final(Some(3)).is_terminal());
    }

    #[test]
    fn map_touches_value_and_final() {
        assert_eq!(N::Value(2).map(|v| v * 10), Notification::Value(20));
        assert_eq!(N::Final(Some(2)).map(|v| v * 10), Notification::Final(Some(20)));
        assert_eq!(
            N::Error("e".into()).map(|v| v * 10),
            Notification::Error("e".to_string())
        );
    }

    #[test]
    fn map_err_only_touches_error() {
        let n: Notification<i32, usize> = N::Error("four".into()).map_err(|e| e.len());
        assert_eq!(n, Notification::Error(4));
        let n: Notification<i32, usize> = N::Value(1).map_err(|e| e.len());
        assert_eq!(n, Notification::Value(1));
    }

    #[test]
    fn kind_display() {
        assert_eq!(NotificationKind::Value.to_string(), "value");
        assert_eq!(NotificationKind::Error.to_string(), "error");
        assert_eq!(NotificationKind::Final.to_string(), "final");
    }
}
