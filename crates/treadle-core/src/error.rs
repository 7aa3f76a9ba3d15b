use std::any::Any;

/// Failures the runtime reports through a [`Program`](crate::Program)'s
/// error handler.
///
/// Application functions (`init`, `update`, `view`, subscriptions) signal
/// failure by panicking.  The runtime catches the panic at its isolation
/// points, converts it into an [`Error::Panic`], and hands it to the
/// program's error handler (see
/// [`Program::with_error_handler`](crate::Program::with_error_handler))
/// together with a label describing where it happened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Application code panicked; `message` is the panic payload when it was
    /// a string.
    #[error("panicked: {message}")]
    Panic {
        /// The panic payload rendered as text.
        message: String,
    },
    /// A message was dispatched before any runner had started.
    #[error("dispatch invoked before any runner was started; a subscription fired before initialization")]
    NotStarted,
    /// The host a runner was wired to no longer exists.
    #[error("the host was dropped")]
    HostDropped,
}

impl Error {
    /// Build an [`Error::Panic`] from a payload returned by
    /// [`std::panic::catch_unwind`].
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Error::Panic {
            message: panic_message(payload.as_ref()),
        }
    }
}

/// Extract a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_from_str() {
        let payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(Error::from_panic(payload), Error::Panic { message: "boom".into() });
    }

    #[test]
    fn panic_message_from_string() {
        let payload = std::panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "code 7");
    }

    #[test]
    fn panic_message_other_payload() {
        let payload = std::panic::catch_unwind(|| std::panic::panic_any(42u32)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn display_includes_message() {
        let err = Error::Panic { message: "bad".into() };
        assert_eq!(err.to_string(), "panicked: bad");
    }
}
