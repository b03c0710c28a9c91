//! Change notifications for rendering collaborators.

/// Something that changed in a session.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Samples moved from the future into the past.
    Advanced {
        now: f64,
        consumed: usize,
        past_len: usize,
        future_len: usize,
    },
    /// A re-solve replaced the whole future.
    FutureReplaced {
        start: f64,
        end: f64,
        samples: usize,
        reactivity: f64,
    },
    /// A re-solve failed; the future is now empty.
    ResolveFailed { now: f64, reason: String },
}

/// Receives [`SessionEvent`]s synchronously, in the order they happen.
pub trait SessionObserver: Send {
    fn on_event(&mut self, event: &SessionEvent);
}

impl<F> SessionObserver for F
where
    F: FnMut(&SessionEvent) + Send,
{
    fn on_event(&mut self, event: &SessionEvent) {
        self(event)
    }
}
