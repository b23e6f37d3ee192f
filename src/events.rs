use std::sync::mpsc::Sender;

/// Everything the typing engine tells the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    TestStarted,
    CharTyped { correct: bool },
    LineCompleted,
    TestCompleted,
    PauseToggled { paused: bool },
    ResetRequested,
}

/// Receiver of session events, notified in the order keystrokes were accepted.
pub trait SessionObserver {
    fn notify(&mut self, event: SessionEvent);
}

/// Discards every event.
impl SessionObserver for () {
    fn notify(&mut self, _event: SessionEvent) {}
}

/// Records events in order; handy for headless runs and tests.
impl SessionObserver for Vec<SessionEvent> {
    fn notify(&mut self, event: SessionEvent) {
        self.push(event);
    }
}

/// Forwards events over a channel. A hung-up receiver is ignored.
impl SessionObserver for Sender<SessionEvent> {
    fn notify(&mut self, event: SessionEvent) {
        let _ = self.send(event);
    }
}

impl<O: SessionObserver + ?Sized> SessionObserver for Box<O> {
    fn notify(&mut self, event: SessionEvent) {
        (**self).notify(event);
    }
}
