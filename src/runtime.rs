use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent};

/// Inputs the app loop reacts to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionInput {
    Key(KeyEvent),
    Resize,
    /// Nothing arrived within one tick interval.
    Tick,
}

/// Source of terminal input.
pub trait InputSource: Send + 'static {
    /// Block for up to `timeout` waiting for the next input.
    fn recv_timeout(&self, timeout: Duration) -> Result<SessionInput, RecvTimeoutError>;
}

/// Reads crossterm events on a background thread.
pub struct CrosstermInputSource {
    rx: Receiver<SessionInput>,
}

impl CrosstermInputSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let input = match event::read() {
                Ok(CtEvent::Key(key)) => SessionInput::Key(key),
                Ok(CtEvent::Resize(_, _)) => SessionInput::Resize,
                Ok(_) => continue,
                Err(err) => {
                    tracing::error!(%err, "terminal input stopped");
                    break;
                }
            };
            if tx.send(input).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermInputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for CrosstermInputSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<SessionInput, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Channel-fed input for headless runs.
pub struct TestInputSource {
    rx: Receiver<SessionInput>,
}

impl TestInputSource {
    pub fn new(rx: Receiver<SessionInput>) -> Self {
        Self { rx }
    }
}

impl InputSource for TestInputSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<SessionInput, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Drives the app one input or tick at a time.
pub struct Runner<S: InputSource, T: Ticker> {
    source: S,
    ticker: T,
}

impl<S: InputSource, T: Ticker> Runner<S, T> {
    pub fn new(source: S, ticker: T) -> Self {
        Self { source, ticker }
    }

    /// Wait up to one tick interval; a timeout or a closed source yields `Tick`.
    pub fn step(&self) -> SessionInput {
        self.source
            .recv_timeout(self.ticker.interval())
            .unwrap_or(SessionInput::Tick)
    }
}
