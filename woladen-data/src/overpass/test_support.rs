//! Deterministic stand-ins for the network and the clock.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use super::{OverpassTransport, Pause, TransportError, TransportResponse};

const STUB_URL: &str = "http://overpass.invalid/api/interpreter";

/// Transport that replays scripted outcomes and records every query.
///
/// Once the script is exhausted the fallback response (if any) repeats;
/// without one, further calls fail with a network error.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: RefCell<VecDeque<Result<TransportResponse, TransportError>>>,
    fallback: Option<TransportResponse>,
    queries: RefCell<Vec<String>>,
    calls: Cell<usize>,
}

impl ScriptedTransport {
    /// Replay `outcomes` in order.
    pub fn new<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = Result<TransportResponse, TransportError>>,
    {
        Self {
            script: RefCell::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Answer every call with `response`.
    #[must_use]
    pub fn repeating(response: TransportResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::default()
        }
    }

    /// Answer every call with a 200 carrying `body`.
    #[must_use]
    pub fn with_body(body: &str) -> Self {
        Self::repeating(TransportResponse::new(200, body.as_bytes().to_vec()))
    }

    /// A connection failure as the HTTP transport would report it.
    #[must_use]
    pub fn network_error() -> TransportError {
        TransportError::Network {
            url: STUB_URL.to_owned(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
        }
    }

    /// Number of requests made.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// Queries received, in order.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.queries.borrow().clone()
    }
}

impl OverpassTransport for ScriptedTransport {
    fn endpoint(&self) -> &str {
        STUB_URL
    }

    fn post_query(&self, query: &str) -> Result<TransportResponse, TransportError> {
        self.calls.set(self.calls.get() + 1);
        self.queries.borrow_mut().push(query.to_owned());
        if let Some(outcome) = self.script.borrow_mut().pop_front() {
            return outcome;
        }
        self.fallback.clone().ok_or_else(Self::network_error)
    }
}

/// [`Pause`] that records requested durations instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingPause {
    recorded: RefCell<Vec<Duration>>,
}

impl RecordingPause {
    /// Durations requested so far.
    #[must_use]
    pub fn recorded(&self) -> Vec<Duration> {
        self.recorded.borrow().clone()
    }
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration) {
        self.recorded.borrow_mut().push(duration);
    }
}
