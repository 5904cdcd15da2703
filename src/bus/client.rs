//! Client side of the relay interface.
//!
//! [`RelayClient`] makes method calls over one connection.  Calls are
//! synchronous: each waits for its reply before returning, so two calls
//! from the same client can never be reordered.
//!
//! [`RelayClient::subscribe`] turns the connection into a [`Subscription`]
//! that yields every `TouchpadEvent` the relay broadcasts.

use super::protocol::{encode_line, Reply, Request, Signal};
use super::BusError;
use crate::gesture::GestureEvent;
use crate::traits::GestureSink;
use log::{debug, warn};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a method call waits for its reply.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(2);

/// A connection to the relay.
pub struct RelayClient {
    path: PathBuf,
    reader: BufReader<UnixStream>,
    writer: UnixStream,
}

impl RelayClient {
    /// Connect to the relay owning `path`.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self, BusError> {
        let path = path.as_ref().to_path_buf();
        let stream = super::connect(&path)?;
        stream.set_read_timeout(Some(CALL_TIMEOUT))?;
        stream.set_write_timeout(Some(CALL_TIMEOUT))?;
        let writer = stream.try_clone()?;
        Ok(Self {
            path,
            reader: BufReader::new(stream),
            writer,
        })
    }

    /// The socket this client talks to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn send(&mut self, req: &Request) -> Result<(), BusError> {
        let line = encode_line(req)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }

    fn read_reply(&mut self) -> Result<Reply, BusError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(BusError::Closed);
        }
        Ok(serde_json::from_str(line.trim())?)
    }

    fn call(&mut self, req: &Request) -> Result<Reply, BusError> {
        self.send(req)?;
        match self.read_reply()? {
            Reply::Error { message } => Err(BusError::Remote(message)),
            reply => Ok(reply),
        }
    }

    /// Liveness check.
    pub fn ping(&mut self) -> Result<(), BusError> {
        match self.call(&Request::Ping)? {
            Reply::Pong => Ok(()),
            other => Err(BusError::UnexpectedReply(format!("{:?}", other))),
        }
    }

    /// Ask the relay to broadcast `event` as a `TouchpadEvent` signal.
    pub fn echo_signal(&mut self, event: GestureEvent) -> Result<(), BusError> {
        let (fingers, direction) = event.to_wire();
        match self.call(&Request::EchoSignal { fingers, direction })? {
            Reply::Ok => Ok(()),
            other => Err(BusError::UnexpectedReply(format!("{:?}", other))),
        }
    }

    /// Stop the relay.
    pub fn quit(&mut self) -> Result<(), BusError> {
        match self.call(&Request::Quit)? {
            Reply::Ok => Ok(()),
            other => Err(BusError::UnexpectedReply(format!("{:?}", other))),
        }
    }

    /// Subscribe to `TouchpadEvent` signals.
    ///
    /// Returns once the relay has registered the subscription; every signal
    /// broadcast after that is delivered.
    pub fn subscribe(mut self) -> Result<Subscription, BusError> {
        match self.call(&Request::Subscribe)? {
            Reply::Subscribed => {}
            other => return Err(BusError::UnexpectedReply(format!("{:?}", other))),
        }
        self.reader.get_ref().set_read_timeout(None)?;
        debug!("subscribed to {}", self.path.display());
        Ok(Subscription {
            reader: self.reader,
        })
    }
}

impl GestureSink for RelayClient {
    type Error = BusError;

    fn touchpad_event(&mut self, event: GestureEvent) -> Result<(), BusError> {
        self.echo_signal(event)
    }
}

/// Stream of broadcast gesture events.
///
/// Blocks until the next signal arrives and ends when the relay goes away.
pub struct Subscription {
    reader: BufReader<UnixStream>,
}

impl Subscription {
    /// Bound how long [`next`](Iterator::next) waits.  `None` blocks forever.
    pub fn set_timeout(&self, timeout: Option<Duration>) -> Result<(), BusError> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }
}

impl Iterator for Subscription {
    type Item = Result<GestureEvent, BusError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) if line.trim().is_empty() => continue,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            let signal = match serde_json::from_str::<Signal>(line.trim()) {
                Ok(signal) => signal,
                Err(e) => return Some(Err(e.into())),
            };
            match signal {
                Signal::TouchpadEvent { fingers, direction } => {
                    match GestureEvent::from_wire(fingers, direction) {
                        Some(event) => return Some(Ok(event)),
                        None => {
                            warn!("dropping signal with direction {}", direction);
                            continue;
                        }
                    }
                }
            }
        }
    }
}
