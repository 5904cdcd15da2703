//! The relay: sole owner of the well-known name and sole broadcaster of
//! `TouchpadEvent` signals.
//!
//! # Threads
//!
//! [`Relay::run`] turns the calling thread into the relay core.  The core
//! owns the subscriber list and is the only place signals are written.
//! An accept thread hands each connection to its own thread, which parses
//! requests and forwards them to the core over an [`mpsc`] channel.
//! In-process callers use a [`RelayHandle`], which feeds the same channel
//! directly.  Every broadcast therefore happens in channel order.
//!
//! # Shutdown
//!
//! `Quit` (remote or through a handle) stops the core and raises a stop
//! flag.  The accept thread polls a non-blocking listener and checks the
//! flag between polls, so shutdown never depends on reaching the socket
//! path.  The name is released by removing the socket file.

use super::protocol::{encode_line, Reply, Request, Signal};
use super::{acquire_name, BusError, NameGuard};
use crate::gesture::GestureEvent;
use crate::traits::GestureSink;
use log::{debug, error, info, warn};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

/// A subscriber that cannot take a signal within this time is dropped.
const SUBSCRIBER_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// How often the accept thread checks the stop flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Messages handled by the relay core.
enum CoreMsg {
    Emit(GestureEvent),
    Subscribe(UnixStream),
    Quit,
}

/// Errors produced by the relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error("relay has stopped")]
    Stopped,
}

/// The relay service.  Create with [`Relay::acquire`], then call
/// [`run`](Relay::run) on a dedicated thread.
pub struct Relay {
    name: NameGuard,
    listener: UnixListener,
    tx: mpsc::Sender<CoreMsg>,
    rx: mpsc::Receiver<CoreMsg>,
}

impl Relay {
    /// Acquire the name behind `path`.
    ///
    /// When this returns, the socket is bound: clients can connect and
    /// their requests are queued until [`run`](Relay::run) starts.
    pub fn acquire(path: &Path) -> Result<Self, RelayError> {
        let (name, listener) = acquire_name(path)?;
        info!("acquired {}", path.display());
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            name,
            listener,
            tx,
            rx,
        })
    }

    /// The socket this relay owns.
    pub fn path(&self) -> &Path {
        self.name.path()
    }

    /// An in-process handle for emitting events and quitting.
    pub fn handle(&self) -> RelayHandle {
        RelayHandle {
            tx: self.tx.clone(),
        }
    }

    /// Serve until `Quit`.
    ///
    /// This method **blocks**.  The name is released before it returns.
    pub fn run(self) -> Result<(), RelayError> {
        let Relay {
            name,
            listener,
            tx,
            rx,
        } = self;

        let stop = Arc::new(AtomicBool::new(false));
        let accept = {
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || accept_loop(listener, tx, stop))
        };

        info!("relay running on {}", name.path().display());
        let mut subscribers: Vec<UnixStream> = Vec::new();
        while let Ok(msg) = rx.recv() {
            match msg {
                CoreMsg::Emit(event) => broadcast(&mut subscribers, event),
                CoreMsg::Subscribe(stream) => {
                    if let Err(e) = register(&mut subscribers, stream) {
                        warn!("subscription failed: {}", e);
                    }
                }
                CoreMsg::Quit => {
                    info!("quit requested");
                    break;
                }
            }
        }

        stop.store(true, Ordering::SeqCst);
        if accept.join().is_err() {
            error!("accept thread panicked");
        }
        drop(name);
        info!("relay stopped");
        Ok(())
    }
}

/// In-process access to a running relay.
///
/// Events sent through a handle are broadcast exactly like `EchoSignal`
/// calls, in the order they were sent.
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<CoreMsg>,
}

impl RelayHandle {
    /// Broadcast `event` as a `TouchpadEvent` signal.
    pub fn emit(&self, event: GestureEvent) -> Result<(), RelayError> {
        self.tx
            .send(CoreMsg::Emit(event))
            .map_err(|_| RelayError::Stopped)
    }

    /// Stop the relay.
    pub fn quit(&self) -> Result<(), RelayError> {
        self.tx.send(CoreMsg::Quit).map_err(|_| RelayError::Stopped)
    }
}

impl GestureSink for RelayHandle {
    type Error = RelayError;

    fn touchpad_event(&mut self, event: GestureEvent) -> Result<(), RelayError> {
        self.emit(event)
    }
}

fn accept_loop(listener: UnixListener, tx: mpsc::Sender<CoreMsg>, stop: Arc<AtomicBool>) {
    if let Err(e) = listener.set_nonblocking(true) {
        error!("cannot poll listener: {}", e);
        return;
    }
    while !stop.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                debug!("client connected");
                if let Err(e) = stream.set_nonblocking(false) {
                    error!("cannot configure client stream: {}", e);
                    continue;
                }
                let tx = tx.clone();
                std::thread::spawn(move || {
                    if let Err(e) = serve_connection(stream, tx) {
                        debug!("client error: {}", e);
                    }
                    debug!("client disconnected");
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                error!("accept error: {}", e);
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
}

fn write_reply(writer: &mut UnixStream, reply: &Reply) -> Result<(), BusError> {
    writer.write_all(encode_line(reply)?.as_bytes())?;
    Ok(())
}

/// Handle requests on one connection until it closes, subscribes, or the
/// core goes away.
fn serve_connection(stream: UnixStream, tx: mpsc::Sender<CoreMsg>) -> Result<(), BusError> {
    let mut writer = stream.try_clone()?;
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let text = line?;
        if text.trim().is_empty() {
            continue;
        }
        let request = match serde_json::from_str::<Request>(&text) {
            Ok(request) => request,
            Err(e) => {
                warn!("bad request: {}: {}", text, e);
                write_reply(
                    &mut writer,
                    &Reply::Error {
                        message: format!("bad request: {}", e),
                    },
                )?;
                continue;
            }
        };
        debug!("received {:?}", request);

        let reply = match request {
            Request::Ping => Reply::Pong,
            Request::EchoSignal { fingers, direction } => {
                match GestureEvent::from_wire(fingers, direction) {
                    Some(event) => {
                        if tx.send(CoreMsg::Emit(event)).is_err() {
                            return Err(BusError::Closed);
                        }
                        Reply::Ok
                    }
                    None => Reply::Error {
                        message: format!("invalid direction {}", direction),
                    },
                }
            }
            Request::Quit => {
                if tx.send(CoreMsg::Quit).is_err() {
                    return Err(BusError::Closed);
                }
                Reply::Ok
            }
            Request::Subscribe => {
                // The core sends the `subscribed` reply, so it is ordered
                // before every signal on this stream.
                if tx.send(CoreMsg::Subscribe(writer)).is_err() {
                    return Err(BusError::Closed);
                }
                return Ok(());
            }
        };
        write_reply(&mut writer, &reply)?;
    }
    Ok(())
}

fn register(subscribers: &mut Vec<UnixStream>, mut stream: UnixStream) -> Result<(), BusError> {
    stream.set_write_timeout(Some(SUBSCRIBER_WRITE_TIMEOUT))?;
    write_reply(&mut stream, &Reply::Subscribed)?;
    subscribers.push(stream);
    debug!("{} subscriber(s)", subscribers.len());
    Ok(())
}

/// Write one `TouchpadEvent` to every subscriber, dropping the ones that
/// have gone away.
fn broadcast(subscribers: &mut Vec<UnixStream>, event: GestureEvent) {
    let (fingers, direction) = event.to_wire();
    let line = match encode_line(&Signal::TouchpadEvent { fingers, direction }) {
        Ok(line) => line,
        Err(e) => {
            error!("failed to encode signal: {}", e);
            return;
        }
    };
    debug!("TouchpadEvent({}, {}) to {} subscriber(s)", fingers, direction, subscribers.len());
    subscribers.retain_mut(|s| match s.write_all(line.as_bytes()) {
        Ok(()) => true,
        Err(e) => {
            debug!("dropping subscriber: {}", e);
            false
        }
    });
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::client::RelayClient;
    use crate::bus::name_has_owner;
    use crate::bus::test_util::tmp_socket_path;
    use crate::gesture::Direction;
    use std::path::PathBuf;
    use std::thread::JoinHandle;

    fn start(path: &PathBuf) -> (RelayHandle, JoinHandle<Result<(), RelayError>>) {
        let relay = Relay::acquire(path).unwrap();
        let handle = relay.handle();
        let join = std::thread::spawn(move || relay.run());
        (handle, join)
    }

    #[test]
    fn echo_signal_broadcasts_exactly_once() {
        let path = tmp_socket_path();
        let (handle, join) = start(&path);

        let mut sub = RelayClient::connect(&path).unwrap().subscribe().unwrap();
        sub.set_timeout(Some(Duration::from_millis(200))).unwrap();

        let mut client = RelayClient::connect(&path).unwrap();
        client.echo_signal(GestureEvent::new(3, Direction::Left)).unwrap();

        assert_eq!(
            sub.next().unwrap().unwrap(),
            GestureEvent::new(3, Direction::Left)
        );
        // Nothing else arrives.
        assert!(matches!(sub.next(), Some(Err(_))));

        handle.quit().unwrap();
        join.join().unwrap().unwrap();
    }

    #[test]
    fn every_subscriber_receives_the_signal() {
        let path = tmp_socket_path();
        let (handle, join) = start(&path);

        let mut subs: Vec<_> = (0..3)
            .map(|_| RelayClient::connect(&path).unwrap().subscribe().unwrap())
            .collect();
        RelayClient::connect(&path)
            .unwrap()
            .echo_signal(GestureEvent::ended())
            .unwrap();

        for sub in subs.iter_mut() {
            assert_eq!(sub.next().unwrap().unwrap(), GestureEvent::ended());
        }

        handle.quit().unwrap();
        join.join().unwrap().unwrap();
    }

    #[test]
    fn handle_events_keep_order() {
        let path = tmp_socket_path();
        let (mut handle, join) = start(&path);
        let sub = RelayClient::connect(&path).unwrap().subscribe().unwrap();

        let sent = vec![
            GestureEvent::new(3, Direction::Right),
            GestureEvent::new(3, Direction::Down),
            GestureEvent::new(4, Direction::Up),
            GestureEvent::ended(),
        ];
        for ev in &sent {
            handle.touchpad_event(*ev).unwrap();
        }
        let received: Vec<_> = sub.take(sent.len()).map(|r| r.unwrap()).collect();
        assert_eq!(received, sent);

        handle.quit().unwrap();
        join.join().unwrap().unwrap();
    }

    #[test]
    fn invalid_direction_is_rejected() {
        let path = tmp_socket_path();
        let (handle, join) = start(&path);

        let mut stream = UnixStream::connect(&path).unwrap();
        writeln!(stream, r#"{{"type":"echo_signal","fingers":3,"direction":9}}"#).unwrap();
        writeln!(stream, "not json at all").unwrap();
        writeln!(stream, r#"{{"type":"ping"}}"#).unwrap();
        let mut lines = BufReader::new(stream).lines();
        let first: Reply = serde_json::from_str(&lines.next().unwrap().unwrap()).unwrap();
        let second: Reply = serde_json::from_str(&lines.next().unwrap().unwrap()).unwrap();
        let third: Reply = serde_json::from_str(&lines.next().unwrap().unwrap()).unwrap();
        assert!(matches!(first, Reply::Error { .. }));
        assert!(matches!(second, Reply::Error { .. }));
        assert_eq!(third, Reply::Pong);

        handle.quit().unwrap();
        join.join().unwrap().unwrap();
    }

    #[test]
    fn second_acquire_fails_while_owned() {
        let path = tmp_socket_path();
        let (handle, join) = start(&path);

        assert!(name_has_owner(&path));
        assert!(matches!(
            Relay::acquire(&path),
            Err(RelayError::Bus(BusError::NameTaken(_)))
        ));

        handle.quit().unwrap();
        join.join().unwrap().unwrap();
    }

    #[test]
    fn remote_quit_releases_the_name() {
        let path = tmp_socket_path();
        let (_handle, join) = start(&path);

        RelayClient::connect(&path).unwrap().quit().unwrap();
        join.join().unwrap().unwrap();

        assert!(!path.exists());
        assert!(!name_has_owner(&path));
        // The name can be taken again.
        let (handle, join) = start(&path);
        handle.quit().unwrap();
        join.join().unwrap().unwrap();
    }

    #[test]
    fn quit_returns_when_socket_file_was_removed() {
        let path = tmp_socket_path();
        let relay = Relay::acquire(&path).unwrap();
        let handle = relay.handle();
        let (done_tx, done_rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = done_tx.send(relay.run());
        });

        std::fs::remove_file(&path).unwrap();
        handle.quit().unwrap();
        let result = done_rx.recv_timeout(Duration::from_secs(3));
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[test]
    fn handle_fails_after_stop() {
        let path = tmp_socket_path();
        let (handle, join) = start(&path);
        handle.quit().unwrap();
        join.join().unwrap().unwrap();
        assert!(matches!(
            handle.emit(GestureEvent::ended()),
            Err(RelayError::Stopped)
        ));
    }
}
