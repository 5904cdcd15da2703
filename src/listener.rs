//! Wires a [`MotionSource`] through the [`Interpreter`] into the relay.
//!
//! # Relay modes
//!
//! * [`RelayMode::InProcess`]: the relay runs on a companion thread of this
//!   process and events reach it through a [`RelayHandle`].  If another
//!   process already owns the name, events are forwarded to it instead.
//! * [`RelayMode::OutOfProcess`]: one ownership query at startup.  When
//!   nobody owns the name, a relay process is launched; either way every
//!   event is forwarded with `EchoSignal`.
//!
//! In both modes [`RelayConnection`] only returns once the relay has
//! acknowledged that it owns the name, so no event is ever sent to a relay
//! that is not live.

use crate::bus::client::RelayClient;
use crate::bus::relay::{Relay, RelayError, RelayHandle};
use crate::bus::{name_has_owner, BusError, READY_LINE, SOCKET_ENV};
use crate::device::probe::DeviceError;
use crate::gesture::{GestureEvent, RawMotionSample};
use crate::interpreter::{Interpreter, Thresholds};
use crate::traits::{GestureSink, MotionSource};
use log::{debug, error, info, warn};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread::JoinHandle;

/// Errors produced while running the listener.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("error detecting touchpad: {0}")]
    Device(#[from] DeviceError),
    #[error("relay error: {0}")]
    Relay(#[from] RelayError),
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
    #[error("failed to launch relay: {0}")]
    Launch(String),
    #[error("motion source failed: {0}")]
    Source(String),
}

/// How to start a relay in its own process.
#[derive(Debug, Clone)]
pub struct RelayLauncher {
    program: PathBuf,
    args: Vec<String>,
}

impl RelayLauncher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Re-run the current executable with the `relay` subcommand.
    pub fn current_exe() -> Result<Self, ListenerError> {
        let program = std::env::current_exe()
            .map_err(|e| ListenerError::Launch(format!("cannot locate executable: {}", e)))?;
        Ok(Self::new(program, vec!["relay".into()]))
    }

    /// Start the relay process and wait for its readiness line.
    ///
    /// The process is left running when this returns.
    fn launch(&self, socket: &Path) -> Result<Child, ListenerError> {
        info!("launching relay: {} {}", self.program.display(), self.args.join(" "));
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(SOCKET_ENV, socket)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| ListenerError::Launch(format!("{}: {}", self.program.display(), e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ListenerError::Launch("relay stdout not captured".into()))?;
        for line in BufReader::new(stdout).lines() {
            let line = line.map_err(|e| ListenerError::Launch(format!("read: {}", e)))?;
            if line.trim() == READY_LINE {
                debug!("relay process {} is ready", child.id());
                return Ok(child);
            }
            debug!("relay: {}", line);
        }

        let status = child
            .wait()
            .map_err(|e| ListenerError::Launch(format!("wait: {}", e)))?;
        Err(ListenerError::Launch(format!(
            "relay exited before becoming ready ({})",
            status
        )))
    }
}

/// Where the relay lives.
#[derive(Debug, Clone)]
pub enum RelayMode {
    InProcess,
    OutOfProcess(RelayLauncher),
}

enum Forwarder {
    Local(RelayHandle),
    Remote(RelayClient),
}

/// A live relay that gesture events can be forwarded to.
pub struct RelayConnection {
    forwarder: Forwarder,
    thread: Option<JoinHandle<Result<(), RelayError>>>,
    /// Relay process this connection launched, until it is reaped.
    child: Option<Child>,
}

impl RelayConnection {
    /// Run the relay on a companion thread and wait until it owns the name.
    ///
    /// If the name is already owned, forward to that owner instead.
    pub fn in_process(socket: &Path) -> Result<Self, ListenerError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<RelayHandle, RelayError>>();
        let path = socket.to_path_buf();
        let thread = std::thread::spawn(move || {
            let relay = match Relay::acquire(&path) {
                Ok(relay) => relay,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return Ok(());
                }
            };
            let _ = ready_tx.send(Ok(relay.handle()));
            relay.run()
        });

        match ready_rx.recv() {
            Ok(Ok(handle)) => Ok(Self {
                forwarder: Forwarder::Local(handle),
                thread: Some(thread),
                child: None,
            }),
            Ok(Err(RelayError::Bus(BusError::NameTaken(path)))) => {
                let _ = thread.join();
                info!("relay already running at {}, forwarding to it", path.display());
                Ok(Self {
                    forwarder: Forwarder::Remote(RelayClient::connect(&path)?),
                    thread: None,
                    child: None,
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e.into())
            }
            Err(_) => Err(ListenerError::Launch(
                "relay thread exited before becoming ready".into(),
            )),
        }
    }

    /// Make sure a relay process owns the name, then connect to it.
    ///
    /// Ownership is queried exactly once.  `launcher` is only used when
    /// nobody owns the name.
    pub fn out_of_process(socket: &Path, launcher: &RelayLauncher) -> Result<Self, ListenerError> {
        let child = if name_has_owner(socket) {
            info!("relay already running at {}", socket.display());
            None
        } else {
            Some(launcher.launch(socket)?)
        };
        Ok(Self {
            forwarder: Forwarder::Remote(RelayClient::connect(socket)?),
            thread: None,
            child,
        })
    }

    /// Bring up the relay the way `mode` asks for.
    pub fn start(socket: &Path, mode: &RelayMode) -> Result<Self, ListenerError> {
        match mode {
            RelayMode::InProcess => Self::in_process(socket),
            RelayMode::OutOfProcess(launcher) => Self::out_of_process(socket, launcher),
        }
    }

    /// Collect the exit status of a relay process this connection launched,
    /// if it has exited.  A running relay is left alone.
    pub fn reap(&mut self) -> Option<ExitStatus> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                info!("relay process {} exited ({})", child.id(), status);
                self.child = None;
                Some(status)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("cannot query relay process {}: {}", child.id(), e);
                None
            }
        }
    }

    /// Stop a relay this connection started in-process.  A relay in another
    /// process is left running; if it has already exited it is reaped.
    pub fn shutdown(mut self) {
        self.reap();
        if let Forwarder::Local(handle) = &self.forwarder {
            if let Err(e) = handle.quit() {
                debug!("relay already stopped: {}", e);
            }
        }
        if let Some(thread) = self.thread {
            match thread.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("relay failed: {}", e),
                Err(_) => error!("relay thread panicked"),
            }
        }
    }
}

impl GestureSink for RelayConnection {
    type Error = ListenerError;

    fn touchpad_event(&mut self, event: GestureEvent) -> Result<(), ListenerError> {
        match &mut self.forwarder {
            Forwarder::Local(handle) => handle.touchpad_event(event)?,
            Forwarder::Remote(client) => {
                if let Err(e) = client.echo_signal(event) {
                    self.reap();
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }
}

/// Pump `source` through `interpreter` into `sink` until the source ends.
///
/// The source runs on its own thread; interpretation and forwarding happen
/// on the calling thread, one event at a time.  An event that cannot be
/// delivered is logged and dropped.
pub fn pump<S, K>(source: S, interpreter: &mut Interpreter, sink: &mut K) -> Result<(), ListenerError>
where
    S: MotionSource + 'static,
    K: GestureSink,
{
    let (tx, rx) = mpsc::channel::<RawMotionSample>();
    let mut source = source;
    let source_thread = std::thread::spawn(move || source.run(tx).map_err(|e| e.to_string()));

    for sample in rx {
        if let Some(event) = interpreter.feed(sample) {
            if let Err(e) = sink.touchpad_event(event) {
                error!("failed to forward {}: {}", event, e);
            }
        }
    }

    match source_thread.join() {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ListenerError::Source(e)),
        Err(_) => Err(ListenerError::Source("source thread panicked".into())),
    }
}

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ListenerOptions {
    /// Relay socket.
    pub socket: PathBuf,
    pub mode: RelayMode,
    pub thresholds: Thresholds,
}

/// Bring up the relay, then pump `source` until it ends.
pub fn run<S: MotionSource + 'static>(source: S, options: &ListenerOptions) -> Result<(), ListenerError> {
    let mut relay = RelayConnection::start(&options.socket, &options.mode)?;
    info!("relay ready, listening for gestures");

    let mut interpreter = Interpreter::new(options.thresholds);
    let result = pump(source, &mut interpreter, &mut relay);
    if result.is_ok() {
        warn!("motion source ended");
    }
    relay.shutdown();
    result
}

//  Tests
