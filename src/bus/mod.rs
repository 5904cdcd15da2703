//! The session bus that carries gesture events between processes.
//!
//! A well-known name maps to one Unix stream socket.  Whoever has that socket
//! bound owns the name; everyone else is a client.  [`name_has_owner`] is
//! stricter and also wants the owner to answer a ping.
//!
//! * [`protocol`]: newline-delimited JSON requests, replies and signals.
//! * [`relay`]: the singleton service that owns the name and broadcasts
//!   `TouchpadEvent` signals.
//! * [`client`]: method calls (`EchoSignal`, `Quit`, `Ping`) and signal
//!   subscriptions.

pub mod client;
pub mod protocol;
pub mod relay;

use log::{debug, trace, warn};
use std::io::ErrorKind;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Well-known name of the relay service.
pub const BUS_NAME: &str = "org.swiperelay.Gestures";

/// Line a relay process prints on stdout once it owns the name.
pub const READY_LINE: &str = "READY";

/// Environment variable overriding the relay socket path.
pub const SOCKET_ENV: &str = "SWIPE_RELAY_SOCKET";

/// Pause before a refused socket is treated as stale.  A new owner may be
/// between `bind` and `listen`.
const STALE_RECHECK_DELAY: Duration = Duration::from_millis(50);

/// Socket path for a well-known name: `$XDG_RUNTIME_DIR/<name>.sock`.
pub fn socket_path_for(name: &str) -> PathBuf {
    let runtime = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(runtime).join(format!("{}.sock", name))
}

/// Socket path of the relay, honouring [`SOCKET_ENV`].
pub fn default_socket_path() -> PathBuf {
    match std::env::var_os(SOCKET_ENV) {
        Some(path) => PathBuf::from(path),
        None => socket_path_for(BUS_NAME),
    }
}

/// Errors produced on the bus.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("name already owned at {0}")]
    NameTaken(PathBuf),
    #[error("remote error: {0}")]
    Remote(String),
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
    #[error("connection closed by relay")]
    Closed,
}

/// Does a live process currently own the name behind `path`?
///
/// A socket file nobody answers on counts as unowned.
pub fn name_has_owner(path: &Path) -> bool {
    let mut client = match client::RelayClient::connect(path) {
        Ok(client) => client,
        Err(e) => {
            trace!("no owner at {}: {}", path.display(), e);
            return false;
        }
    };
    match client.ping() {
        Ok(()) => true,
        Err(e) => {
            debug!("{} exists but did not answer: {}", path.display(), e);
            false
        }
    }
}

/// Removes the socket file when the owner goes away.
#[derive(Debug)]
pub struct NameGuard {
    path: PathBuf,
}

impl NameGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for NameGuard {
    fn drop(&mut self) {
        debug!("releasing {}", self.path.display());
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Take ownership of the name behind `path`.
///
/// Fails with [`BusError::NameTaken`] whenever something is listening on
/// the socket, answering or not.  Only a socket that refuses connections
/// (left behind by a dead owner) is removed and replaced.
pub fn acquire_name(path: &Path) -> Result<(NameGuard, UnixListener), BusError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match UnixStream::connect(path) {
        Ok(_) => return Err(BusError::NameTaken(path.to_path_buf())),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
            std::thread::sleep(STALE_RECHECK_DELAY);
            match UnixStream::connect(path) {
                Ok(_) => return Err(BusError::NameTaken(path.to_path_buf())),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                    warn!("removing stale socket {}", path.display());
                    match std::fs::remove_file(path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(e) => return Err(e.into()),
    }

    // `bind` refuses an existing path, so of two racing owners only one
    // gets past here.
    let listener = match UnixListener::bind(path) {
        Ok(listener) => listener,
        Err(e) if e.kind() == ErrorKind::AddrInUse => {
            return Err(BusError::NameTaken(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    let guard = NameGuard {
        path: path.to_path_buf(),
    };
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok((guard, listener))
}

/// Open a raw connection to whoever owns `path`.
pub(crate) fn connect(path: &Path) -> Result<UnixStream, BusError> {
    Ok(UnixStream::connect(path)?)
}

#[cfg(test)]
pub(crate) mod test_util {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Monotonic counter to generate unique socket paths per test.
    static TEST_ID: AtomicU32 = AtomicU32::new(0);

    /// A unique temporary socket path for each test.
    pub fn tmp_socket_path() -> PathBuf {
        let id = TEST_ID.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "swipe-relay-test-{}-{}.sock",
            std::process::id(),
            id
        ))
    }
}
