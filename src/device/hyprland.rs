//! [`MotionSource`] reading touchpad swipes from Hyprland's event socket.
//!
//! When a Hyprland session owns the touchpad, the swipe samples are
//! available on its IPC event socket (`socket2`) as `EVENT>>DATA\n` lines:
//!
//! | Event           | Payload               | Meaning                               |
//! |-----------------|-----------------------|---------------------------------------|
//! | `swipebegin`    | `<fingers>`           | A multi-finger swipe has started      |
//! | `swipeupdate`   | `<fingers>,<dx>,<dy>` | Incremental finger movement (pixels)  |
//! | `swipeend`      | `<fingers>`           | Fingers lifted                        |
//!
//! The socket lives at
//! `$XDG_RUNTIME_DIR/hypr/$HYPRLAND_INSTANCE_SIGNATURE/.socket2.sock`.
//! No device enumeration happens in this mode: the compositor already
//! holds the device.

use crate::gesture::RawMotionSample;
use crate::traits::MotionSource;
use log::{error, info, trace, warn};
use std::io::{BufRead, BufReader};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::mpsc;

/// Error from the Hyprland source.
#[derive(Debug, thiserror::Error)]
#[error("hyprland gesture error: {0}")]
pub struct HyprlandError(String);

/// A [`MotionSource`] connected to Hyprland's `socket2`.
pub struct HyprlandSource {
    path: Option<PathBuf>,
}

impl HyprlandSource {
    /// Connect to the socket of the current Hyprland instance.
    pub fn new() -> Self {
        Self { path: None }
    }

    /// Connect to an explicit socket path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

impl Default for HyprlandSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the Hyprland event socket path.
fn socket2_path() -> Result<PathBuf, HyprlandError> {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .map_err(|_| HyprlandError("XDG_RUNTIME_DIR not set".into()))?;
    let his = std::env::var("HYPRLAND_INSTANCE_SIGNATURE")
        .map_err(|_| HyprlandError("HYPRLAND_INSTANCE_SIGNATURE not set".into()))?;
    Ok(PathBuf::from(format!(
        "{}/hypr/{}/.socket2.sock",
        runtime_dir, his
    )))
}

/// Split an `EVENT>>DATA` line.
fn parse_event_line(line: &str) -> Option<(&str, &str)> {
    let sep = line.find(">>")?;
    Some((&line[..sep], &line[sep + 2..]))
}

/// Decode one socket2 line into a sample.  Non-swipe events and malformed
/// payloads yield `None`.
pub fn parse_swipe_line(line: &str) -> Option<RawMotionSample> {
    let (raw_event, data) = parse_event_line(line)?;
    // Strip any namespace prefix ("touchpad:swipebegin" → "swipebegin").
    let event = raw_event
        .rsplit_once(':')
        .map(|(_, name)| name)
        .unwrap_or(raw_event);
    let data = data.trim();

    match event {
        "swipebegin" => Some(RawMotionSample::Begin {
            fingers: data.parse().ok()?,
        }),
        "swipeupdate" => {
            let parts: Vec<&str> = data.split(',').collect();
            if parts.len() != 3 {
                return None;
            }
            Some(RawMotionSample::Update {
                fingers: parts[0].trim().parse().ok()?,
                dx: parts[1].trim().parse().ok()?,
                dy: parts[2].trim().parse().ok()?,
            })
        }
        "swipeend" => Some(RawMotionSample::End {
            fingers: data.parse().ok()?,
            cancelled: false,
        }),
        _ => None,
    }
}

impl MotionSource for HyprlandSource {
    type Error = HyprlandError;

    /// Connect to Hyprland's event socket and forward swipe samples.
    ///
    /// This method **blocks** until the socket closes.  Run it on a
    /// dedicated thread.
    fn run(&mut self, sink: mpsc::Sender<RawMotionSample>) -> Result<(), Self::Error> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => socket2_path()?,
        };
        let stream = UnixStream::connect(&path)
            .map_err(|e| HyprlandError(format!("connect to {}: {}", path.display(), e)))?;
        info!("reading gestures from {}", path.display());

        let mut first_swipe_logged = false;
        for line in BufReader::new(stream).lines() {
            match line {
                Ok(line) if line.is_empty() => continue,
                Ok(line) => {
                    let Some(sample) = parse_swipe_line(&line) else {
                        continue;
                    };
                    if !first_swipe_logged {
                        info!("first swipe event received: {:?}", line);
                        first_swipe_logged = true;
                    }
                    trace!("{:?}", sample);
                    if sink.send(sample).is_err() {
                        info!("sink closed, shutting down");
                        return Ok(());
                    }
                }
                Err(e) => {
                    error!("socket2 read error: {}", e);
                    return Err(HyprlandError(format!("read error: {}", e)));
                }
            }
        }

        warn!("socket2 stream ended");
        Ok(())
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::test_util::tmp_socket_path;
    use std::io::Write;
    use std::os::unix::net::UnixListener;

    #[test]
    fn parse_event_line_valid() {
        assert_eq!(parse_event_line("swipebegin>>3"), Some(("swipebegin", "3")));
        assert_eq!(
            parse_event_line("swipeupdate>>3,10.5,-2.3"),
            Some(("swipeupdate", "3,10.5,-2.3"))
        );
    }

    #[test]
    fn parse_event_line_no_separator() {
        assert_eq!(parse_event_line("garbage"), None);
    }

    #[test]
    fn parse_swipes() {
        assert_eq!(
            parse_swipe_line("swipebegin>>4"),
            Some(RawMotionSample::Begin { fingers: 4 })
        );
        assert_eq!(
            parse_swipe_line("swipeupdate>>3,10.5,-2.5"),
            Some(RawMotionSample::Update {
                fingers: 3,
                dx: 10.5,
                dy: -2.5
            })
        );
        assert_eq!(
            parse_swipe_line("touchpad:swipeend>>3"),
            Some(RawMotionSample::End {
                fingers: 3,
                cancelled: false
            })
        );
    }

    #[test]
    fn unknown_and_malformed_events_ignored() {
        assert_eq!(parse_swipe_line("workspace>>2"), None);
        assert_eq!(parse_swipe_line("activewindow>>kitty,~"), None);
        assert_eq!(parse_swipe_line("swipeupdate>>3,10.5"), None);
        assert_eq!(parse_swipe_line("swipebegin>>x"), None);
    }

    #[test]
    fn run_reads_from_socket() {
        let path = tmp_socket_path();
        let listener = UnixListener::bind(&path).unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            writeln!(stream, "workspace>>2").unwrap();
            writeln!(stream, "swipebegin>>3").unwrap();
            writeln!(stream, "swipeupdate>>3,30.0,0.0").unwrap();
            writeln!(stream, "swipeend>>3").unwrap();
        });

        let (tx, rx) = mpsc::channel();
        HyprlandSource::with_path(&path).run(tx).unwrap();
        server.join().unwrap();

        let samples: Vec<_> = rx.try_iter().collect();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], RawMotionSample::Begin { fingers: 3 });
        let _ = std::fs::remove_file(&path);
    }
}
