//! [`MotionSource`] backed by libinput.
//!
//! Runs `libinput debug-events --device <node>` and decodes its swipe
//! lines.  Only three event kinds matter:
//!
//! ```text
//! -event7   GESTURE_SWIPE_BEGIN     +2.345s	3
//!  event7   GESTURE_SWIPE_UPDATE    +2.350s	3  2.31/-0.11 ( 4.50/-0.21 unaccelerated)
//!  event7   GESTURE_SWIPE_END       +2.600s	3
//!  event7   GESTURE_SWIPE_END       +2.600s	3 cancelled
//! ```
//!
//! The columns are: device, event kind, timestamp, finger count, then (for
//! updates) the accelerated `dx/dy`.  Everything else libinput prints
//! (device added, pointer motion, pinch gestures, …) is ignored.

use crate::device::probe::TouchpadDevice;
use crate::gesture::RawMotionSample;
use crate::traits::MotionSource;
use log::{debug, info, trace, warn};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;

/// Errors produced by the libinput source.
#[derive(Debug, thiserror::Error)]
pub enum LibinputError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("libinput exited with {0}")]
    Exited(ExitStatus),
}

/// Pumps swipe samples from one touchpad through `libinput debug-events`.
pub struct LibinputSource {
    node: PathBuf,
    program: String,
}

impl LibinputSource {
    /// Listen to `device` using the `libinput` binary from `PATH`.
    pub fn new(device: &TouchpadDevice) -> Self {
        Self {
            node: device.node.clone(),
            program: "libinput".into(),
        }
    }

    /// Use a different `libinput` executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn spawn(&self) -> Result<Child, LibinputError> {
        Command::new(&self.program)
            .arg("debug-events")
            .arg("--device")
            .arg(&self.node)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| LibinputError::Spawn {
                program: self.program.clone(),
                source,
            })
    }
}

/// Decode one `debug-events` line.  Returns `None` for anything that is not
/// a well-formed swipe line.
pub fn parse_debug_line(line: &str) -> Option<RawMotionSample> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return None;
    }
    let kind = tokens[1];
    if !kind.starts_with("GESTURE_SWIPE_") {
        return None;
    }
    let fingers = tokens[3].parse::<u32>().ok()?;

    match kind {
        "GESTURE_SWIPE_BEGIN" => Some(RawMotionSample::Begin { fingers }),
        "GESTURE_SWIPE_UPDATE" => {
            // "2.31/ -0.11 ( 4.50/-0.21 unaccelerated)" → "2.31/-0.11"
            let rest = tokens[4..].join(" ");
            let accelerated: String = rest
                .split('(')
                .next()?
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            let (dx, dy) = accelerated.split_once('/')?;
            Some(RawMotionSample::Update {
                fingers,
                dx: dx.parse().ok()?,
                dy: dy.parse().ok()?,
            })
        }
        "GESTURE_SWIPE_END" => Some(RawMotionSample::End {
            fingers,
            cancelled: tokens[4..].contains(&"cancelled"),
        }),
        _ => None,
    }
}

impl MotionSource for LibinputSource {
    type Error = LibinputError;

    /// Start libinput and forward its swipe samples.
    ///
    /// This method **blocks** until libinput exits or `sink` closes.  Run
    /// it on a dedicated thread.
    fn run(&mut self, sink: mpsc::Sender<RawMotionSample>) -> Result<(), Self::Error> {
        let mut child = self.spawn()?;
        info!("reading gestures from {} via {}", self.node.display(), self.program);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("libinput stdout not captured"))?;

        for line in BufReader::new(stdout).lines() {
            let line = line?;
            match parse_debug_line(&line) {
                Some(sample) => {
                    trace!("{:?}", sample);
                    if sink.send(sample).is_err() {
                        debug!("sink closed, stopping libinput");
                        let _ = child.kill();
                        let _ = child.wait();
                        return Ok(());
                    }
                }
                None => trace!("ignored: {}", line),
            }
        }

        let status = child.wait()?;
        if status.success() {
            warn!("libinput stream ended");
            Ok(())
        } else {
            Err(LibinputError::Exited(status))
        }
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_begin() {
        assert_eq!(
            parse_debug_line("-event7   GESTURE_SWIPE_BEGIN     +2.345s\t3"),
            Some(RawMotionSample::Begin { fingers: 3 })
        );
    }

    #[test]
    fn parse_update() {
        assert_eq!(
            parse_debug_line(
                " event7   GESTURE_SWIPE_UPDATE    +2.350s\t4  2.31/-0.11 ( 4.50/-0.21 unaccelerated)"
            ),
            Some(RawMotionSample::Update {
                fingers: 4,
                dx: 2.31,
                dy: -0.11
            })
        );
    }

    #[test]
    fn parse_update_with_padded_columns() {
        assert_eq!(
            parse_debug_line(" event7   GESTURE_SWIPE_UPDATE +1.000s\t3 -12.00/ 3.50 (-24.00/ 7.00 unaccelerated)"),
            Some(RawMotionSample::Update {
                fingers: 3,
                dx: -12.0,
                dy: 3.5
            })
        );
    }

    #[test]
    fn parse_end_and_cancelled_end() {
        assert_eq!(
            parse_debug_line(" event7   GESTURE_SWIPE_END       +2.600s\t3"),
            Some(RawMotionSample::End {
                fingers: 3,
                cancelled: false
            })
        );
        assert_eq!(
            parse_debug_line(" event7   GESTURE_SWIPE_END       +2.600s\t3 cancelled"),
            Some(RawMotionSample::End {
                fingers: 3,
                cancelled: true
            })
        );
    }

    #[test]
    fn unrelated_lines_ignored() {
        assert_eq!(parse_debug_line("-event7   DEVICE_ADDED     SynPS/2 Synaptics TouchPad"), None);
        assert_eq!(parse_debug_line(" event7   POINTER_MOTION   +3.1s  1.00/ 2.00"), None);
        assert_eq!(parse_debug_line(" event7   GESTURE_PINCH_BEGIN +1.0s\t2"), None);
        assert_eq!(parse_debug_line(""), None);
    }

    #[test]
    fn malformed_swipe_lines_ignored() {
        assert_eq!(parse_debug_line(" event7   GESTURE_SWIPE_UPDATE +1.0s\t3 garbage"), None);
        assert_eq!(parse_debug_line(" event7   GESTURE_SWIPE_BEGIN +1.0s\tthree"), None);
    }

    #[test]
    fn run_decodes_program_output() {
        // A stand-in for `libinput` that prints a fixed transcript.
        let script = std::env::temp_dir().join(format!(
            "swipe-relay-fake-libinput-{}.sh",
            std::process::id()
        ));
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             printf ' event7   DEVICE_ADDED  touchpad\\n'\n\
             printf ' event7   GESTURE_SWIPE_BEGIN +0.1s\\t3\\n'\n\
             printf ' event7   GESTURE_SWIPE_UPDATE +0.2s\\t3 30.00/ 0.00 (30.00/ 0.00 unaccelerated)\\n'\n\
             printf ' event7   GESTURE_SWIPE_END +0.3s\\t3\\n'\n",
        )
        .unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let device = TouchpadDevice {
            node: PathBuf::from("/dev/input/event7"),
            name: None,
        };
        let mut source = LibinputSource::new(&device).with_program(script.to_string_lossy());
        let (tx, rx) = mpsc::channel();
        source.run(tx).unwrap();

        let samples: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            samples,
            vec![
                RawMotionSample::Begin { fingers: 3 },
                RawMotionSample::Update {
                    fingers: 3,
                    dx: 30.0,
                    dy: 0.0
                },
                RawMotionSample::End {
                    fingers: 3,
                    cancelled: false
                },
            ]
        );
        let _ = std::fs::remove_file(&script);
    }
}
