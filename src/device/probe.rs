//! Touchpad discovery.
//!
//! Candidates are the numbered event nodes `/dev/input/event0` … `event19`,
//! tried in order.  A node qualifies when it can be opened for reading and
//! its sysfs capability bitmaps report both multi-touch positions
//! (`ABS_MT_POSITION_X`) and three-finger contact (`BTN_TOOL_TRIPLETAP`),
//! which is what swipe gestures need.
//!
//! Every candidate produces a typed [`ProbeFailure`] or a
//! [`TouchpadDevice`].  Only when all of them fail is the search an error.

use log::{debug, info};
use std::fmt;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Number of event nodes to try.
pub const MAX_EVENT_NODES: usize = 20;

const ABS_MT_POSITION_X: usize = 0x35;
const BTN_TOOL_TRIPLETAP: usize = 0x14e;

/// Bits per word in sysfs capability bitmaps (the kernel's `long`).
const LONG_BITS: usize = usize::BITS as usize;

/// A gesture-capable input device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchpadDevice {
    /// Event node, e.g. `/dev/input/event7`.
    pub node: PathBuf,
    /// Name reported by the kernel, if readable.
    pub name: Option<String>,
}

/// Why a candidate node was rejected.
#[derive(Debug, thiserror::Error)]
pub enum ProbeFailure {
    #[error("no such node")]
    Missing,
    #[error("permission denied")]
    PermissionDenied,
    #[error("open failed: {0}")]
    OpenFailed(std::io::Error),
    #[error("no gesture capability")]
    NoGestureCapability,
}

/// Errors from device discovery.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no touchpad among {} candidate(s): {}", .attempts.len(), Attempts(.attempts))]
    NoTouchpad {
        attempts: Vec<(PathBuf, ProbeFailure)>,
    },
}

struct Attempts<'a>(&'a [(PathBuf, ProbeFailure)]);

impl fmt::Display for Attempts<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (node, failure)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", node.display(), failure)?;
        }
        Ok(())
    }
}

/// Where to look for event nodes and their sysfs descriptions.
#[derive(Debug, Clone)]
pub struct ProbeRoots {
    /// Directory holding `eventN` nodes.  Default: `/dev/input`.
    pub dev: PathBuf,
    /// Directory holding `eventN/device/...` sysfs entries.
    /// Default: `/sys/class/input`.
    pub sys: PathBuf,
}

impl Default for ProbeRoots {
    fn default() -> Self {
        Self {
            dev: PathBuf::from("/dev/input"),
            sys: PathBuf::from("/sys/class/input"),
        }
    }
}

/// Parse a sysfs capability bitmap (hex words, most significant first).
fn parse_bitmap(text: &str) -> Vec<u64> {
    text.split_whitespace()
        .rev()
        .map(|word| u64::from_str_radix(word, 16).unwrap_or(0))
        .collect()
}

fn bitmap_has(words: &[u64], bit: usize) -> bool {
    words
        .get(bit / LONG_BITS)
        .map(|word| word & (1u64 << (bit % LONG_BITS)) != 0)
        .unwrap_or(false)
}

fn read_capability(sys_device: &Path, kind: &str) -> Option<Vec<u64>> {
    let path = sys_device.join("capabilities").join(kind);
    match std::fs::read_to_string(&path) {
        Ok(text) => Some(parse_bitmap(&text)),
        Err(e) => {
            debug!("cannot read {}: {}", path.display(), e);
            None
        }
    }
}

/// Probe one event node.
pub fn probe(roots: &ProbeRoots, index: usize) -> Result<TouchpadDevice, ProbeFailure> {
    let event = format!("event{}", index);
    let node = roots.dev.join(&event);

    File::open(&node).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ProbeFailure::Missing,
        ErrorKind::PermissionDenied => ProbeFailure::PermissionDenied,
        _ => ProbeFailure::OpenFailed(e),
    })?;

    let sys_device = roots.sys.join(&event).join("device");
    let abs = read_capability(&sys_device, "abs").ok_or(ProbeFailure::NoGestureCapability)?;
    let key = read_capability(&sys_device, "key").ok_or(ProbeFailure::NoGestureCapability)?;
    if !bitmap_has(&abs, ABS_MT_POSITION_X) || !bitmap_has(&key, BTN_TOOL_TRIPLETAP) {
        return Err(ProbeFailure::NoGestureCapability);
    }

    let name = std::fs::read_to_string(sys_device.join("name"))
        .ok()
        .map(|n| n.trim().to_string());
    Ok(TouchpadDevice { node, name })
}

/// Find the first gesture-capable node among `count` candidates.
pub fn find_touchpad(roots: &ProbeRoots, count: usize) -> Result<TouchpadDevice, DeviceError> {
    let mut attempts = Vec::new();
    for index in 0..count {
        match probe(roots, index) {
            Ok(device) => {
                info!(
                    "touchpad found at {} ({})",
                    device.node.display(),
                    device.name.as_deref().unwrap_or("unnamed")
                );
                return Ok(device);
            }
            Err(failure) => {
                let node = roots.dev.join(format!("event{}", index));
                debug!("skipping {}: {}", node.display(), failure);
                attempts.push((node, failure));
            }
        }
    }
    Err(DeviceError::NoTouchpad { attempts })
}
