//! Core traits that decouple the listener from any specific input backend or
//! relay transport.
//!
//! * [`MotionSource`]: where raw swipe samples come from (libinput, the
//!   Hyprland event socket, a test harness, …).
//! * [`GestureSink`]: where interpreted [`GestureEvent`]s go (the relay in
//!   this process, a relay in another process, a test recorder, …).

use crate::gesture::{GestureEvent, RawMotionSample};
use std::sync::mpsc;

/// A source of [`RawMotionSample`]s.
///
/// # Contract
///
/// * [`run`](MotionSource::run) **blocks** until the source is exhausted or
///   an unrecoverable error occurs.
/// * Only swipe begin/update/end samples are forwarded; everything else the
///   backend reports is dropped before reaching `sink`.
/// * Samples are sent in the order the backend produced them.
/// * A closed `sink` ends the source with `Ok(())`.
pub trait MotionSource: Send {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Start pumping samples into `sink`.
    fn run(&mut self, sink: mpsc::Sender<RawMotionSample>) -> Result<(), Self::Error>;
}

/// Destination for interpreted gesture events.
///
/// Calls are made from a single thread, one at a time, in emission order.
/// An implementation must not reorder or coalesce them.
pub trait GestureSink {
    /// The error type produced when an event cannot be delivered.
    type Error: std::error::Error + Send + 'static;

    /// Deliver one event.
    fn touchpad_event(&mut self, event: GestureEvent) -> Result<(), Self::Error>;
}
