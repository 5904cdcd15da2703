//! **swipe-relay**: touchpad swipe gestures, broadcast to any number of
//! listeners.
//!
//! A listener pumps raw swipe samples from the touchpad, the
//! [`interpreter`] turns them into discrete directional
//! [`GestureEvent`](gesture::GestureEvent)s, and a singleton relay
//! re-broadcasts each one as a `TouchpadEvent` signal on the session bus.
//!
//! # Architecture
//!
//! Two traits keep the pieces apart:
//!
//! * [`traits::MotionSource`]: where raw samples come from
//!   ([`device::libinput`], [`device::hyprland`]).
//! * [`traits::GestureSink`]: where interpreted events go (the relay in
//!   this process, or one in another process reached over [`bus`]).
//!
//! [`listener`] wires a source, the interpreter and a relay together and
//! guarantees exactly one relay owns the well-known name.

pub mod bus;
pub mod config;
pub mod device;
pub mod gesture;
pub mod interpreter;
pub mod listener;
pub mod traits;
