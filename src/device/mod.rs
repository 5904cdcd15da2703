//! Raw input backends.
//!
//! [`probe`] finds the touchpad, and [`libinput`] and [`hyprland`] provide
//! [`MotionSource`](crate::traits::MotionSource) implementations that
//! deliver its swipe samples.

pub mod hyprland;
pub mod libinput;
pub mod probe;
