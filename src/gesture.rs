//! Types shared by every component.
//!
//! [`RawMotionSample`] is what a device source produces, [`GestureEvent`] is
//! what the interpreter emits and what the relay broadcasts, and
//! [`Direction`] is the quantized swipe direction carried by an event.
//!
//! On the bus, both fields of a [`GestureEvent`] travel as `u32`:
//! the finger count as-is and the direction as Right=0, Down=1, Left=2,
//! Up=3.

use std::fmt;

/// Quantized swipe direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Right,
    Down,
    Left,
    Up,
}

impl Direction {
    /// Wire encoding.
    pub fn as_u32(self) -> u32 {
        match self {
            Direction::Right => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Up => 3,
        }
    }

    /// Decode the wire encoding.  Returns `None` outside `0..=3`.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Direction::Right),
            1 => Some(Direction::Down),
            2 => Some(Direction::Left),
            3 => Some(Direction::Up),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Right => write!(f, "right"),
            Direction::Down => write!(f, "down"),
            Direction::Left => write!(f, "left"),
            Direction::Up => write!(f, "up"),
        }
    }
}

/// One raw swipe sample, decoded once at the device-source boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawMotionSample {
    /// Fingers touched down and started a swipe.
    Begin { fingers: u32 },
    /// Incremental finger movement since the previous sample.
    Update { fingers: u32, dx: f64, dy: f64 },
    /// Fingers lifted.  `cancelled` is set when the device aborted the
    /// gesture instead of completing it.
    End { fingers: u32, cancelled: bool },
}

/// A discrete gesture, the unit delivered across the process boundary.
///
/// `fingers` is 3 or 4 for a directional swipe.  The value 0 is the
/// sentinel "gesture ended" event, see [`GestureEvent::ended`]; its
/// direction carries no meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GestureEvent {
    pub fingers: u32,
    pub direction: Direction,
}

impl GestureEvent {
    pub fn new(fingers: u32, direction: Direction) -> Self {
        Self { fingers, direction }
    }

    /// The `{0, 0}` event emitted when a swipe ends.
    pub fn ended() -> Self {
        Self {
            fingers: 0,
            direction: Direction::Right,
        }
    }

    pub fn is_end(&self) -> bool {
        self.fingers == 0
    }

    /// Decode a `(fingers, direction)` pair as it arrives from the bus.
    pub fn from_wire(fingers: u32, direction: u32) -> Option<Self> {
        Direction::from_u32(direction).map(|d| Self::new(fingers, d))
    }

    /// Encode as the `(fingers, direction)` pair sent on the bus.
    pub fn to_wire(self) -> (u32, u32) {
        (self.fingers, self.direction.as_u32())
    }
}

impl fmt::Display for GestureEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_end() {
            write!(f, "end")
        } else {
            write!(f, "{}-finger {}", self.fingers, self.direction)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_wire_encoding() {
        assert_eq!(Direction::Right.as_u32(), 0);
        assert_eq!(Direction::Down.as_u32(), 1);
        assert_eq!(Direction::Left.as_u32(), 2);
        assert_eq!(Direction::Up.as_u32(), 3);
        assert_eq!(Direction::from_u32(4), None);
    }

    #[test]
    fn ended_event_is_zero_zero() {
        assert_eq!(GestureEvent::ended().to_wire(), (0, 0));
        assert!(GestureEvent::ended().is_end());
    }

    #[test]
    fn from_wire_rejects_bad_direction() {
        assert_eq!(GestureEvent::from_wire(3, 7), None);
        assert_eq!(
            GestureEvent::from_wire(4, 3),
            Some(GestureEvent::new(4, Direction::Up))
        );
    }

    #[test]
    fn display() {
        assert_eq!(GestureEvent::new(3, Direction::Left).to_string(), "3-finger left");
        assert_eq!(GestureEvent::ended().to_string(), "end");
    }
}
