//! Turns raw swipe samples into discrete [`GestureEvent`]s.
//!
//! # State machine
//!
//! | State         | Threshold      | Entered on                          |
//! |---------------|----------------|-------------------------------------|
//! | `Idle`        | first-motion   | start, swipe end                    |
//! | `Accumulating`| first-motion   | swipe begin                         |
//! | `Escalated`   | steady-state   | first emission within a swipe       |
//!
//! Each 3- or 4-finger update adds its delta to the accumulator.  Once the
//! larger accumulated axis reaches the current threshold, the interpreter
//! emits one event in the dominant direction, zeroes the accumulator and
//! switches to the steady-state threshold.  A swipe end always emits the
//! `{0, 0}` sentinel and drops back to the first-motion threshold.
//!
//! The steady-state threshold defaults to twice the first-motion one, so
//! repeated emissions within one swipe need *more* travel than the first.

use crate::gesture::{Direction, GestureEvent, RawMotionSample};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

/// The two motion thresholds, in device units of accumulated travel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Travel needed for the first emission of a swipe.  Default: `25.0`.
    pub first_motion: f64,
    /// Travel needed for every later emission in the same swipe.
    /// Default: `50.0`.
    pub motion: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            first_motion: 25.0,
            motion: 50.0,
        }
    }
}

/// Interpreter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Accumulating,
    Escalated,
}

/// Quantize an accumulated delta.  Ties between the axes go vertical.
pub fn classify(dx: f64, dy: f64) -> Direction {
    if dx.abs() > dy.abs() {
        if dx > 0.0 {
            Direction::Right
        } else {
            Direction::Left
        }
    } else if dy > 0.0 {
        Direction::Down
    } else {
        Direction::Up
    }
}

fn is_swipe_fingers(fingers: u32) -> bool {
    fingers == 3 || fingers == 4
}

/// The gesture state machine.  One per listener.
#[derive(Debug)]
pub struct Interpreter {
    thresholds: Thresholds,
    state: State,
    threshold: f64,
    dx: f64,
    dy: f64,
}

impl Interpreter {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            state: State::Idle,
            threshold: thresholds.first_motion,
            dx: 0.0,
            dy: 0.0,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Threshold the next emission has to reach.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Motion accumulated since the last emission or swipe begin.
    pub fn accumulated(&self) -> (f64, f64) {
        (self.dx, self.dy)
    }

    /// Feed one sample.  Returns the event it produced, if any.
    ///
    /// A sample produces at most one event.  Samples that do not matter
    /// (wrong finger count, motion below threshold) are dropped silently.
    pub fn feed(&mut self, sample: RawMotionSample) -> Option<GestureEvent> {
        match sample {
            RawMotionSample::Begin { fingers } => {
                trace!("swipe begin: {} fingers", fingers);
                self.dx = 0.0;
                self.dy = 0.0;
                self.threshold = self.thresholds.first_motion;
                self.state = State::Accumulating;
                None
            }
            RawMotionSample::Update { fingers, dx, dy } => self.update(fingers, dx, dy),
            RawMotionSample::End { fingers, cancelled } => {
                trace!("swipe end: {} fingers (cancelled: {})", fingers, cancelled);
                self.threshold = self.thresholds.first_motion;
                self.state = State::Idle;
                Some(GestureEvent::ended())
            }
        }
    }

    fn update(&mut self, fingers: u32, dx: f64, dy: f64) -> Option<GestureEvent> {
        if !is_swipe_fingers(fingers) {
            trace!("ignoring {}-finger update", fingers);
            return None;
        }
        if self.state == State::Idle {
            self.state = State::Accumulating;
        }

        self.dx += dx;
        self.dy += dy;
        let magnitude = self.dx.abs().max(self.dy.abs());
        if magnitude < self.threshold {
            return None;
        }

        let event = GestureEvent::new(fingers, classify(self.dx, self.dy));
        debug!(
            "emit {} (accumulated {:.1},{:.1}, threshold {})",
            event, self.dx, self.dy, self.threshold
        );
        self.dx = 0.0;
        self.dy = 0.0;
        self.threshold = self.thresholds.motion;
        self.state = State::Escalated;
        Some(event)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

//  Tests
