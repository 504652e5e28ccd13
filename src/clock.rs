use std::time::{Duration, Instant};

use crate::core::{Year, YearRange};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PlayState {
    Playing,
    Paused,
}

/// Time-index state machine for one view. Owns the current year, the loop
/// bounds, the tick interval, and the play flag; nothing else mutates them.
#[derive(Clone, Debug)]
pub struct AnimationClock {
    current: Year,
    bounds: YearRange,
    interval: Duration,
    state: PlayState,
}

impl AnimationClock {
    /// New clocks start `Playing` at the lower bound.
    pub fn new(bounds: YearRange, interval: Duration) -> Self {
        Self {
            current: bounds.first,
            bounds,
            interval,
            state: PlayState::Playing,
        }
    }

    /// Advance one step, wrapping past the upper bound back to the start
    /// (the race loops, it does not stop).
    pub fn tick(&mut self) -> Year {
        let next = self.current.next();
        self.current = if self.bounds.contains(next) {
            next
        } else {
            self.bounds.first
        };
        self.current
    }

    pub fn pause(&mut self) {
        self.state = PlayState::Paused;
    }

    /// Resume without resetting the current year.
    pub fn resume(&mut self) {
        self.state = PlayState::Playing;
    }

    pub fn toggle(&mut self) -> PlayState {
        self.state = match self.state {
            PlayState::Playing => PlayState::Paused,
            PlayState::Paused => PlayState::Playing,
        };
        self.state
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Manual scrub; independent of play state.
    pub fn scrub(&mut self, year: Year) {
        self.current = self.bounds.clamp(year);
    }

    pub fn current(&self) -> Year {
        self.current
    }

    pub fn bounds(&self) -> YearRange {
        self.bounds
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }
}

/// Source of monotonic now-instants, injectable so tests drive time by hand.
pub trait TimeSource {
    fn now(&self) -> Instant;
}

/// Wall-clock time source for production use.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced time source (test double).
#[derive(Debug)]
pub struct ManualTime {
    now: std::cell::Cell<Instant>,
}

impl ManualTime {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            now: std::cell::Cell::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl TimeSource for &ManualTime {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

impl TimeSource for std::rc::Rc<ManualTime> {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Deadline-driven player wrapping an [`AnimationClock`].
///
/// The embedder calls [`Player::poll`] from its event loop; a tick fires when
/// the armed deadline has passed. Pausing disarms the deadline immediately so
/// no stale tick can land after the view went inactive, and speed changes
/// re-arm from "now" with no partial-interval carry-over.
#[derive(Debug)]
pub struct Player<T: TimeSource = SystemTimeSource> {
    clock: AnimationClock,
    time: T,
    deadline: Option<Instant>,
}

impl<T: TimeSource> Player<T> {
    pub fn new(clock: AnimationClock, time: T) -> Self {
        let deadline = clock
            .is_playing()
            .then(|| time.now() + clock.interval());
        Self {
            clock,
            time,
            deadline,
        }
    }

    /// Advance at most one step if the deadline has passed. A late poll still
    /// ticks a single year; the next deadline is armed from the poll instant.
    pub fn poll(&mut self) -> Option<Year> {
        if !self.clock.is_playing() {
            return None;
        }
        let now = self.time.now();
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        let year = self.clock.tick();
        self.deadline = Some(now + self.clock.interval());
        Some(year)
    }

    pub fn pause(&mut self) {
        self.clock.pause();
        self.deadline = None;
    }

    pub fn resume(&mut self) {
        self.clock.resume();
        self.deadline = Some(self.time.now() + self.clock.interval());
    }

    pub fn toggle_play(&mut self) -> PlayState {
        if self.clock.is_playing() {
            self.pause();
            PlayState::Paused
        } else {
            self.resume();
            PlayState::Playing
        }
    }

    /// Change the tick interval. While playing, the pending deadline is
    /// cancelled and re-armed with the new interval.
    pub fn set_speed(&mut self, interval: Duration) {
        self.clock.set_interval(interval);
        if self.clock.is_playing() {
            self.deadline = Some(self.time.now() + interval);
        }
    }

    pub fn scrub(&mut self, year: Year) {
        self.clock.scrub(year);
    }

    pub fn clock(&self) -> &AnimationClock {
        &self.clock
    }
}
