//! Pacing sources for the batch writer.
//!
//! A writer awaits one tick after every batch and uses the returned time as
//! its timestamp cursor.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

#[async_trait]
pub trait Tick: Send {
    /// Wait for the next tick and return the current wall-clock time.
    async fn tick(&mut self) -> DateTime<Utc>;
}

/// Ticks every `period`, skipping ticks missed while a send was in flight.
pub struct IntervalTick {
    interval: Interval,
}

impl IntervalTick {
    /// The first tick fires one `period` after creation.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero.
    pub fn new(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }
}

#[async_trait]
impl Tick for IntervalTick {
    async fn tick(&mut self) -> DateTime<Utc> {
        self.interval.tick().await;
        Utc::now()
    }
}

/// No pacing: yields to the scheduler and returns immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unthrottled;

#[async_trait]
impl Tick for Unthrottled {
    async fn tick(&mut self) -> DateTime<Utc> {
        tokio::task::yield_now().await;
        Utc::now()
    }
}

/// How writers are paced, resolved from the run settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    Interval(Duration),
    Unthrottled,
}

impl Pacing {
    /// `fast` wins over any tick interval; a zero interval is unthrottled.
    pub fn from_settings(tick: Duration, fast: bool) -> Self {
        if fast || tick.is_zero() {
            Pacing::Unthrottled
        } else {
            Pacing::Interval(tick)
        }
    }

    /// A fresh tick source for one writer.
    pub fn ticker(&self) -> Box<dyn Tick> {
        match *self {
            Pacing::Interval(period) if !period.is_zero() => Box::new(IntervalTick::new(period)),
            _ => Box::new(Unthrottled),
        }
    }
}
