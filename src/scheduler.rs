//! Tick scheduling for the refresh loop.
//!
//! A [`Scheduler`] owns a [`Timeline`] of armed deadlines, measured from the
//! scheduler's start. [`TokioScheduler`] waits for them on the real clock,
//! [`VirtualScheduler`] jumps straight to them.

use std::future::Future;
use std::time::Duration;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

pub trait Scheduler {
    /// Arm a single tick `delay` from now.
    fn schedule_once(&mut self, delay: Duration);

    /// Arm a tick every `interval`, the first one `interval` from now.
    fn schedule_repeating(&mut self, interval: Duration);

    /// Wait for the earliest armed tick and return its offset from the start.
    ///
    /// Resolves to `None` when nothing is armed. Dropping the future before it
    /// resolves leaves the tick armed.
    fn next_tick(&mut self) -> impl Future<Output = Option<Duration>> + Send;
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    due: Duration,
    every: Option<Duration>,
}

/// Armed deadlines, as offsets from a start point.
#[derive(Debug, Default)]
pub struct Timeline {
    entries: Vec<Entry>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm_once(&mut self, due: Duration) {
        self.entries.push(Entry { due, every: None });
    }

    pub fn arm_repeating(&mut self, first_due: Duration, every: Duration) {
        self.entries.push(Entry {
            due: first_due,
            every: Some(every.max(MIN_INTERVAL)),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest armed deadline.
    pub fn peek(&self) -> Option<Duration> {
        self.entries.iter().map(|e| e.due).min()
    }

    /// Fire the earliest deadline. Repeating entries move to their next
    /// deadline after `now`; missed periods are skipped.
    pub fn pop(&mut self, now: Duration) -> Option<Duration> {
        let (idx, entry) = self
            .entries
            .iter()
            .copied()
            .enumerate()
            .min_by_key(|(_, e)| e.due)?;

        match entry.every {
            Some(every) => {
                let mut next = entry.due + every;
                while next <= now {
                    next += every;
                }
                self.entries[idx].due = next;
            }
            None => {
                self.entries.remove(idx);
            }
        }

        Some(entry.due)
    }
}

/// Scheduler on the tokio clock.
#[derive(Debug)]
pub struct TokioScheduler {
    start: tokio::time::Instant,
    timeline: Timeline,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self {
            start: tokio::time::Instant::now(),
            timeline: Timeline::new(),
        }
    }

    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&mut self, delay: Duration) {
        let due = self.now() + delay;
        self.timeline.arm_once(due);
    }

    fn schedule_repeating(&mut self, interval: Duration) {
        let due = self.now() + interval;
        self.timeline.arm_repeating(due, interval);
    }

    async fn next_tick(&mut self) -> Option<Duration> {
        let due = self.timeline.peek()?;
        tokio::time::sleep_until(self.start + due).await;
        let now = self.now();
        self.timeline.pop(now)
    }
}

/// Scheduler on a virtual clock that advances instantly to each deadline.
///
/// Ticks past the optional horizon are never delivered.
#[derive(Debug, Default)]
pub struct VirtualScheduler {
    now: Duration,
    horizon: Option<Duration>,
    timeline: Timeline,
}

impl VirtualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop delivering ticks due after `horizon`.
    pub fn until(mut self, horizon: Duration) -> Self {
        self.horizon = Some(horizon);
        self
    }

    pub fn now(&self) -> Duration {
        self.now
    }
}

impl Scheduler for VirtualScheduler {
    fn schedule_once(&mut self, delay: Duration) {
        self.timeline.arm_once(self.now + delay);
    }

    fn schedule_repeating(&mut self, interval: Duration) {
        self.timeline.arm_repeating(self.now + interval, interval);
    }

    async fn next_tick(&mut self) -> Option<Duration> {
        let due = self.timeline.peek()?;
        if self.horizon.is_some_and(|horizon| due > horizon) {
            return None;
        }
        self.now = self.now.max(due);
        self.timeline.pop(self.now)
    }
}
