//! Tick pacing and tick-keyed timers.
//!
//! The simulation runs at a fixed target rate with no catch-up: a tick that
//! overruns its period is simply late, and the next one starts immediately.
//! `TickPacer` measures each tick and reports how long the caller should wait
//! before starting the next one.
//!
//! Gameplay delays (respawn, periodic effect spawners) are `TimerQueue`
//! entries keyed to the tick counter rather than wall-clock timers, so that
//! cancelling all of a level's timers is a single deterministic `clear()`.

use std::time::{Duration, Instant};

const TICK_SAMPLE_COUNT: usize = 120;

pub struct TickPacer {
    pub period: Duration,
    pub tick_count: u64,
    pub overrun_count: u64,
    pub last_tick_time: Duration,
    pub smoothed_tick_ms: f64,
    tick_started: Option<Instant>,
    tick_samples: [f64; TICK_SAMPLE_COUNT],
    tick_sample_index: usize,
}

impl TickPacer {
    pub fn new(tick_hz: f64) -> Self {
        let period = Duration::from_secs_f64(1.0 / tick_hz);
        Self {
            period,
            tick_count: 0,
            overrun_count: 0,
            last_tick_time: Duration::ZERO,
            smoothed_tick_ms: 0.0,
            tick_started: None,
            tick_samples: [0.0; TICK_SAMPLE_COUNT],
            tick_sample_index: 0,
        }
    }

    pub fn begin_tick(&mut self) {
        self.tick_started = Some(Instant::now());
    }

    /// Close the current tick and return how long to wait before the next one.
    pub fn end_tick(&mut self) -> Duration {
        let elapsed = self
            .tick_started
            .take()
            .map(|start| start.elapsed())
            .unwrap_or(Duration::ZERO);
        self.record(elapsed)
    }

    fn record(&mut self, elapsed: Duration) -> Duration {
        self.tick_count += 1;
        self.last_tick_time = elapsed;

        self.tick_samples[self.tick_sample_index] = elapsed.as_secs_f64() * 1000.0;
        self.tick_sample_index = (self.tick_sample_index + 1) % TICK_SAMPLE_COUNT;
        let filled = (self.tick_count as usize).min(TICK_SAMPLE_COUNT);
        self.smoothed_tick_ms = self.tick_samples[..filled].iter().sum::<f64>() / filled as f64;

        if elapsed > self.period {
            self.overrun_count += 1;
            log::warn!(
                "Tick {} took {:.2}ms (period {:.2}ms); not catching up",
                self.tick_count,
                elapsed.as_secs_f64() * 1000.0,
                self.period.as_secs_f64() * 1000.0
            );
        }
        wait_after(self.period, elapsed)
    }
}

/// `max(0, period - elapsed)`.
pub fn wait_after(period: Duration, elapsed: Duration) -> Duration {
    period.saturating_sub(elapsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone)]
struct Timer<T> {
    handle: TimerHandle,
    due_tick: u64,
    every: Option<u64>,
    action: T,
}

/// One-shot and repeating actions scheduled against the tick counter.
#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    timers: Vec<Timer<T>>,
    next_handle: u64,
}

impl<T: Clone> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            timers: Vec::new(),
            next_handle: 1,
        }
    }

    /// Fire `action` once, `delay_ticks` after `now` (at least one tick later).
    pub fn schedule_once(&mut self, now: u64, delay_ticks: u64, action: T) -> TimerHandle {
        self.push(now + delay_ticks.max(1), None, action)
    }

    /// Fire `action` every `every_ticks`, first at `now + every_ticks`.
    pub fn schedule_repeating(&mut self, now: u64, every_ticks: u64, action: T) -> TimerHandle {
        let every = every_ticks.max(1);
        self.push(now + every, Some(every), action)
    }

    fn push(&mut self, due_tick: u64, every: Option<u64>, action: T) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.timers.push(Timer {
            handle,
            due_tick,
            every,
            action,
        });
        handle
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.handle != handle);
        self.timers.len() != before
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.timers.iter().any(|timer| timer.handle == handle)
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Actions due at or before `now`, in (due tick, scheduling order) order.
    /// One-shot timers are removed; repeating timers fire at most once per call
    /// and are rescheduled.
    pub fn take_due(&mut self, now: u64) -> Vec<T> {
        let mut due: Vec<(u64, TimerHandle, T)> = Vec::new();
        self.timers.retain_mut(|timer| {
            if timer.due_tick > now {
                return true;
            }
            due.push((timer.due_tick, timer.handle, timer.action.clone()));
            match timer.every {
                Some(every) => {
                    timer.due_tick += every;
                    if timer.due_tick <= now {
                        timer.due_tick = now + every;
                    }
                    true
                }
                None => false,
            }
        });
        due.sort_by_key(|(tick, handle, _)| (*tick, handle.0));
        due.into_iter().map(|(_, _, action)| action).collect()
    }
}

impl<T: Clone> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
