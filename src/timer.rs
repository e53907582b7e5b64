//! Step countdown timer
//!
//! One-second countdown reporting a tick per second and a single completion.
//! Each run gets a [`TimerId`]; restarting cancels the previous run, and a
//! signal from a cancelled run can be recognised with
//! [`CountdownTimer::is_current`].

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const TICK: Duration = Duration::from_secs(1);

/// Identifies one timer run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSignalKind {
    /// One second elapsed
    Tick { remaining: u32 },
    /// Reached zero; sent once, after the final tick
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSignal {
    pub timer: TimerId,
    pub kind: TimerSignalKind,
}

/// Countdown arithmetic, independent of any clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    remaining: u32,
    completed: bool,
}

impl Countdown {
    #[must_use]
    pub const fn new(seconds: u32) -> Self {
        Self {
            remaining: seconds,
            completed: false,
        }
    }

    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed
    }

    /// Advance one second; returns the signals that second produces
    pub fn tick(&mut self) -> Vec<TimerSignalKind> {
        if self.completed {
            return Vec::new();
        }
        if self.remaining == 0 {
            self.completed = true;
            return vec![TimerSignalKind::Completed];
        }

        self.remaining -= 1;
        let mut out = vec![TimerSignalKind::Tick {
            remaining: self.remaining,
        }];
        if self.remaining == 0 {
            self.completed = true;
            out.push(TimerSignalKind::Completed);
        }
        out
    }
}

/// Countdown running on the tokio clock
pub struct CountdownTimer {
    signals: mpsc::UnboundedSender<TimerSignal>,
    next_id: u64,
    running: Option<(TimerId, JoinHandle<()>)>,
}

impl CountdownTimer {
    #[must_use]
    pub const fn new(signals: mpsc::UnboundedSender<TimerSignal>) -> Self {
        Self {
            signals,
            next_id: 0,
            running: None,
        }
    }

    /// Start counting down `seconds`, cancelling any previous run
    pub fn start(&mut self, seconds: u32) -> TimerId {
        self.cancel();

        self.next_id += 1;
        let id = TimerId(self.next_id);
        let signals = self.signals.clone();

        let task = tokio::spawn(async move {
            let mut countdown = Countdown::new(seconds);
            if seconds == 0 {
                let _ = signals.send(TimerSignal {
                    timer: id,
                    kind: TimerSignalKind::Completed,
                });
                return;
            }

            let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            while !countdown.is_completed() {
                interval.tick().await;
                for kind in countdown.tick() {
                    if signals.send(TimerSignal { timer: id, kind }).is_err() {
                        return;
                    }
                }
            }
        });

        tracing::debug!(timer = id.0, seconds, "timer started");
        self.running = Some((id, task));
        id
    }

    /// Stop the current run; no further signals are sent for it
    pub fn cancel(&mut self) {
        if let Some((id, task)) = self.running.take() {
            if !task.is_finished() {
                tracing::debug!(timer = id.0, "timer cancelled");
            }
            task.abort();
        }
    }

    /// Whether `id` is the run that was started last and not cancelled
    #[must_use]
    pub fn is_current(&self, id: TimerId) -> bool {
        self.running.as_ref().is_some_and(|(current, _)| *current == id)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|(_, task)| !task.is_finished())
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_ticks_then_completes_once() {
        let mut countdown = Countdown::new(2);
        assert_eq!(countdown.tick(), vec![TimerSignalKind::Tick { remaining: 1 }]);
        assert_eq!(
            countdown.tick(),
            vec![TimerSignalKind::Tick { remaining: 0 }, TimerSignalKind::Completed]
        );
        assert!(countdown.tick().is_empty());
        assert!(countdown.is_completed());
    }

    #[test]
    fn zero_countdown_completes_immediately() {
        let mut countdown = Countdown::new(0);
        assert_eq!(countdown.tick(), vec![TimerSignalKind::Completed]);
        assert!(countdown.tick().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn emits_one_tick_per_second() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = CountdownTimer::new(tx);
        let started = Instant::now();
        let id = timer.start(3);

        let mut remaining = Vec::new();
        loop {
            let signal = rx.recv().await.unwrap();
            assert_eq!(signal.timer, id);
            match signal.kind {
                TimerSignalKind::Tick { remaining: r } => remaining.push(r),
                TimerSignalKind::Completed => break,
            }
        }
        assert_eq!(remaining, vec![2, 1, 0]);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_signals() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = CountdownTimer::new(tx);
        timer.start(5);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        timer.cancel();
        timer.cancel();
        assert!(!timer.is_running());

        tokio::time::sleep(Duration::from_secs(10)).await;
        let mut ticks = 0;
        while let Ok(signal) = rx.try_recv() {
            assert_ne!(signal.kind, TimerSignalKind::Completed);
            ticks += 1;
        }
        assert_eq!(ticks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_previous_run() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = CountdownTimer::new(tx);
        let first = timer.start(10);
        let second = timer.start(2);
        assert!(!timer.is_current(first));
        assert!(timer.is_current(second));

        tokio::time::sleep(Duration::from_secs(3)).await;
        let mut seen = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            seen.push(signal);
        }
        assert!(seen.iter().all(|s| s.timer == second));
        assert_eq!(seen.last().map(|s| s.kind), Some(TimerSignalKind::Completed));
    }
}
