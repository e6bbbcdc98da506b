//! Periodic trigger for refresh passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// How often the shutdown flag is checked while waiting
const POLL_STEP: Duration = Duration::from_millis(200);

pub struct Scheduler {
    interval: Duration,
    poll_step: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            poll_step: POLL_STEP.min(interval),
        }
    }

    /// Call `tick` immediately, then once per interval, until `shutdown`
    /// is set. The interval is measured from the start of each tick. A tick
    /// that overruns the interval is followed by the next one straight away.
    /// Returns the number of ticks run.
    pub fn run(&self, shutdown: &AtomicBool, mut tick: impl FnMut()) -> u64 {
        let mut ticks = 0;
        while !shutdown.load(Ordering::SeqCst) {
            let started = Instant::now();
            tick();
            ticks += 1;

            let next = started + self.interval;
            while !shutdown.load(Ordering::SeqCst) {
                let now = Instant::now();
                if now >= next {
                    break;
                }
                thread::sleep(self.poll_step.min(next - now));
            }
        }
        log::info!("scheduler stopped after {ticks} passes");
        ticks
    }
}
