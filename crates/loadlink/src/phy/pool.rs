//! Persistent spin-worker pool
//!
//! Spawning threads per sample would dominate short sample windows, so
//! the workers are spawned once and parked on a barrier. Each round the
//! coordinating thread releases them, watches the clock until the
//! round's deadline, raises the round-over flag, and rendezvouses on a
//! second barrier. Workers spin on a private counter the whole time;
//! the counters double as load generation and tick measurement.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub(crate) struct SpinPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

#[derive(Debug)]
struct Shared {
    start: Barrier,
    finish: Barrier,
    round_over: AtomicBool,
    shutdown: AtomicBool,
    counters: Vec<AtomicU64>,
}

impl SpinPool {
    /// Spawn `workers` spin threads, parked until the first round
    pub(crate) fn new(workers: usize) -> Self {
        assert!(workers >= 1);
        let shared = Arc::new(Shared {
            // both barriers count the coordinating thread
            start: Barrier::new(workers + 1),
            finish: Barrier::new(workers + 1),
            round_over: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            counters: (0..workers).map(|_| AtomicU64::new(0)).collect(),
        });

        let handles = (0..workers)
            .map(|slot| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("phy-spin-{}", slot))
                    .spawn(move || spin_worker(shared, slot))
                    .expect("spawn phy worker")
            })
            .collect();

        Self {
            shared,
            workers: handles,
        }
    }

    /// Number of spin workers
    pub(crate) fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Run one round: spin all workers until `deadline`
    ///
    /// Blocks the calling thread until the deadline passes and all
    /// workers have stopped. Returns the summed tick count and the
    /// wall-clock span the workers were running.
    pub(crate) fn run_until(&self, deadline: Instant) -> (u64, Duration) {
        self.shared.round_over.store(false, Ordering::Relaxed);
        self.shared.start.wait();
        let started = Instant::now();

        while Instant::now() < deadline {
            std::hint::spin_loop();
        }

        self.shared.round_over.store(true, Ordering::Release);
        let stopped = Instant::now();
        self.shared.finish.wait();

        let ticks = self
            .shared
            .counters
            .iter()
            .map(|c| c.load(Ordering::Acquire))
            .sum();
        (ticks, stopped.duration_since(started))
    }
}

impl Drop for SpinPool {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.start.wait();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn spin_worker(shared: Arc<Shared>, slot: usize) {
    loop {
        shared.start.wait();
        if shared.shutdown.load(Ordering::Acquire) {
            return;
        }

        let mut ticks = 0u64;
        while !shared.round_over.load(Ordering::Relaxed) {
            ticks = ticks.wrapping_add(1);
        }

        shared.counters[slot].store(ticks, Ordering::Release);
        shared.finish.wait();
    }
}
