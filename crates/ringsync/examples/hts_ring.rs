//! Priority filter on an HTS ring using peek/commit.
//!
//! Consumers peek at the next task and take it only when its priority
//! matches their lane; otherwise they leave it in place for the other lane.
//!
//! Run with: `RUST_LOG=debug cargo run --example hts_ring`

use ringsync_rs::{Ring, RingConfig, RingMode, Role, WorkerPool};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const TASKS: u32 = 10_000;

/// Task handle: low bit is the priority lane.
fn lane_of(task: u32) -> usize {
    (task & 1) as usize
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let ring = Ring::<u32>::create("hts_tasks", RingConfig::new(256, RingMode::HTS))?;
    let done = Arc::new(AtomicU32::new(0));
    let done_in = Arc::clone(&done);

    // One producer, two consumers: consumer 0 takes even tasks, consumer 1 odd.
    let pool = WorkerPool::launch(&ring, 1, 2, move |ctx| {
        let mut handled = 0u32;
        let Ok(ring) = Ring::<u32>::lookup("hts_tasks") else {
            return handled;
        };
        match ctx.role() {
            Role::Producer => {
                for task in 0..TASKS {
                    while ring.enqueue(task).is_err() {
                        thread::yield_now();
                    }
                }
                debug!("all tasks queued");
            }
            Role::Consumer => {
                let lane = ctx.id();
                while !ctx.should_stop() {
                    let Ok(peek) = ring.dequeue_start(1) else {
                        thread::yield_now();
                        continue;
                    };
                    match peek.get(0) {
                        Some(task) if lane_of(task) == lane => {
                            peek.accept();
                            handled += 1;
                            done_in.fetch_add(1, Ordering::Release);
                        }
                        _ => {
                            peek.reject();
                            thread::yield_now();
                        }
                    }
                }
            }
        }
        handled
    })?;

    while done.load(Ordering::Acquire) < TASKS {
        thread::yield_now();
    }
    pool.request_stop();

    for report in pool.join()? {
        if report.role == Role::Consumer {
            info!(lane = report.id, handled = report.output, "lane finished");
        }
    }
    info!(remaining = ring.count(), "priority lanes drained");

    ring.destroy();
    Ok(())
}
