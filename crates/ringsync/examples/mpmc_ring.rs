//! Fan-in / fan-out: several producers and consumers on one MPMC ring,
//! driven by a `WorkerPool`.
//!
//! Run with: `RUST_LOG=info cargo run --example mpmc_ring`

use ringsync_rs::{Ring, RingConfig, RingMode, Role, WorkerPool};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::info;
use tracing_subscriber::EnvFilter;

const PRODUCERS: usize = 4;
const CONSUMERS: usize = 4;
const PER_PRODUCER: u64 = 250_000;
const BURST: usize = 32;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = RingConfig::new(2048, RingMode::MPMC).with_metrics(true);
    let ring = Arc::new(Ring::<u64>::new(config)?);
    let total = PRODUCERS as u64 * PER_PRODUCER;
    let remaining = Arc::new(AtomicU64::new(total));
    let remaining_in = Arc::clone(&remaining);

    let pool = WorkerPool::launch(&ring, PRODUCERS, CONSUMERS, move |ctx| {
        let ring = ctx.ring();
        let mut sum = 0u64;
        match ctx.role() {
            Role::Producer => {
                let base = ctx.id() as u64 * PER_PRODUCER;
                let mut sent = 0u64;
                let mut batch = Vec::with_capacity(BURST);
                while sent < PER_PRODUCER {
                    batch.clear();
                    let end = (sent + BURST as u64).min(PER_PRODUCER);
                    batch.extend((sent..end).map(|i| base + i));
                    let n = ring.enqueue_burst(&batch);
                    sum += batch[..n].iter().sum::<u64>();
                    sent += n as u64;
                    if n == 0 {
                        thread::yield_now();
                    }
                }
            }
            Role::Consumer => {
                let mut out = [0u64; BURST];
                while remaining_in.load(Ordering::Acquire) > 0 {
                    let n = ring.dequeue_burst(&mut out);
                    if n == 0 {
                        thread::yield_now();
                        continue;
                    }
                    remaining_in.fetch_sub(n as u64, Ordering::AcqRel);
                    sum += out[..n].iter().sum::<u64>();
                }
            }
        }
        sum
    })?;

    let reports = pool.join()?;
    let sent: u64 = reports.iter().filter(|r| r.role == Role::Producer).map(|r| r.output).sum();
    let got: u64 = reports.iter().filter(|r| r.role == Role::Consumer).map(|r| r.output).sum();
    assert_eq!(sent, got, "checksum mismatch");

    let m = ring.metrics();
    info!(
        elements = total,
        enqueue_calls = m.enqueue_calls,
        full = m.full,
        empty = m.empty,
        cas_retries = m.cas_retries,
        "mpmc transfer complete"
    );
    Ok(())
}
