//! Single producer / single consumer over a pool of packet buffers.
//!
//! Elements are indices into a shared buffer table, the usual way to move
//! large objects through a ring without copying them.
//!
//! Run with: `RUST_LOG=debug cargo run --example spsc_ring`

use ringsync_rs::{Ring, RingError, SPSC_CONFIG};
use std::sync::Arc;
use std::thread;
use tracing::info;
use tracing_subscriber::EnvFilter;

const PACKETS: usize = 100_000;
const BURST: usize = 32;

fn main() -> Result<(), RingError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let payloads: Arc<Vec<String>> =
        Arc::new((0..PACKETS).map(|i| format!("packet-{i}")).collect());
    let ring = Ring::<usize>::create("spsc_demo", SPSC_CONFIG)?;

    let producer = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || {
            let mut next = 0;
            let mut batch = Vec::with_capacity(BURST);
            while next < PACKETS {
                batch.clear();
                batch.extend(next..(next + BURST).min(PACKETS));
                next += ring.enqueue_burst(&batch);
            }
        })
    };

    let mut received = 0;
    let mut bytes = 0;
    let mut out = [0usize; BURST];
    while received < PACKETS {
        let n = ring.dequeue_burst(&mut out);
        for &idx in &out[..n] {
            assert_eq!(idx, received, "out of order");
            bytes += payloads[idx].len();
            received += 1;
        }
    }
    producer.join().expect("producer thread panicked");

    info!(received, bytes, "spsc transfer complete");
    ring.destroy();
    Ok(())
}
