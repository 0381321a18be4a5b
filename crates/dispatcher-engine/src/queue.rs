//! The bounded, multi-producer multi-consumer ingress queue.
//!
//! `tokio::sync::mpsc` gives many-producer/single-consumer for free; wrapping
//! the receiver in an `Arc<Mutex<..>>` lets every worker in the pool race to
//! `recv()` from the same channel, which is the many-consumer half.

use std::sync::Arc;

use dispatcher_model::Job;
use tokio::sync::{mpsc, Mutex};

/// Producer handle. Cloned freely by the ingress adapter and by workers
/// re-enqueueing a job after a concurrency-gate denial.
pub type Sender = mpsc::Sender<Job>;

/// Consumer handle, shared by every worker in the pool.
pub type SharedReceiver = Arc<Mutex<mpsc::Receiver<Job>>>;

/// Build a bounded queue with the given capacity (minimum 1).
pub fn bounded(capacity: usize) -> (Sender, SharedReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, Arc::new(Mutex::new(rx)))
}
