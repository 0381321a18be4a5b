#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! The dispatch pipeline: catalog, bounded ingress queue, and the fixed-size
//! worker pool that performs admission control, job submission, and
//! requeue-on-denial.

mod api;
mod engine;
mod jobbuilder;
mod queue;
mod worker;

/// Configuration catalog: loads and serves the
/// `(resource, event) -> binding + template` mapping.
pub mod catalog;

/// The concurrency gate's admission arithmetic.
pub mod gate;

pub use api::{start_engine, EngineConfig, EngineEvent, EngineHandle};
pub use catalog::{Catalog, CatalogError};
pub use jobbuilder::build_job;
pub use queue::Sender as QueueSender;
