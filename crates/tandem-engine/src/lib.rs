//! # tandem-engine
//!
//! Event dispatch, processors, timeline rollup, and delivery fan-out for
//! the tandem notification engine.
//!
//! Data flow: a mutation records an [`Event`](tandem_core::Event) row →
//! the [`EventWorker`] claims it asynchronously → the [`Dispatcher`] routes
//! it to the processor registered for its `(subject kind, action)` pair →
//! the processor returns [`Effects`] → the applier executes them with
//! idempotent upserts, enforcing the notification invariants and enqueuing
//! per-channel delivery jobs.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tandem_db::Database;
//! use tandem_engine::{Dispatcher, EventWorker, Store, WorkerConfig};
//!
//! let db = Database::connect("postgres://localhost/tandem").await?;
//! let dispatcher = Dispatcher::new(Store::postgres(&db));
//! let handle = EventWorker::new(dispatcher, WorkerConfig::from_env()).start();
//! // ... on shutdown:
//! handle.shutdown().await?;
//! ```

pub mod dispatcher;
pub mod effects;
pub mod notify;
pub mod processors;
pub mod references;
pub mod rollup;
pub mod store;
pub mod telemetry;
pub mod test_support;
pub mod worker;

#[cfg(test)]
mod tests;

pub use dispatcher::{Dispatcher, EventProcessor};
pub use effects::{apply, ApplyStats, Effect, Effects};
pub use rollup::RollupOutcome;
pub use store::Store;
pub use telemetry::init_tracing;
pub use worker::{EventWorker, WorkerConfig, WorkerEvent, WorkerHandle};
