//! flogger-core: dispatch engine and entry store for flogger.
//!
//! Logging calls only record data and enqueue tasks; a pool of workers on
//! a dedicated tokio runtime runs the handlers. A failing handler is
//! reported and skipped, it never reaches the experiment that logged.

pub mod binding;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod models;
pub mod paths;
pub mod pool;
pub mod queue;
pub mod storage;
pub mod store;
pub mod telemetry;

pub use binding::{FnHandler, Handler, HandlerBinding, HandlerCall};
pub use config::LoggerConfig;
pub use dispatcher::Dispatcher;
pub use error::{FloggerError, Result};
pub use models::{DispatchStats, HandlerFailure, Options, Series, Snapshot, Value, WaitOutcome};
