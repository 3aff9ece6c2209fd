//! Notification dispatch pipeline.
//!
//! Recipient loading, due-date filtering, template rendering and the
//! single-flight background worker that drives an automation channel.

pub mod filter;
pub mod loader;
pub mod render;
pub mod status;
pub mod throttle;
pub mod worker;

pub use filter::{Clock, FixedClock, SystemClock};
pub use status::{StatusTracker, StatusWriter};
pub use throttle::SendThrottle;
pub use worker::{DispatchSettings, DispatchWorker, Dispatcher, RunOutcome};
