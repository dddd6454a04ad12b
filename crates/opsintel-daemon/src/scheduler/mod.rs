//! Background scheduling
//!
//! The scheduler periodically scores the configured services with the outage
//! predictor and publishes the predictions onto the bus.

mod predictions;

pub use predictions::Scheduler;
