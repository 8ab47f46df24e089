//! Campaign concurrency controller.
//!
//! Dispatches one call attempt per lead under two limits: a hard bound on
//! simultaneous in-flight calls and a minimum delay between consecutive
//! dispatches. Progress counters live on the campaign record and are
//! updated atomically on every attempt completion.

mod attempt;
mod controller;

pub use attempt::{AttemptOutcome, AttemptRunner, CallAttemptRunner};
pub use controller::{CampaignController, DispatchLimits};
