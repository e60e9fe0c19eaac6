//! # marquee-control
//!
//! The control plane every Marquee request passes through:
//!
//! ```text
//! admit (RateLimiter) -> identify (TokenLedger) -> authorize (PermissionRegistry)
//!                                                    -> compare-and-swap (ConcurrencyGuard)
//! ```
//!
//! - [`RateLimiter`]: per-client token buckets with a periodic idle sweep
//! - [`ConcurrencyGuard`]: version-checked writes for any [`Versioned`](marquee_core::Versioned) record
//! - [`AccessDecisionSequencer`]: runs the stages in order and maps each
//!   failure onto a single [`DecisionCode`]
//! - [`BackgroundTasks`]: detached work that shutdown waits for

pub mod concurrency;
pub mod error;
pub mod limiter;
pub mod sequencer;
pub mod tasks;

pub use concurrency::{CasOutcome, ConcurrencyGuard, GuardError};
pub use error::{ControlError, LimiterError};
pub use limiter::{RateLimiter, parse_client_key, spawn_sweeper};
pub use sequencer::{AccessDecisionSequencer, DecisionCode, Rejection, Requirement};
pub use tasks::BackgroundTasks;
