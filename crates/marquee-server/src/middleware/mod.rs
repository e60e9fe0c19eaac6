//! Request middleware, outermost first: metrics, then the access gate
//! (admission and identification).

pub mod access;
pub mod metrics;
