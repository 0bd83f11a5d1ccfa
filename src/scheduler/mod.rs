//! Scheduler module
//!
//! Background tasks that run for the lifetime of the client:
//! - Periodic bearer credential refresh

mod token_refresh;

pub use token_refresh::TokenRefreshScheduler;
