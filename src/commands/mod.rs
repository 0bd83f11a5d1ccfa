//! UI-facing commands
//!
//! Operations a view layer calls directly. Each takes the shared `AppState`.

pub mod auth;
pub mod bot;
pub mod dashboard;
