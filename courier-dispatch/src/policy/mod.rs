//! Policy abstractions for dispatch operations.
//!
//! Policies are plain configuration plus pure functions, kept apart from the
//! executor and orchestrator that apply them so they can be tested alone.
//!
//! - [`RetryPolicy`]: how many attempts a backend gets and how long to back off

pub mod retry;

pub use retry::RetryPolicy;
