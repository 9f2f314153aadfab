//! Core types, remote contracts, and the session/declaration sync components
//! for the availability registry.
//!
//! Nothing here talks to a network or a database directly. Every remote
//! collaborator is a trait in [`store`] that is injected into the component
//! that uses it, so the HTTP client, the SQLite backend and the test fakes are
//! interchangeable.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

use std::time::Duration;

pub mod dashboard;
pub mod declaration;
pub mod declaration_store;
pub mod error;
pub mod identity;
pub mod marker;
pub mod optimistic;
pub mod profile;
pub mod session;
pub mod store;
pub mod subject;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use subject::SubjectId;

/// Upper bound applied to every remote call made by the core components.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
