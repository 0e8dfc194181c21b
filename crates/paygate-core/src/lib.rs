//! Shared web plumbing for Paygate services.
//!
//! Error-body shape, health handlers, correlation-id middleware, and tracing
//! initialization. Domain logic never lives here.

pub mod error;
pub mod health;
pub mod middleware;
pub mod tracing;
