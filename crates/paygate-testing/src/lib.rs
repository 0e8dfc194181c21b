//! Test utilities for Paygate services.
//!
//! Provides legacy credential-header builders and a test token signer.
//! Import in `#[cfg(test)]` blocks and `tests/` targets only — never in
//! production code.

pub mod auth;
pub mod token;
