//! Token claims, compact HS256 codec, and credential crypto shared by the
//! gateway (which mints tokens) and downstream validators (which only verify).
//!
//! Token *minting* requires the **`USE_ONLY_IN_EAPI`** cargo feature. Only the
//! gateway service enables it because it is the sole token issuer; every other
//! consumer gets the verify/parse surface alone.

pub mod claims;
pub mod codec;
pub mod crypto;
pub mod validator;
