pub mod cache;
pub mod forwarder;
pub mod metrics;
pub mod notify;
pub mod vault;
