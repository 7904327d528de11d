//! Background workers.

mod expiry_worker;

pub use expiry_worker::{ExpiryWorker, ExpiryWorkerConfig};
