//! Operations over the tutoring tree: user deletion, the reporting
//! projection, discussion notifications and account maintenance.

pub mod accounts;
pub mod config;
pub mod deleter;
pub mod error;
pub mod identity;
pub mod notifications;
pub mod projector;
pub mod providers;
pub mod push;
pub mod snapshot;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ServiceError, ServiceResult};
