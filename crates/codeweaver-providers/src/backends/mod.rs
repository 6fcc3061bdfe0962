//! Concrete provider backends

pub mod memory;
pub mod mock;
#[cfg(feature = "qdrant")]
pub mod qdrant;
