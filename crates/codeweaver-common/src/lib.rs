//! Common utilities and patterns shared across CodeWeaver crates
//!
//! This crate provides shared functionality to reduce duplication across
//! the various CodeWeaver components: content hashing, capability flags,
//! correlation IDs, error-message hygiene, and environment bootstrap.

pub mod error;
pub mod features;
pub mod hash;
pub mod init;
pub mod tracing;

pub use error::{ERROR_EXCERPT_CHARS, error_excerpt, truncate_to_boundary};
pub use features::Feature;
pub use hash::{BlakeStore, ContentHash, blake_hash, blake_hash_file};
pub use init::initialize_environment;
pub use tracing::{CorrelationId, init_tracing};
