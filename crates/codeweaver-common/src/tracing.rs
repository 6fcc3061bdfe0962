//! Correlation IDs and tracing subscriber setup

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Correlation ID threaded through pipeline operations so one query or
/// indexing run can be followed across log records.
///
/// UUIDv7, like every other identifier in the system, so ids sort by
/// creation time in log aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a fresh, time-ordered correlation ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// The underlying UUID.
    pub fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Initialize the global tracing subscriber.
///
/// Respects `RUST_LOG`; falls back to `info` for codeweaver crates. Safe to
/// call more than once - subsequent calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,codeweaver=debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_ids_are_unique() {
        assert_ne!(CorrelationId::new(), CorrelationId::new());
    }

    #[test]
    fn test_uuid_roundtrip() {
        let id = CorrelationId::new();
        let via_uuid = CorrelationId::from(id.to_uuid());
        assert_eq!(id, via_uuid);
        assert_eq!(id.to_string(), via_uuid.to_string());
    }

    #[test]
    fn test_ids_are_time_ordered() {
        let earlier = CorrelationId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let later = CorrelationId::new();
        assert!(earlier.to_uuid() < later.to_uuid());
    }
}
