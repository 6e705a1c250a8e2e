//! Dependency probes.

use serde::Serialize;

use crate::identity::source::IdentitySource;
use crate::resilience::circuit_breaker::BreakerState;
use crate::store::CountingStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyStatus {
    Up,
    Down,
}

impl DependencyStatus {
    fn from_probe<E: std::fmt::Display>(name: &str, result: Result<(), E>) -> Self {
        match result {
            Ok(()) => DependencyStatus::Up,
            Err(e) => {
                tracing::warn!(dependency = name, error = %e, "Health probe failed");
                DependencyStatus::Down
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub store: DependencyStatus,
    pub database: DependencyStatus,
    pub breaker: BreakerState,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Ping both backing stores and combine with the breaker state.
pub async fn probe(store: &dyn CountingStore, source: &dyn IdentitySource, breaker: BreakerState) -> HealthReport {
    let (store_result, source_result) = tokio::join!(store.ping(), source.ping());

    let store = DependencyStatus::from_probe("store", store_result);
    let database = DependencyStatus::from_probe("database", source_result);

    let status = if store == DependencyStatus::Up && database == DependencyStatus::Up {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    HealthReport {
        status,
        store,
        database,
        breaker,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::source::StaticIdentitySource;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_all_up_is_healthy() {
        let store = MemoryStore::default();
        let source = StaticIdentitySource::new();
        let report = probe(&store, &source, BreakerState::Closed).await;
        assert!(report.is_healthy());
        assert_eq!(report.store, DependencyStatus::Up);
    }

    #[tokio::test]
    async fn test_any_down_is_degraded() {
        let store = MemoryStore::default();
        let source = StaticIdentitySource::new();
        source.set_available(false);

        let report = probe(&store, &source, BreakerState::Open).await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.store, DependencyStatus::Up);
        assert_eq!(report.database, DependencyStatus::Down);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "Degraded");
        assert_eq!(json["database"], "down");
        assert_eq!(json["breaker"], "open");
    }
}
