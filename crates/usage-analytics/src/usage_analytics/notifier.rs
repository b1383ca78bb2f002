//! Anomaly observer registry and dispatch
//!
//! Observers are invoked in registration order. A failing observer, whether it returns an
//! error or panics, is logged and counted; delivery continues with the next observer and
//! nothing is propagated to the caller.

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::usage_analytics::types::ConsumptionAnomaly;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Receives detected anomalies
pub trait AnomalyObserver: Send + Sync {
    /// Handle one anomaly
    fn on_anomaly(&self, anomaly: &ConsumptionAnomaly) -> AnalyticsResult<()>;
}

/// Adapts a closure into an observer
pub struct CallbackObserver<F> {
    callback: F,
}

impl<F> CallbackObserver<F>
where
    F: Fn(&ConsumptionAnomaly) + Send + Sync,
{
    /// Wrap `callback`
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> AnomalyObserver for CallbackObserver<F>
where
    F: Fn(&ConsumptionAnomaly) + Send + Sync,
{
    fn on_anomaly(&self, anomaly: &ConsumptionAnomaly) -> AnalyticsResult<()> {
        (self.callback)(anomaly);
        Ok(())
    }
}

/// Registration handle, ordered by registration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// Result of delivering one anomaly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Observers that handled the anomaly
    pub delivered: usize,
    /// Observers that failed
    pub failed: usize,
}

/// Registry of anomaly observers
pub struct AnomalyNotifier {
    observers: RwLock<BTreeMap<ObserverId, Arc<dyn AnomalyObserver>>>,
    next_id: AtomicU64,
}

impl AnomalyNotifier {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register an observer
    pub fn register(&self, observer: Arc<dyn AnomalyObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().insert(id, observer);
        debug!("Registered anomaly observer {}", id);
        id
    }

    /// Remove an observer, returning whether it was registered
    pub fn unregister(&self, id: ObserverId) -> bool {
        let removed = self.observers.write().remove(&id).is_some();
        if removed {
            debug!("Unregistered anomaly observer {}", id);
        }
        removed
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Deliver `anomaly` to every observer
    pub fn dispatch(&self, anomaly: &ConsumptionAnomaly) -> DispatchOutcome {
        // Snapshot so observers may (un)register without deadlocking.
        let observers: Vec<(ObserverId, Arc<dyn AnomalyObserver>)> = self
            .observers
            .read()
            .iter()
            .map(|(id, observer)| (*id, Arc::clone(observer)))
            .collect();

        let mut outcome = DispatchOutcome::default();

        for (id, observer) in observers {
            match invoke(id, observer.as_ref(), anomaly) {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    outcome.failed += 1;
                    error!("Anomaly {} not delivered: {}", anomaly.id, e);
                }
            }
        }

        outcome
    }
}

impl Default for AnomalyNotifier {
    fn default() -> Self {
        Self::new()
    }
}

fn invoke(
    id: ObserverId,
    observer: &dyn AnomalyObserver,
    anomaly: &ConsumptionAnomaly,
) -> AnalyticsResult<()> {
    match panic::catch_unwind(AssertUnwindSafe(|| observer.on_anomaly(anomaly))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(AnalyticsError::ObserverFailed {
            observer: id.to_string(),
            reason: e.to_string(),
        }),
        Err(payload) => {
            let reason = if let Some(s) = payload.downcast_ref::<&str>() {
                format!("panicked: {s}")
            } else if let Some(s) = payload.downcast_ref::<String>() {
                format!("panicked: {s}")
            } else {
                "panicked".to_string()
            };
            Err(AnalyticsError::ObserverFailed {
                observer: id.to_string(),
                reason,
            })
        }
    }
}
