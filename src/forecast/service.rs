//! Hot-swappable holder for the active [`ForecastEngine`].

use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::info;

use super::{ArtifactStore, EngineMode, ForecastEngine};

/// Shares one engine across request handlers.
///
/// Readers take an `Arc` snapshot and keep it for the whole request, so a
/// concurrent [`replace`](Self::replace) never tears an in-flight forecast.
pub struct ForecastService {
    active: ArcSwap<ForecastEngine>,
}

impl ForecastService {
    pub fn new(engine: ForecastEngine) -> Self {
        Self {
            active: ArcSwap::from_pointee(engine),
        }
    }

    /// Snapshot of the engine currently serving requests.
    pub fn current(&self) -> Arc<ForecastEngine> {
        self.active.load_full()
    }

    /// Install `engine`, returning the one it replaced.
    pub fn replace(&self, engine: ForecastEngine) -> Arc<ForecastEngine> {
        let mode = engine.mode();
        let previous = self.active.swap(Arc::new(engine));
        info!(from = %previous.mode(), to = %mode, "Forecast engine swapped");
        previous
    }

    /// Re-read artifacts from `store` and swap in the resulting engine.
    pub fn reload(&self, store: &dyn ArtifactStore, time_step: usize) -> EngineMode {
        let engine = ForecastEngine::load(store, time_step);
        let mode = engine.mode();
        self.replace(engine);
        mode
    }
}

impl std::fmt::Debug for ForecastService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastService")
            .field("mode", &self.current().mode())
            .finish()
    }
}
