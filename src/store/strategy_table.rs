//! Thread-safe table of loaded strategies using DashMap.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::{self, StrategyConfig};
use crate::error::{Error, Result};
use crate::health::HealthView;
use crate::strategy::{NextHopStrategy, SelfDetect};

/// Thread-safe storage for named selection strategies.
///
/// Strategies are immutable once built, so readers hold an `Arc` and
/// keep using their generation even while a reload replaces the table
/// underneath them. Uses `DashMap` for lock-free concurrent access and
/// an `AtomicU64` generation counter.
pub struct StrategyTable {
    strategies: DashMap<String, Arc<NextHopStrategy>>,
    generation: AtomicU64,
}

impl StrategyTable {
    /// Creates a new empty table.
    pub fn new() -> Self {
        Self {
            strategies: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// The strategy with the given name, if loaded.
    pub fn get(&self, name: &str) -> Option<Arc<NextHopStrategy>> {
        self.strategies.get(name).map(|s| Arc::clone(s.value()))
    }

    /// Number of loaded strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// The current configuration generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Replaces all strategies with a full sync.
    ///
    /// Each configuration is built independently; rejected strategies
    /// are logged and returned while the rest of the reload proceeds.
    /// Returns the applied generation and the rejections.
    pub fn reload(
        &self,
        configs: Vec<StrategyConfig>,
        health: &Arc<dyn HealthView>,
        detector: &dyn SelfDetect,
    ) -> (u64, Vec<Error>) {
        let mut rejected = Vec::new();
        let mut fresh = Vec::new();
        for cfg in configs {
            let name = cfg.name.clone();
            match NextHopStrategy::from_config(cfg, Arc::clone(health), detector) {
                Ok(strategy) => fresh.push((name, Arc::new(strategy))),
                Err(e) => {
                    tracing::error!(strategy = %name, error = %e, "strategy rejected");
                    rejected.push(e);
                }
            }
        }

        self.strategies.clear();
        for (name, strategy) in fresh {
            self.strategies.insert(name, strategy);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            generation,
            loaded = self.strategies.len(),
            rejected = rejected.len(),
            "strategy table reloaded"
        );
        (generation, rejected)
    }

    /// Parses a YAML strategy document and reloads the table from it.
    ///
    /// Strategies that fail to decode or build are collected alongside
    /// the build rejections; the good ones still load.
    ///
    /// # Errors
    ///
    /// Returns an error only when the document itself is unreadable; the
    /// table is left untouched in that case.
    pub fn load_document(
        &self,
        yaml: &str,
        health: &Arc<dyn HealthView>,
        detector: &dyn SelfDetect,
    ) -> Result<(u64, Vec<Error>)> {
        let parsed = config::parse_document(yaml)?;
        let mut errors = parsed.rejected;
        let (generation, mut rejected) = self.reload(parsed.strategies, health, detector);
        errors.append(&mut rejected);
        Ok((generation, errors))
    }
}

impl Default for StrategyTable {
    fn default() -> Self {
        Self::new()
    }
}
