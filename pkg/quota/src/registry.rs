use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use pkg_types::kind::GroupKind;

use crate::evaluator::Evaluator;

/// Maps a kind to its evaluator.
///
/// Populated at start-up and read-mostly afterwards. Lookups take a shared
/// lock and never wait on each other; registrations are serialized.
#[derive(Default)]
pub struct EvaluatorRegistry {
    evaluators: RwLock<HashMap<GroupKind, Arc<dyn Evaluator>>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `evaluator` under its own kind. Returns the evaluator it replaced.
    pub fn register(&self, evaluator: Arc<dyn Evaluator>) -> Option<Arc<dyn Evaluator>> {
        let kind = evaluator.group_kind().clone();
        let mut evaluators = self.evaluators.write().unwrap_or_else(|e| e.into_inner());
        let previous = evaluators.insert(kind.clone(), evaluator);
        if previous.is_some() {
            warn!("Replaced quota evaluator for {}", kind);
        } else {
            info!("Registered quota evaluator for {}", kind);
        }
        previous
    }

    pub fn lookup(&self, kind: &GroupKind) -> Option<Arc<dyn Evaluator>> {
        self.evaluators
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(kind)
            .cloned()
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<GroupKind> {
        let mut kinds: Vec<GroupKind> = self
            .evaluators
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.evaluators.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<Arc<dyn Evaluator>> for EvaluatorRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Evaluator>>>(iter: I) -> Self {
        let registry = Self::new();
        for evaluator in iter {
            registry.register(evaluator);
        }
        registry
    }
}
