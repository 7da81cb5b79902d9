use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pkg_types::kind::GroupKind;
use pkg_types::meta::DynamicObject;
use pkg_types::quota::{ResourceList, ResourceName};

use crate::error::QuotaError;
use crate::evaluator::{Evaluator, Operation};
use crate::metrics::QuotaMetrics;
use crate::registry::EvaluatorRegistry;

/// An incoming create/update/delete to be checked against quota.
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    pub kind: GroupKind,
    pub operation: Operation,
    pub object: DynamicObject,
}

impl AdmissionRequest {
    pub fn new(kind: GroupKind, operation: Operation, object: DynamicObject) -> Self {
        Self {
            kind,
            operation,
            object,
        }
    }

    pub fn namespace(&self) -> &str {
        self.object.namespace()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    Admitted,
    Denied { reason: String },
}

impl AdmissionDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionDecision::Admitted)
    }
}

/// Quota check run for every admission request.
///
/// Usage is read and compared without any lock held across requests, so two
/// concurrent creates can both observe `limit - 1` and both be admitted.
pub struct QuotaAdmission {
    registry: Arc<EvaluatorRegistry>,
    metrics: Arc<QuotaMetrics>,
}

impl QuotaAdmission {
    pub fn new(registry: Arc<EvaluatorRegistry>, metrics: Arc<QuotaMetrics>) -> Self {
        Self { registry, metrics }
    }

    pub fn registry(&self) -> &Arc<EvaluatorRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<QuotaMetrics> {
        &self.metrics
    }

    /// Current usage for `kind` in `namespace`, or `None` when the evaluator
    /// is not consulted for `operation` (or no evaluator covers `kind`).
    pub async fn evaluate(
        &self,
        kind: &GroupKind,
        namespace: &str,
        operation: Operation,
        cancel: &CancellationToken,
    ) -> Result<Option<ResourceList>, QuotaError> {
        let Some(evaluator) = self.registry.lookup(kind) else {
            return Ok(None);
        };
        if !evaluator.handles(operation) {
            return Ok(None);
        }
        self.usage(evaluator.as_ref(), namespace, cancel).await.map(Some)
    }

    async fn usage(
        &self,
        evaluator: &dyn Evaluator,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> Result<ResourceList, QuotaError> {
        self.metrics.record_usage_computation();
        evaluator.usage(namespace, cancel).await.inspect_err(|_| {
            self.metrics.record_evaluation_failure();
        })
    }

    /// Check `request` against the externally supplied `hard` limits.
    ///
    /// Any failure to compute usage denies the request.
    pub async fn admit(
        &self,
        request: &AdmissionRequest,
        hard: &ResourceList,
        cancel: &CancellationToken,
    ) -> AdmissionDecision {
        let decision = self.decide(request, hard, cancel).await;
        match &decision {
            AdmissionDecision::Admitted => self.metrics.record_admitted(),
            AdmissionDecision::Denied { reason } => {
                self.metrics.record_denied();
                info!(
                    "Denied {} of {} {}/{}: {}",
                    request.operation,
                    request.kind,
                    request.namespace(),
                    request.object.name(),
                    reason
                );
            }
        }
        decision
    }

    async fn decide(
        &self,
        request: &AdmissionRequest,
        hard: &ResourceList,
        cancel: &CancellationToken,
    ) -> AdmissionDecision {
        let Some(evaluator) = self.registry.lookup(&request.kind) else {
            return AdmissionDecision::Admitted;
        };
        if !evaluator.handles(request.operation) {
            return AdmissionDecision::Admitted;
        }
        let constrained: Vec<&ResourceName> = evaluator
            .matching_resources()
            .iter()
            .filter(|name| hard.get(name).is_some())
            .collect();
        if constrained.is_empty() {
            debug!("No quota constrains {} in {}", request.kind, request.namespace());
            return AdmissionDecision::Admitted;
        }

        let used = match self.usage(evaluator.as_ref(), request.namespace(), cancel).await {
            Ok(used) => used,
            Err(e) => {
                warn!(
                    "Quota evaluation for {} in {} failed, denying: {}",
                    request.kind,
                    request.namespace(),
                    e
                );
                return AdmissionDecision::Denied {
                    reason: format!("unable to evaluate quota: {}", e),
                };
            }
        };
        let requested = evaluator.object_usage(&request.object);
        let projected = used.add(&requested);

        let exceeded: Vec<String> = constrained
            .into_iter()
            .filter(|name| {
                let total = projected.get(name).unwrap_or(0);
                hard.get(name).is_some_and(|limit| total > limit)
            })
            .map(|name| {
                format!(
                    "{} (requested {}, used {}, limited {})",
                    name,
                    requested.get(name).unwrap_or(0),
                    used.get(name).unwrap_or(0),
                    hard.get(name).unwrap_or(0)
                )
            })
            .collect();
        if exceeded.is_empty() {
            AdmissionDecision::Admitted
        } else {
            AdmissionDecision::Denied {
                reason: format!("exceeded quota: {}", exceeded.join(", ")),
            }
        }
    }
}
