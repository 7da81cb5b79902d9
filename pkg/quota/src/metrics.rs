use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Quota admission and cache counters, rendered in Prometheus text
/// exposition format.
#[derive(Default)]
pub struct QuotaMetrics {
    admitted: AtomicU64,
    denied: AtomicU64,
    evaluation_failures: AtomicU64,
    usage_computations: AtomicU64,
    relists: AtomicU64,
}

impl QuotaMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_denied(&self) {
        self.denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evaluation_failure(&self) {
        self.evaluation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_usage_computation(&self) {
        self.usage_computations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_relist(&self) {
        self.relists.fetch_add(1, Ordering::Relaxed);
    }

    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    pub fn denied(&self) -> u64 {
        self.denied.load(Ordering::Relaxed)
    }

    pub fn evaluation_failures(&self) -> u64 {
        self.evaluation_failures.load(Ordering::Relaxed)
    }

    pub fn usage_computations(&self) -> u64 {
        self.usage_computations.load(Ordering::Relaxed)
    }

    pub fn relists(&self) -> u64 {
        self.relists.load(Ordering::Relaxed)
    }

    /// Render all counters in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let counters = [
            (
                "quota_admission_admitted_total",
                "Requests admitted by the quota check",
                self.admitted(),
            ),
            (
                "quota_admission_denied_total",
                "Requests denied by the quota check, including fail-closed denials",
                self.denied(),
            ),
            (
                "quota_evaluation_failures_total",
                "Usage computations that failed",
                self.evaluation_failures(),
            ),
            (
                "quota_usage_computations_total",
                "Usage computations started",
                self.usage_computations(),
            ),
            (
                "quota_informer_relists_total",
                "Informer relists after losing the change stream",
                self.relists(),
            ),
        ];
        let mut output = String::new();
        for (name, help, value) in counters {
            let _ = writeln!(output, "# HELP {} {}", name, help);
            let _ = writeln!(output, "# TYPE {} counter", name);
            let _ = writeln!(output, "{} {}", name, value);
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_exposes_every_counter() {
        let m = QuotaMetrics::new();
        m.record_admitted();
        m.record_admitted();
        m.record_denied();
        let text = m.render();
        assert!(text.contains("# TYPE quota_admission_admitted_total counter\nquota_admission_admitted_total 2\n"));
        assert!(text.contains("quota_admission_denied_total 1\n"));
        assert!(text.contains("quota_informer_relists_total 0\n"));
    }
}
