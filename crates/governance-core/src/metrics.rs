//! Global atomic counters for governance events.
//!
//! Incremented at the call site; [`Metrics::flush`] emits the current
//! values as one `info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    decisions_validated: AtomicU64,
    decisions_rejected: AtomicU64,
    evidence_missing: AtomicU64,
    audit_appends: AtomicU64,
    audit_fallbacks: AtomicU64,
    integrity_violations: AtomicU64,
    permission_checks: AtomicU64,
    permission_cache_hits: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! counter {
    ($inc:ident, $get:ident, $field:ident) => {
        pub fn $inc(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(metric = stringify!($field), "counter incremented");
        }

        pub fn $get(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }
    };
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            decisions_validated: AtomicU64::new(0),
            decisions_rejected: AtomicU64::new(0),
            evidence_missing: AtomicU64::new(0),
            audit_appends: AtomicU64::new(0),
            audit_fallbacks: AtomicU64::new(0),
            integrity_violations: AtomicU64::new(0),
            permission_checks: AtomicU64::new(0),
            permission_cache_hits: AtomicU64::new(0),
        }
    }

    counter!(inc_decisions_validated, decisions_validated, decisions_validated);
    counter!(inc_decisions_rejected, decisions_rejected, decisions_rejected);
    counter!(inc_evidence_missing, evidence_missing, evidence_missing);
    counter!(inc_audit_appends, audit_appends, audit_appends);
    counter!(inc_audit_fallbacks, audit_fallbacks, audit_fallbacks);
    counter!(inc_permission_checks, permission_checks, permission_checks);
    counter!(inc_permission_cache_hits, permission_cache_hits, permission_cache_hits);

    pub fn add_integrity_violations(&self, n: u64) {
        if n > 0 {
            self.integrity_violations.fetch_add(n, Ordering::Relaxed);
            tracing::trace!(metric = "integrity_violations", n, "counter incremented");
        }
    }

    pub fn integrity_violations(&self) -> u64 {
        self.integrity_violations.load(Ordering::Relaxed)
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            decisions_validated = self.decisions_validated(),
            decisions_rejected = self.decisions_rejected(),
            evidence_missing = self.evidence_missing(),
            audit_appends = self.audit_appends(),
            audit_fallbacks = self.audit_fallbacks(),
            integrity_violations = self.integrity_violations(),
            permission_checks = self.permission_checks(),
            permission_cache_hits = self.permission_cache_hits(),
        );
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        for c in [
            &self.decisions_validated,
            &self.decisions_rejected,
            &self.evidence_missing,
            &self.audit_appends,
            &self.audit_fallbacks,
            &self.integrity_violations,
            &self.permission_checks,
            &self.permission_cache_hits,
        ] {
            c.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_audit_appends();
        m.inc_audit_appends();
        assert_eq!(m.audit_appends(), 2);

        m.inc_permission_cache_hits();
        assert_eq!(m.permission_cache_hits(), 1);

        m.add_integrity_violations(3);
        m.add_integrity_violations(0);
        assert_eq!(m.integrity_violations(), 3);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_decisions_validated();
        m.inc_evidence_missing();
        m.inc_audit_fallbacks();
        m.reset();
        assert_eq!(m.decisions_validated(), 0);
        assert_eq!(m.evidence_missing(), 0);
        assert_eq!(m.audit_fallbacks(), 0);
    }
}
