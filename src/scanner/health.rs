use std::sync::atomic::{AtomicUsize, Ordering};

use distance::sift3;

use crate::baseline::Baseline;

/// Tracks request and failure counters and decides when to fire a random
/// health probe. Counters start at 1 so a fresh scan reports request index
/// 1 for the first word, matching the breakpoint arithmetic used by
/// `--offset` resume.
///
/// Probe cadence uses explicit next-trigger thresholds: the first periodic
/// probe fires after `check_period` word results, then every `check_period`
/// after that; error-driven probes likewise on the failure counter.
pub struct HealthMonitor {
    req_count: AtomicUsize,
    failed_count: AtomicUsize,
    next_check_at: AtomicUsize,
    next_err_check_at: AtomicUsize,
    check_period: usize,
    err_period: usize,
    break_threshold: usize,
}

impl HealthMonitor {
    pub fn new(check_period: usize, err_period: usize, break_threshold: usize) -> Self {
        let check_period = check_period.max(1);
        let err_period = err_period.max(1);
        Self {
            req_count: AtomicUsize::new(1),
            failed_count: AtomicUsize::new(1),
            next_check_at: AtomicUsize::new(1 + check_period),
            next_err_check_at: AtomicUsize::new(1 + err_period),
            check_period,
            err_period,
            break_threshold,
        }
    }

    /// Called once per classified word result. Returns true when a health
    /// probe is due, either periodically or because failures accumulated.
    pub fn after_word(&self) -> bool {
        let req = self.req_count.fetch_add(1, Ordering::SeqCst) + 1;
        let check_due = self.next_check_at.load(Ordering::SeqCst);
        if req >= check_due
            && self
                .next_check_at
                .compare_exchange(
                    check_due,
                    check_due + self.check_period,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
        {
            return true;
        }

        let failed = self.failed_count.load(Ordering::SeqCst);
        let err_due = self.next_err_check_at.load(Ordering::SeqCst);
        failed >= err_due
            && self
                .next_err_check_at
                .compare_exchange(
                    err_due,
                    err_due + self.err_period,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
    }

    /// A request died at the transport layer.
    pub fn on_request_failed(&self) {
        self.failed_count.fetch_add(1, Ordering::SeqCst);
    }

    /// A probe came back but no longer matches the learned soft-404.
    pub fn on_probe_suspicious(&self) {
        self.failed_count.fetch_add(1, Ordering::SeqCst);
    }

    /// A probe matched the soft-404: the target still behaves normally.
    pub fn on_probe_passed(&self) {
        self.failed_count.store(1, Ordering::SeqCst);
        self.next_err_check_at
            .store(1 + self.err_period, Ordering::SeqCst);
    }

    pub fn should_break(&self) -> bool {
        self.failed_count.load(Ordering::SeqCst) > self.break_threshold
    }

    pub fn request_index(&self) -> usize {
        self.req_count.load(Ordering::SeqCst)
    }

    pub fn failure_count(&self) -> usize {
        self.failed_count.load(Ordering::SeqCst)
    }

    pub fn break_threshold(&self) -> usize {
        self.break_threshold
    }
}

/// Human summary of how a probe drifted from the learned baseline, for the
/// suspicious-probe warnings and the recovery report.
pub fn drift_summary(base: &Baseline, probe: &Baseline) -> String {
    let mut diffs: Vec<String> = Vec::new();
    if base.status != probe.status {
        diffs.push(format!("status {}->{}", base.status, probe.status));
    }
    if base.body_len != probe.body_len {
        diffs.push(format!("len {}->{}", base.body_len, probe.body_len));
    }
    if base.redirect_target != probe.redirect_target {
        diffs.push(format!(
            "location {}->{}",
            base.redirect_target, probe.redirect_target
        ));
    }
    let body_distance = sift3(base.body_sample(), probe.body_sample());
    if body_distance > 0.0 {
        diffs.push(format!("sift3 {body_distance}"));
    }
    if diffs.is_empty() {
        "no observable drift".to_string()
    } else {
        diffs.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periodic_probe_fires_every_period() {
        let health = HealthMonitor::new(5, 100, 3);
        let mut due_at: Vec<usize> = Vec::new();
        for i in 1..=20 {
            if health.after_word() {
                due_at.push(i);
            }
        }
        assert_eq!(due_at, vec![5, 10, 15, 20]);
    }

    #[test]
    fn error_probe_fires_after_accumulated_failures() {
        let health = HealthMonitor::new(1000, 3, 3);
        assert!(!health.after_word());
        health.on_request_failed();
        health.on_request_failed();
        health.on_request_failed();
        // failed_count reached 4 >= 1 + err_period
        assert!(health.after_word());
        assert!(!health.after_word());
    }

    #[test]
    fn pass_resets_failure_counter_to_one() {
        let health = HealthMonitor::new(10, 10, 3);
        health.on_probe_suspicious();
        health.on_probe_suspicious();
        assert_eq!(health.failure_count(), 3);
        health.on_probe_passed();
        assert_eq!(health.failure_count(), 1);
    }

    #[test]
    fn break_trips_above_threshold() {
        let health = HealthMonitor::new(10, 10, 3);
        health.on_probe_suspicious();
        health.on_probe_suspicious();
        assert!(!health.should_break());
        health.on_probe_suspicious();
        // counter started at 1; three suspicious probes push it past 3
        assert!(health.should_break());
    }
}
