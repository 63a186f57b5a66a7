//! Prometheus metrics collection for modguard.
//!
//! Tracks the lifecycle of deferred removals, policy decisions and the
//! failures the engine deliberately swallows (oracle lookups, removals), so
//! that fail-open behaviour stays visible to operators.
//!
//! - `modguard_actions_scheduled_total` - Deferred removals created
//! - `modguard_actions_fired_total` - Deferred removals executed
//! - `modguard_actions_cancelled_total{reason}` - Superseded, revoked, amnesty, ...
//! - `modguard_actions_pending` - Current size of the action index
//! - `modguard_policy_lookup_failures_total{source}` - Fail-open decisions

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters
// ========================================================================

/// Deferred removals created.
pub static ACTIONS_SCHEDULED: OnceLock<IntCounter> = OnceLock::new();

/// Deferred removals that reached `Fired`.
pub static ACTIONS_FIRED: OnceLock<IntCounter> = OnceLock::new();

/// Deferred removals that reached `Cancelled`, by reason.
pub static ACTIONS_CANCELLED: OnceLock<IntCounterVec> = OnceLock::new();

/// Removal calls the platform rejected or never answered.
pub static REMOVAL_FAILURES: OnceLock<IntCounter> = OnceLock::new();

/// Edited messages removed without a grace window.
pub static EDITS_REMOVED: OnceLock<IntCounter> = OnceLock::new();

/// Policy decisions by outcome (exempt reason or `not_exempt`).
pub static DECISIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Lookups that failed and defaulted to exempt.
pub static POLICY_LOOKUP_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

/// Administrative command failures by command and error code.
pub static COMMAND_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges
// ========================================================================

/// Actions currently held in the scheduler index.
pub static ACTIONS_PENDING: OnceLock<IntGauge> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded.
/// Until then every `record_*` helper is a no-op, which is what tests rely on.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(ACTIONS_SCHEDULED, IntCounter::new("modguard_actions_scheduled_total", "Deferred removals scheduled"));
    register!(ACTIONS_FIRED, IntCounter::new("modguard_actions_fired_total", "Deferred removals executed"));
    register!(ACTIONS_CANCELLED, IntCounterVec::new(Opts::new("modguard_actions_cancelled_total", "Deferred removals cancelled by reason"), &["reason"]));
    register!(REMOVAL_FAILURES, IntCounter::new("modguard_removal_failures_total", "Removal calls that failed"));
    register!(EDITS_REMOVED, IntCounter::new("modguard_edits_removed_total", "Edited messages removed immediately"));
    register!(DECISIONS, IntCounterVec::new(Opts::new("modguard_decisions_total", "Policy decisions by outcome"), &["outcome"]));
    register!(POLICY_LOOKUP_FAILURES, IntCounterVec::new(Opts::new("modguard_policy_lookup_failures_total", "Policy lookups that failed open"), &["source"]));
    register!(COMMAND_ERRORS, IntCounterVec::new(Opts::new("modguard_command_errors_total", "Administrative command errors"), &["command", "error"]));
    register!(ACTIONS_PENDING, IntGauge::new("modguard_actions_pending", "Actions held in the scheduler index"));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn record_scheduled() {
    if let Some(m) = ACTIONS_SCHEDULED.get() {
        m.inc();
    }
}

pub fn record_fired() {
    if let Some(m) = ACTIONS_FIRED.get() {
        m.inc();
    }
}

pub fn record_cancelled(reason: &str) {
    if let Some(m) = ACTIONS_CANCELLED.get() {
        m.with_label_values(&[reason]).inc();
    }
}

pub fn record_removal_failure() {
    if let Some(m) = REMOVAL_FAILURES.get() {
        m.inc();
    }
}

pub fn record_edit_removed() {
    if let Some(m) = EDITS_REMOVED.get() {
        m.inc();
    }
}

pub fn record_decision(outcome: &str) {
    if let Some(m) = DECISIONS.get() {
        m.with_label_values(&[outcome]).inc();
    }
}

pub fn record_lookup_failure(source: &str) {
    if let Some(m) = POLICY_LOOKUP_FAILURES.get() {
        m.with_label_values(&[source]).inc();
    }
}

pub fn record_command_error(command: &str, error: &str) {
    if let Some(m) = COMMAND_ERRORS.get() {
        m.with_label_values(&[command, error]).inc();
    }
}

pub fn set_pending(count: usize) {
    if let Some(m) = ACTIONS_PENDING.get() {
        m.set(i64::try_from(count).unwrap_or(i64::MAX));
    }
}
