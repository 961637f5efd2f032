use std::sync::Once;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use rememberme_types::ValidationOutcome;

static METRICS_INIT: Once = Once::new();

/// Initialize metric descriptions
///
/// This should be called once during application startup, after the host
/// has installed its recorder. Repeated calls are no-ops.
pub fn init() {
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "rememberme_validations_total",
            "Total number of remember-me credential validations by outcome"
        );
        describe_counter!(
            "rememberme_breaches_total",
            "Total number of replayed credentials detected"
        );
        describe_counter!("rememberme_pairs_created_total", "Total number of token pairs issued");
        describe_counter!(
            "rememberme_users_invalidated_total",
            "Total number of users whose token chains were all revoked"
        );
        describe_counter!("rememberme_sweeps_total", "Total number of sweep cycles by result");
        describe_counter!(
            "rememberme_swept_entries_total",
            "Total number of expired index entries removed by the sweeper"
        );
        describe_counter!(
            "rememberme_swept_keys_deleted_total",
            "Total number of emptied set keys deleted by the sweeper"
        );

        describe_histogram!("rememberme_sweep_duration_seconds", "Sweep cycle duration in seconds");
    });
}

/// Record the outcome of one validation
pub fn record_validation(outcome: ValidationOutcome) {
    counter!("rememberme_validations_total", "outcome" => outcome.as_ref().to_string())
        .increment(1);
    if outcome.is_breach() {
        counter!("rememberme_breaches_total").increment(1);
    }
}

/// Record a newly issued pair
///
/// # Arguments
///
/// * `rotated` - Whether the pair continues an existing series
pub fn record_pair_created(rotated: bool) {
    counter!("rememberme_pairs_created_total", "rotated" => rotated.to_string()).increment(1);
}

/// Record that every chain of one user was revoked
pub fn record_user_invalidated() {
    counter!("rememberme_users_invalidated_total").increment(1);
}

/// Record a completed sweep cycle
///
/// # Arguments
///
/// * `expired` - Expired index entries taken by the cycle
/// * `keys_deleted` - Emptied set keys deleted by the cycle
/// * `duration_secs` - Cycle duration in seconds
pub fn record_sweep_success(expired: usize, keys_deleted: usize, duration_secs: f64) {
    counter!("rememberme_sweeps_total", "result" => "success").increment(1);
    counter!("rememberme_swept_entries_total").increment(expired as u64);
    counter!("rememberme_swept_keys_deleted_total").increment(keys_deleted as u64);
    histogram!("rememberme_sweep_duration_seconds", "result" => "success").record(duration_secs);
}

/// Record a failed sweep cycle
pub fn record_sweep_failure(duration_secs: f64) {
    counter!("rememberme_sweeps_total", "result" => "failure").increment(1);
    histogram!("rememberme_sweep_duration_seconds", "result" => "failure").record(duration_secs);
}
