// crates/jobs/src/metrics.rs
//! Job metrics, recorded through the `metrics` facade.
//!
//! The library never installs a recorder. A host that wants to export these
//! installs one (e.g. a Prometheus exporter) and calls [`describe_metrics`];
//! without a recorder every call here is a no-op.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use repo_jobs_types::JobStatus;

pub fn describe_metrics() {
    describe_counter!("jobs_submitted_total", "Jobs accepted by submit, by kind");
    describe_counter!(
        "jobs_finished_total",
        "Jobs that reached a terminal state, by status"
    );
    describe_histogram!(
        "job_duration_seconds",
        "Task execution time from RUNNING to a terminal state"
    );
    describe_histogram!(
        "job_queue_wait_seconds",
        "Time from submit until the job acquired its resource lock"
    );
    describe_gauge!("job_queue_depth", "Jobs waiting for a worker");
    describe_counter!(
        "job_store_save_failures_total",
        "Failed attempts to persist the job table, by backend"
    );
}

pub fn record_submitted(kind: &str) {
    counter!("jobs_submitted_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_started(waited: Duration) {
    histogram!("job_queue_wait_seconds").record(waited.as_secs_f64());
}

pub fn record_finished(status: JobStatus, duration: Duration) {
    counter!("jobs_finished_total", "status" => status.as_str()).increment(1);
    histogram!("job_duration_seconds", "status" => status.as_str()).record(duration.as_secs_f64());
}

pub fn set_queue_depth(depth: usize) {
    gauge!("job_queue_depth").set(depth as f64);
}

pub fn record_save_failure(backend: &'static str) {
    counter!("job_store_save_failures_total", "backend" => backend).increment(1);
}
