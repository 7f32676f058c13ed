//! Metric names and labels emitted by replication and aggregation.

/// Label for the sink name in metrics.
pub const SINK_LABEL: &str = "sink";

/// Label for error kind in metrics.
pub const ERROR_KIND_LABEL: &str = "error_kind";

/// Label for the outcome of a unit of work (`complete` or `failed`).
pub const OUTCOME_LABEL: &str = "outcome";

// Replication metrics

/// Counter for batches applied to a sink.
pub const FANOUT_BATCHES_APPLIED_TOTAL: &str = "fanout_batches_applied_total";

/// Counter for records applied to a sink.
pub const FANOUT_RECORDS_APPLIED_TOTAL: &str = "fanout_records_applied_total";

/// Counter for sink replication loops that ended in an error.
pub const FANOUT_SINK_FAILURES_TOTAL: &str = "fanout_sink_failures_total";

/// Histogram for the duration of one sink apply call, in seconds.
pub const FANOUT_APPLY_BATCH_DURATION_SECONDS: &str = "fanout_apply_batch_duration_seconds";

// Aggregation metrics

/// Counter for job batches processed, labelled by outcome.
pub const FANOUT_JOB_BATCHES_TOTAL: &str = "fanout_job_batches_total";

/// Gauge for the number of rows in the live aggregate table after the last promotion.
pub const FANOUT_PROMOTED_ROWS: &str = "fanout_promoted_rows";

/// Histogram for the duration of a full aggregation run, in seconds.
pub const FANOUT_AGGREGATION_RUN_DURATION_SECONDS: &str = "fanout_aggregation_run_duration_seconds";

// Audit metrics

/// Gauge for the number of mismatches found by the last audit.
pub const FANOUT_AUDIT_MISMATCHES: &str = "fanout_audit_mismatches";

/// Label for the kind of audit (`records` or `aggregates`).
pub const AUDIT_LABEL: &str = "audit";
