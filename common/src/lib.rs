pub mod config;
pub mod plot;
pub mod stats;

/// Divisor applied to raw nanosecond latencies by the JSON run formats.
pub const LATENCY_DIVISOR: f64 = 10e3;
