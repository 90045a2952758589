//! Observability: process-local counters and the sink abstraction engine
//! code records through.
//!
//! Recording an event never affects execution semantics.

pub mod metrics;
pub mod sink;

// re-exports
pub use metrics::{EventOps, EventState, report as metrics_report, reset as metrics_reset};
pub use sink::{MetricsEvent, MetricsSink, with_sink_override};
