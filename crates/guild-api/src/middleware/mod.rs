//! # Middleware Stack
//!
//! - [`metrics`]: Prometheus request metrics.

pub mod metrics;
