//! Observability for Bearer Gate.
//!
//! Provides metrics definitions and the Prometheus recorder setup.

pub mod metrics;
