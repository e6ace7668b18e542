//! HTTP request handlers for Bearer Gate.

pub mod health;
pub mod metrics;
pub mod protected;
pub mod public;

pub use health::health_check;
pub use metrics::metrics_handler;
pub use protected::protected;
pub use public::public_root;
