//! Observability
//!
//! - Structured logging through `tracing`, one typed [`Event`] per
//!   lifecycle point
//! - Atomic counters in [`MetricsRegistry`]
//!
//! Observability is read-only: nothing here influences execution.
//!
//! # Usage
//!
//! ```ignore
//! use opguard::observability::{init_logging, Event, LogFormat};
//!
//! init_logging(LogFormat::Json);
//! tracing::info!(event = %Event::WriteCommitted, collection = "vendors", "write committed");
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{init_logging, LogFormat};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
