//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Token, session and retry code produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Every token request carries its correlation id as a log field
//! - Metrics are cheap no-ops until the exporter is installed

pub mod logging;
pub mod metrics;
