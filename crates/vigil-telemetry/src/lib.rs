//! Vigil Telemetry - logging setup for the Vigil binaries.
//!
//! Library crates only emit `tracing` events. A binary calls
//! [`setup_logging`] once at startup to decide where those events go and
//! what they look like.
//!
//! # Example
//!
//! ```rust,no_run
//! use vigil_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), vigil_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Json)
//!     .with_directive("vigil_audit=debug");
//! setup_logging(&config)?;
//!
//! tracing::info!("audit service started");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileRotation, LogConfig, LogFormat, LogTarget, build_subscriber, setup_default_logging,
    setup_logging,
};
