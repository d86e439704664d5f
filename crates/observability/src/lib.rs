//! Process-wide tracing setup shared by the binaries.

pub mod tracing;

pub use crate::tracing::{DEFAULT_DIRECTIVES, LogFormat};

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init(LogFormat::from_env());
}
