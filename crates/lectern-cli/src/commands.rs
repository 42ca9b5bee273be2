//! CLI command implementations.

pub mod pending;
pub mod progress;
pub mod record;
pub mod sync;
