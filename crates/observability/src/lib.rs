//! Process-wide logging setup.

pub mod tracing;

pub use crate::tracing::{init, init_with, LogFormat};
