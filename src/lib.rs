//! Clipstash - clipboard history manager
//!
//! Captures clipboard changes into a deduplicated, size-bounded history
//! that survives restarts, and puts past clips back on the clipboard.
//! This library exports the core modules for the binary and for tests.

pub mod clipboard;
pub mod history;
pub mod imaging;
pub mod logging;
pub mod models;
pub mod storage;

pub use history::{Degraded, HistoryEngine, Outcome};
