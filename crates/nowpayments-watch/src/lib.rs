/*
[INPUT]:  Public API exports for nowpayments-watch crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod watcher;

// Re-export main types for convenience
pub use config::WatchConfig;
pub use watcher::{PaymentWatcher, WatchOutcome};
