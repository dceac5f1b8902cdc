#![deny(warnings, rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_lossless,            // Infallible casts are clear enough with `as`
    clippy::cast_possible_truncation, // Safe within realistic value bounds (durations, sizes)
    clippy::cast_precision_loss,      // Acceptable for averages/display
    clippy::missing_errors_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. SinkError in sender module
    clippy::must_use_candidate        // Annotated selectively on critical APIs
)]

pub mod app;
pub mod buffer;
pub mod diagnostics;
pub mod domain;
pub mod encoder;
pub mod engine;
pub mod sender;

// Re-export main types for easy access
pub use app::{Config, PublisherService};
pub use buffer::{BatchFrame, IntakeQueue};
pub use diagnostics::{Diagnostics, DiagnosticsSnapshot};
pub use domain::NotificationRecord;
pub use engine::{BatchEngine, EngineConfig, FlushScheduler};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
