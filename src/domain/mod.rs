//! Domain layer - Pure business logic.

// Frame analysis algorithms
pub mod av;

pub mod error;

// Job state machine (always available)
pub mod jobs;

pub mod report;
