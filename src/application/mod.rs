//! Application layer - job registry, pipeline orchestration and the service
//! API used by inbound adapters.

pub mod pipeline;
pub mod registry;
pub mod service;
