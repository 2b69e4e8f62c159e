//! Ports - Trait definitions for the decoder and storage collaborators.

pub mod decoder;
pub mod storage;
