//! Pinforge - media collection uploader for IPFS pinning services
//!
//! This library crate exposes the core functionality for integration testing.

pub mod assets;
pub mod backend;
pub mod config;
pub mod metadata;
pub mod pipeline;
pub mod progress;
