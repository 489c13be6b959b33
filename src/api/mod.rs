//! Public API for framepool.
//!
//! Configuration, errors, statistics, and the frame-level orchestration that
//! ties pools together.

pub mod config;
pub mod error;
pub mod frame;
pub mod stats;
