//! Utility functions.

pub(crate) mod layout;
pub mod size;
