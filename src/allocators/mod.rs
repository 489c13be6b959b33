//! Allocator implementations.

pub(crate) mod block;
pub(crate) mod pool;
pub(crate) mod region;
