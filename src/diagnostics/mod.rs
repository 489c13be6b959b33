//! Diagnostics for pool misuse and capacity events.
//!
//! ## Diagnostic Codes
//!
//! | Code  | Meaning                      |
//! |-------|------------------------------|
//! | BP0xx | Region misuse                |
//! | BP1xx | Pool configuration           |
//! | BP9xx | Backend failures             |
//!
//! Misuse is always reported as an error value. Enable [`StrictMode`] (or set
//! `FRAMEPOOL_STRICT=1`) to make misuse panic instead, the equivalent of a
//! debug assertion.

pub mod emit;
pub mod kind;
pub mod strict;

pub(crate) mod macros;

pub use emit::{emit, emit_with_context, suppress_diagnostics};
pub use kind::{Diagnostic, DiagnosticKind};
pub use kind::{BP001, BP002, BP003, BP101, BP901};
pub use strict::{init_from_env, set_strict_mode, strict_mode, StrictMode, StrictModeGuard};
