//! Diagnostic emission backend.
//!
//! Routes diagnostics to the `log` facade when the `log` feature is on,
//! otherwise to stderr in debug builds.

use std::sync::atomic::{AtomicBool, Ordering};

use super::kind::{Diagnostic, DiagnosticKind};
use super::strict::should_panic;

/// Global flag to suppress diagnostic output (for testing).
static DIAGNOSTICS_SUPPRESSED: AtomicBool = AtomicBool::new(false);

/// Suppress all diagnostic output.
pub fn suppress_diagnostics(suppress: bool) {
    DIAGNOSTICS_SUPPRESSED.store(suppress, Ordering::Relaxed);
}

/// Check if diagnostics are suppressed.
pub fn is_suppressed() -> bool {
    DIAGNOSTICS_SUPPRESSED.load(Ordering::Relaxed)
}

/// Emit a diagnostic.
pub fn emit(diag: &Diagnostic) {
    emit_with_context(diag, "");
}

/// Emit a diagnostic with additional runtime context.
///
/// In strict mode an error diagnostic panics after being emitted, which turns
/// caller contract violations into assertion failures.
pub fn emit_with_context(diag: &Diagnostic, context: &str) {
    if !is_suppressed() {
        #[cfg(feature = "log")]
        emit_to_log(diag, context);

        #[cfg(all(not(feature = "log"), any(debug_assertions, feature = "diagnostics")))]
        emit_to_stderr(diag, context);
    }

    if diag.kind == DiagnosticKind::Error && should_panic() {
        panic!(
            "[framepool][{}] {}\nContext: {}\nStrict mode enabled - errors are fatal.",
            diag.code, diag.message, context
        );
    }
}

#[cfg(feature = "log")]
fn emit_to_log(diag: &Diagnostic, context: &str) {
    let level = match diag.kind {
        DiagnosticKind::Error => log::Level::Error,
        DiagnosticKind::Warning => log::Level::Warn,
    };
    if context.is_empty() {
        log::log!(target: "framepool", level, "[{}] {}", diag.code, diag.message);
    } else {
        log::log!(target: "framepool", level, "[{}] {} ({})", diag.code, diag.message, context);
    }
    if let Some(note) = diag.note {
        log::debug!(target: "framepool", "  note: {}", note);
    }
    if let Some(help) = diag.help {
        log::debug!(target: "framepool", "  help: {}", help);
    }
}

#[cfg(all(not(feature = "log"), any(debug_assertions, feature = "diagnostics")))]
fn emit_to_stderr(diag: &Diagnostic, context: &str) {
    eprintln!("[framepool][{}] {}: {}", diag.code, diag.kind.prefix(), diag.message);
    if !context.is_empty() {
        eprintln!("  context: {}", context);
    }
    if let Some(note) = diag.note {
        eprintln!("  note: {}", note);
    }
    if let Some(help) = diag.help {
        eprintln!("  help: {}", help);
    }
}
