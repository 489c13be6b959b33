//! Internal logging and diagnostic macros.

/// Log through the `log` facade under the `framepool` target.
///
/// Compiles to nothing but argument type-checking without the `log` feature.
macro_rules! bp_log {
    ($level:ident, $($arg:tt)+) => {{
        #[cfg(feature = "log")]
        {
            log::$level!(target: "framepool", $($arg)+);
        }
        #[cfg(not(feature = "log"))]
        {
            let _ = format_args!($($arg)+);
        }
    }};
}

/// Emit a predefined diagnostic, optionally with formatted context.
///
/// ```rust,ignore
/// bp_emit!(BP101, "requested {} bytes, {} remaining", size, remaining);
/// ```
macro_rules! bp_emit {
    ($code:ident) => {{
        $crate::diagnostics::emit::emit(&$crate::diagnostics::$code);
    }};
    ($code:ident, $($arg:tt)+) => {{
        $crate::diagnostics::emit::emit_with_context(
            &$crate::diagnostics::$code,
            &format!($($arg)+),
        );
    }};
}

pub(crate) use {bp_emit, bp_log};
