//! Diagnostic kinds and predefined pool diagnostics.

/// The severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Caller contract violated; the operation was refused.
    Error,
    /// Recoverable condition the caller is expected to handle.
    Warning,
}

impl DiagnosticKind {
    /// Get the display prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
        }
    }
}

/// A diagnostic message with code, message, and optional context.
///
/// Diagnostic codes follow the pattern:
/// - `BP0xx` - Region misuse
/// - `BP1xx` - Pool configuration
/// - `BP9xx` - Backend failures
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level.
    pub kind: DiagnosticKind,
    /// Diagnostic code (e.g., "BP001").
    pub code: &'static str,
    /// Primary message.
    pub message: &'static str,
    /// Optional additional context.
    pub note: Option<&'static str>,
    /// Optional fix suggestion.
    pub help: Option<&'static str>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub const fn error(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Error,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Create a new warning diagnostic.
    pub const fn warning(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Add a note to this diagnostic.
    pub const fn with_note(mut self, note: &'static str) -> Self {
        self.note = Some(note);
        self
    }

    /// Add a help message to this diagnostic.
    pub const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

// =============================================================================
// Predefined diagnostics (BP0xx - Region misuse)
// =============================================================================

/// BP001: Write through a region whose block has been reset since.
pub const BP001: Diagnostic = Diagnostic::error(
    "BP001",
    "write through a stale buffer region"
).with_note("the owning block was reset or dropped after this region was allocated")
 .with_help("allocate a fresh region after BufferPool::reset(); regions are valid for one frame");

/// BP002: Region update larger than the region.
pub const BP002: Diagnostic = Diagnostic::error(
    "BP002",
    "buffer region update exceeds region size"
).with_note("local_offset + data length must not exceed the allocated size")
 .with_help("allocate a region large enough for the data being written");

/// BP003: Write through the empty sentinel region.
pub const BP003: Diagnostic = Diagnostic::error(
    "BP003",
    "write through an empty buffer region"
).with_note("empty regions are returned by try_allocate() when the block is full")
 .with_help("check is_empty() and request a new block from the pool");

// =============================================================================
// Predefined diagnostics (BP1xx - Pool configuration)
// =============================================================================

/// BP101: No pool configured for a usage.
pub const BP101: Diagnostic = Diagnostic::error(
    "BP101",
    "no buffer pool for the requested usage"
).with_note("frame buffers only carry pools for the usages they were configured with")
 .with_help("add the usage to FrameBuffersConfig::usages");

// =============================================================================
// Predefined diagnostics (BP9xx - Backend)
// =============================================================================

/// BP901: Backing buffer creation failed.
pub const BP901: Diagnostic = Diagnostic::warning(
    "BP901",
    "backing buffer allocation failed"
).with_note("the backend could not create a new block")
 .with_help("lower the pool block size, or abort the frame and release memory elsewhere");
