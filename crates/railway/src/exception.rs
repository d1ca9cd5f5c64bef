//! Runtime error taxonomy and call-stack capture.
//!
//! Every runtime failure is fatal to the program being interpreted:
//! there is no user-level recovery other than `try`/`catch`, which only
//! handles programmer-requested rejection. Errors carry a snapshot of
//! the call stack taken at raise time, so scopes can be torn down during
//! unwind without losing diagnostics.

use std::fmt;

use strum::IntoStaticStr;

/// Classification of a fatal runtime error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum ErrorKind {
    /// Scope exit with unexpected live locals.
    #[strum(serialize = "leaked-information")]
    LeakedInformation,
    /// Lookup miss.
    #[strum(serialize = "undefined-variable")]
    UndefinedVariable,
    /// Double definition of a variable, global or function.
    #[strum(serialize = "name-clash")]
    NameClash,
    /// Out-of-bounds or scalar-indexed access, popping an empty array.
    #[strum(serialize = "index-error")]
    IndexError,
    /// Array where a number was required, or the reverse.
    #[strum(serialize = "type-error")]
    TypeError,
    /// Unknown function in a call.
    #[strum(serialize = "undefined-function")]
    UndefinedFunction,
    /// Exit assertion of an if or loop failed, or a for-loop variable
    /// was left unequal to its iterator element.
    #[strum(serialize = "failed-assertion")]
    FailedAssertion,
    /// The arrow of time flipped while a mono variable was live.
    #[strum(serialize = "direction-change")]
    DirectionChange,
    /// Stealing, returning, unletting, pushing or promoting a borrowed
    /// reference.
    #[strum(serialize = "reference-ownership")]
    ReferenceOwnership,
    /// Division or modulus by zero, including modification statements.
    #[strum(serialize = "zero-error")]
    ZeroError,
    /// Shape mismatch, unlet value mismatch, invalid range or tensor.
    #[strum(serialize = "value-error")]
    ValueError,
    /// Argument arity mismatch at a call site.
    #[strum(serialize = "call-error")]
    CallError,
    /// Mono information reaching a non-mono destination.
    #[strum(serialize = "illegal-mono")]
    IllegalMono,
    /// Non-mono value where mono was required.
    #[strum(serialize = "expected-mono")]
    ExpectedMono,
    /// A try iterator was consumed without any element being accepted.
    #[strum(serialize = "exhausted-try")]
    ExhaustedTry,
    /// Reverse execution of a try disagreed with the recorded exit value.
    #[strum(serialize = "try-reverse-error")]
    TryReverseError,
    /// An imported file was missing or unreadable.
    #[strum(serialize = "import-error")]
    ImportError,
    /// A mutex was entered against the direction of its current holders.
    #[strum(serialize = "mutex-error")]
    MutexError,
    /// This thread aborted because a peer thread failed; the peer's
    /// error is the real diagnostic.
    #[strum(serialize = "sympathetic")]
    Sympathetic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &'static str = (*self).into();
        f.write_str(name)
    }
}

/// One entry of a captured call stack, innermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Name of the function the frame belongs to.
    pub function: String,
    /// Thread index when the frame ran inside a parallel call.
    pub thread: Option<usize>,
}

impl StackFrame {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            thread: None,
        }
    }

    pub fn in_thread(function: impl Into<String>, thread: usize) -> Self {
        Self {
            function: function.into(),
            thread: Some(thread),
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.thread {
            Some(tid) => write!(f, "{} (thread {tid})", self.function),
            None => f.write_str(&self.function),
        }
    }
}

/// A fatal runtime error with its captured call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RailwayError {
    pub kind: ErrorKind,
    pub message: String,
    /// Call stack at raise time, innermost frame first.
    pub stack: Vec<StackFrame>,
}

impl RailwayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, stack: Vec<StackFrame>) -> Self {
        Self {
            kind,
            message: message.into(),
            stack,
        }
    }

    /// An error raised outside any running scope (e.g. while loading).
    pub fn bare(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, Vec::new())
    }
}

impl fmt::Display for RailwayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Call Stack:")?;
        for frame in &self.stack {
            writeln!(f, "-> {frame}")?;
        }
        write!(f, "Runtime Error of type {}:\n{}", self.kind, self.message)
    }
}

impl std::error::Error for RailwayError {}
