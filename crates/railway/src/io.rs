//! Output handling for `print` and `println`.
//!
//! Interpreted programs write through a [`PrintWriter`], so embedders
//! and tests can capture or discard output instead of touching the
//! process stdout.

use std::{
    io::{self, Write as _},
    sync::{Arc, Mutex},
};

/// Destination for `print`/`println` output.
///
/// Implementations receive already-formatted value text; separators and
/// newlines arrive through [`PrintWriter::push`].
pub trait PrintWriter: Send {
    /// Writes the text of a single printed item.
    fn write(&mut self, text: &str);

    /// Writes a separator or terminator character (space or newline).
    fn push(&mut self, end: char);
}

/// A shareable writer handle; parallel calls print through the same
/// writer from several threads.
pub type SharedWriter = Arc<Mutex<dyn PrintWriter>>;

/// Wraps a writer for use by the interpreter.
pub fn shared_writer(writer: impl PrintWriter + 'static) -> SharedWriter {
    Arc::new(Mutex::new(writer))
}

/// Default writer: process stdout, flushed per item so interleaved
/// thread output stays readable.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn write(&mut self, text: &str) {
        let mut out = io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
    }

    fn push(&mut self, end: char) {
        let mut out = io::stdout().lock();
        let mut buf = [0u8; 4];
        let _ = out.write_all(end.encode_utf8(&mut buf).as_bytes());
        if end == '\n' {
            let _ = out.flush();
        }
    }
}

/// Collects all output into a string; used by tests and embedders.
#[derive(Debug, Default)]
pub struct CollectStringPrint(String);

impl CollectStringPrint {
    pub fn new() -> Self {
        Self(String::new())
    }

    pub fn output(&self) -> &str {
        self.0.as_str()
    }

    pub fn into_output(self) -> String {
        self.0
    }
}

impl PrintWriter for CollectStringPrint {
    fn write(&mut self, text: &str) {
        self.0.push_str(text);
    }

    fn push(&mut self, end: char) {
        self.0.push(end);
    }
}

/// Discards all output.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn write(&mut self, _text: &str) {}

    fn push(&mut self, _end: char) {}
}
