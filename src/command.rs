use crate::builtin::Builtin;
use std::ffi::{CString, NulError};
use std::ops::Range;
use std::rc::Rc;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// The argument vector of one parsed line.
///
/// Arguments are stored as byte ranges into the line they were cut from, so the
/// vector never copies token text. `Argv` values are shared behind an [`Rc`]
/// between a history entry and every record replayed from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argv {
    line: String,
    spans: Vec<Range<usize>>,
}

impl Argv {
    /// Build an argument vector over `line`.
    ///
    /// Every span must be a non-empty, in-bounds range on a char boundary of `line`.
    pub(crate) fn new(line: String, spans: Vec<Range<usize>>) -> Self {
        debug_assert!(
            spans
                .iter()
                .all(|s| s.start < s.end && line.get(s.clone()).is_some())
        );
        Self { line, spans }
    }

    /// The backing line the arguments were cut from.
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.spans.get(index).map(|span| &self.line[span.clone()])
    }

    /// The command name, `argv[0]`.
    pub fn name(&self) -> Option<&str> {
        self.get(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + Clone + '_ {
        self.spans.iter().map(|span| &self.line[span.clone()])
    }

    /// Owned C strings suitable for an `exec` call; the exec wrapper supplies
    /// the terminating null pointer.
    pub fn to_cstrings(&self) -> Result<Vec<CString>, NulError> {
        self.iter().map(CString::new).collect()
    }
}

/// The parsed representation of one input line.
#[derive(Debug, Clone)]
pub struct CommandRecord {
    pub argv: Rc<Argv>,
    pub builtin: Option<Builtin>,
    pub background: bool,
    /// Set when the record was materialized from a `!N` history reference.
    pub from_history: bool,
}

impl CommandRecord {
    /// Text handed to a builtin: everything after the keyword, or empty.
    pub fn builtin_args(&self) -> &str {
        self.argv.get(1).unwrap_or("")
    }
}
