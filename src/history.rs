//! Bounded, insertion-ordered store of previously parsed commands.

use crate::builtin::Builtin;
use crate::command::{Argv, CommandRecord};
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::debug;

/// Size of the shell's line buffer; also the default history capacity.
pub const BUFSIZ: usize = 8192;

/// One remembered command. Shares its argument storage with the record it
/// was made from.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub argv: Rc<Argv>,
    pub builtin: Option<Builtin>,
    pub background: bool,
}

impl HistoryEntry {
    pub fn name(&self) -> &str {
        self.argv.name().unwrap_or("")
    }

    /// A fresh record sharing this entry's arguments, marked as a replay.
    pub fn replay(&self) -> CommandRecord {
        CommandRecord {
            argv: Rc::clone(&self.argv),
            builtin: self.builtin,
            background: self.background,
            from_history: true,
        }
    }
}

/// FIFO history with a fixed maximum number of entries.
#[derive(Debug)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl History {
    /// Create an empty history holding at most `capacity` entries.
    ///
    /// A zero capacity is bumped to one so that a just-recorded command can
    /// always be re-run.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append `record` at the tail, evicting the oldest entry first when full.
    ///
    /// Records without arguments are ignored. Returns the evicted entry, if any.
    pub fn record(&mut self, record: &CommandRecord) -> Option<HistoryEntry> {
        if record.argv.is_empty() {
            return None;
        }
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        if let Some(old) = &evicted {
            debug!(name = old.name(), "history full, evicting oldest entry");
        }
        self.entries.push_back(HistoryEntry {
            argv: Rc::clone(&record.argv),
            builtin: record.builtin,
            background: record.background,
        });
        evicted
    }

    /// Look up the `n`-th entry, counting from 1 at the oldest surviving one.
    pub fn resolve(&self, n: u64) -> Option<&HistoryEntry> {
        let index = usize::try_from(n).ok()?.checked_sub(1)?;
        self.entries.get(index)
    }

    /// `(index, command name, background)` for every entry, oldest first.
    ///
    /// The iterator is lazy and can be cloned to walk the history again.
    pub fn list(&self) -> impl Iterator<Item = (usize, &str, bool)> + Clone + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i + 1, entry.name(), entry.background))
    }
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(BUFSIZ)
    }
}
