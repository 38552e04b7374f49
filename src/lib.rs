//! The execution core of `supersh`, a small line-oriented interactive shell.
//!
//! A raw input line is turned into a [`CommandRecord`] by the parser, recorded in
//! the bounded [`History`], and then either handled in-process by a [`Builtin`] or
//! forked off as a child process. Children started with a trailing `&` are tracked
//! in the [`JobTable`] until a later sweep reaps them.
//!
//! The main entry point is [`Interpreter`], which owns all of that state and drives
//! one prompt cycle at a time from a [`LineSource`].

pub mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod external;
pub mod history;
pub mod io_adapters;
mod interpreter;
pub mod jobs;
mod lexer;
pub mod parser;

pub use builtin::Builtin;
pub use command::{Argv, CommandRecord, ExitCode};
pub use config::Config;
pub use history::History;
pub use interpreter::{Interpreter, ignore_interrupts};
pub use io_adapters::LineSource;
pub use jobs::JobTable;
