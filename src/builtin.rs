use crate::command::ExitCode;
use crate::env::Environment;
use crate::history::History;
use crate::jobs::JobTable;
use crate::lexer::trim_blanks;
use anyhow::{Result, bail};
use regex::Regex;
use std::io::Write;
use std::sync::LazyLock;
use tracing::debug;

/// A keyword at the start of a line, followed by a blank or the end of the line.
static KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(echo|exit|help|history|jobs|set)(?:[ \t\r\n\x0B\x0C]|$)")
        .expect("builtin keyword pattern is valid")
});

/// Built-in commands known to the shell at compile time.
///
/// Builtins run inside the shell process when in the foreground and inside a
/// forked child when backgrounded. Each one receives the text that followed its
/// keyword on the line and parses it itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Echo,
    Exit,
    Help,
    History,
    Jobs,
    Set,
}

/// State a builtin may read or change while it runs.
pub struct BuiltinContext<'a> {
    pub stdout: &'a mut dyn Write,
    pub env: &'a mut Environment,
    pub history: &'a History,
    pub jobs: &'a JobTable,
}

impl Builtin {
    pub const ALL: [Builtin; 6] = [
        Builtin::Echo,
        Builtin::Exit,
        Builtin::Help,
        Builtin::History,
        Builtin::Jobs,
        Builtin::Set,
    ];

    /// Canonical keyword of the command, e.g. "echo" or "set".
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Echo => "echo",
            Builtin::Exit => "exit",
            Builtin::Help => "help",
            Builtin::History => "history",
            Builtin::Jobs => "jobs",
            Builtin::Set => "set",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Recognize a builtin keyword at the very start of `line`.
    pub fn match_prefix(line: &str) -> Option<Self> {
        let caps = KEYWORD.captures(line)?;
        Self::from_name(caps.get(1)?.as_str())
    }

    /// Executes the builtin with the text that followed its keyword.
    ///
    /// Return value follows shell conventions: 0 for success. Errors are user
    /// errors for the caller to report; nothing has been changed when one occurs.
    pub fn execute(self, args: &str, ctx: &mut BuiltinContext<'_>) -> Result<ExitCode> {
        match self {
            Builtin::Echo => echo(args, ctx.stdout),
            Builtin::Exit => exit(args, ctx.env),
            Builtin::Help => help(ctx.stdout),
            Builtin::History => history(ctx.history, ctx.stdout),
            Builtin::Jobs => jobs(ctx.jobs, ctx.stdout),
            Builtin::Set => set(args, ctx.env, ctx.stdout),
        }
    }
}

/// Write the rest of the line, or a blank line.
fn echo(args: &str, stdout: &mut dyn Write) -> Result<ExitCode> {
    writeln!(stdout, "{args}")?;
    Ok(0)
}

fn exit(args: &str, env: &mut Environment) -> Result<ExitCode> {
    if trim_blanks(args).is_empty() {
        env.should_exit = true;
    } else {
        debug!(args, "exit with trailing text ignored");
    }
    Ok(0)
}

fn help(stdout: &mut dyn Write) -> Result<ExitCode> {
    writeln!(stdout)?;
    writeln!(stdout, "supersh")?;
    writeln!(stdout, "^^^^^^^")?;
    writeln!(stdout, "echo    - output messages to terminal standard output")?;
    writeln!(stdout, "exit    - terminate shell process")?;
    writeln!(stdout, "help    - print this message")?;
    writeln!(stdout, "history - view previously executed commands")?;
    writeln!(stdout, "jobs    - list background commands")?;
    writeln!(stdout, "set     - assign environment variable values")?;
    writeln!(stdout)?;
    Ok(0)
}

fn history(history: &History, stdout: &mut dyn Write) -> Result<ExitCode> {
    for (index, name, background) in history.list() {
        if background {
            writeln!(stdout, "{index} {name} &")?;
        } else {
            writeln!(stdout, "{index} {name}")?;
        }
    }
    Ok(0)
}

fn jobs(jobs: &JobTable, stdout: &mut dyn Write) -> Result<ExitCode> {
    for (pid, job, text) in jobs.list() {
        writeln!(stdout, "Running\tpid: {pid} job: {job} argv: {text}")?;
    }
    Ok(0)
}

/// List bindings, or bind `name=value` / `name` (to the empty string).
fn set(args: &str, env: &mut Environment, stdout: &mut dyn Write) -> Result<ExitCode> {
    let args = trim_blanks(args);
    if args.is_empty() {
        for binding in env.bindings() {
            writeln!(stdout, "{binding}")?;
        }
        return Ok(0);
    }
    let (name, value) = args.split_once('=').unwrap_or((args, ""));
    if name.is_empty() {
        bail!("syntax error near: '='");
    }
    debug!(name, value, "setting environment binding");
    env.set_var(name, value);
    Ok(0)
}
