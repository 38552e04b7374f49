use anyhow::{Context, Result};
use argh::FromArgs;
use std::io::{self, IsTerminal};
use supersh::history::BUFSIZ;
use supersh::io_adapters::{EditorSource, PlainLineSource};
use supersh::{Config, Interpreter, LineSource};
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// An interactive shell with background jobs and `!N` history re-runs.
struct Args {
    #[argh(option, default = "BUFSIZ")]
    /// maximum number of commands kept in the history
    history_size: usize,

    #[argh(switch)]
    /// do not print the welcome banner
    no_banner: bool,
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SUPERSH_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let config = Config::new(args.history_size, !args.no_banner)?;
    supersh::ignore_interrupts().context("installing signal dispositions")?;

    let mut input: Box<dyn LineSource> = if io::stdin().is_terminal() {
        Box::new(EditorSource::new().context("starting line editor")?)
    } else {
        Box::new(PlainLineSource::new(io::stdin().lock(), io::stdout()))
    };

    Interpreter::new(config).repl(input.as_mut())
}
