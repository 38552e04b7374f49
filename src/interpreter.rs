use crate::builtin::{Builtin, BuiltinContext};
use crate::command::{CommandRecord, ExitCode};
use crate::config::Config;
use crate::env::Environment;
use crate::external::{self, EXEC_FAILED, ExternalCommand, LaunchError, Termination};
use crate::history::History;
use crate::io_adapters::LineSource;
use crate::jobs::JobTable;
use crate::lexer;
use crate::parser::parse_line;
use anyhow::Result;
use nix::sys::signal::{SigHandler, Signal, signal};
use nix::unistd::Pid;
use std::fmt::Display;
use std::io::{self, Write};
use tracing::{debug, info, warn};

/// The interactive shell: owns the environment, history and job table and runs
/// one prompt cycle per input line.
///
/// Example
/// ```no_run
/// use supersh::{Config, Interpreter};
/// use supersh::io_adapters::PlainLineSource;
///
/// let mut sh = Interpreter::new(Config::default());
/// let mut input = PlainLineSource::new(std::io::stdin().lock(), std::io::stdout());
/// sh.repl(&mut input).unwrap();
/// ```
pub struct Interpreter {
    config: Config,
    env: Environment,
    history: History,
    jobs: JobTable,
    counter: u64,
    out: Box<dyn Write>,
    err: Box<dyn Write>,
}

impl Interpreter {
    /// Create a shell writing to the process's standard output and error.
    pub fn new(config: Config) -> Self {
        Self::with_output(config, Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// Create a shell writing its output and fault messages to the given streams.
    pub fn with_output(config: Config, out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        Self {
            env: Environment::new(),
            history: History::with_capacity(config.history_capacity),
            jobs: JobTable::new(),
            counter: 1,
            config,
            out,
            err,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn jobs(&self) -> &JobTable {
        &self.jobs
    }

    /// Number shown in the next prompt.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn prompt(&self) -> String {
        format!("[{}]{} ", self.counter, self.config.prompt_marker)
    }

    /// Read-eval-print until end of input or `exit`.
    ///
    /// Only failures of the shell's own I/O end the loop with an error.
    pub fn repl(&mut self, input: &mut dyn LineSource) -> Result<()> {
        if self.config.banner {
            writeln!(self.out, ":-) Welcome to supersh. Type help for help.\n")?;
        }
        while !self.env.should_exit {
            self.sweep_jobs()?;
            self.out.flush()?;
            let prompt = self.prompt();
            let Some(line) = input.read_line(&prompt)? else {
                info!("end of input");
                break;
            };
            self.execute_line(&line)?;
        }
        self.out.flush()?;
        Ok(())
    }

    /// Parse, record and dispatch one raw input line.
    pub fn execute_line(&mut self, line: &str) -> Result<()> {
        let record = match parse_line(line, &self.history) {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(()),
            Err(e) => {
                debug!(error = %e, "line rejected");
                return self.fault(e);
            }
        };
        self.counter += 1;
        // a replay runs again but is not remembered again
        if !record.from_history {
            self.history.record(&record);
        }
        match record.builtin {
            Some(builtin) if !record.background => self.run_builtin(builtin, &record),
            _ => self.launch(&record, lexer::trim_blanks(line)),
        }
    }

    /// Reap finished background jobs and announce them.
    pub fn sweep_jobs(&mut self) -> Result<()> {
        for done in self.jobs.sweep(external::poll) {
            match done.termination.cause() {
                None => writeln!(
                    self.out,
                    "End\tpid: {} job: {} argv: {} {}",
                    done.pid, done.job, done.text, done.termination
                )?,
                Some(cause) => {
                    writeln!(
                        self.out,
                        "End\tpid: {} job: {} argv: {}",
                        done.pid, done.job, done.text
                    )?;
                    writeln!(self.err, "{cause}")?;
                }
            }
        }
        Ok(())
    }

    fn run_builtin(&mut self, builtin: Builtin, record: &CommandRecord) -> Result<()> {
        let mut ctx = BuiltinContext {
            stdout: &mut *self.out,
            env: &mut self.env,
            history: &self.history,
            jobs: &self.jobs,
        };
        match builtin.execute(record.builtin_args(), &mut ctx) {
            Ok(code) => {
                debug!(builtin = builtin.name(), code, "builtin finished");
                Ok(())
            }
            Err(e) => self.fault(e),
        }
    }

    /// Fork the record off; wait for it unless it is backgrounded.
    fn launch(&mut self, record: &CommandRecord, text: &str) -> Result<()> {
        self.out.flush()?;
        self.err.flush()?;
        let pid = match self.fork_record(record) {
            Ok(pid) => pid,
            Err(e) => {
                warn!(error = %e, "launch abandoned");
                return self.fault(e);
            }
        };
        if record.background {
            let job = self.jobs.insert(pid, text);
            writeln!(self.out, "Begin\tpid: {pid} job: {job} argv: {text}")?;
            return Ok(());
        }
        match external::wait_for(pid) {
            Ok(termination) => self.report(&termination),
            Err(e) => self.fault(e),
        }
    }

    fn fork_record(&mut self, record: &CommandRecord) -> Result<Pid, LaunchError> {
        if let Some(builtin) = record.builtin {
            let args = record.builtin_args();
            return external::fork_child(|| self.run_builtin_in_child(builtin, args));
        }
        let command = ExternalCommand::prepare(&record.argv, &self.env)?;
        external::fork_child(|| {
            let errno = command.exec();
            let _ = writeln!(self.err, "supersh: {}: {}", command.name(), errno.desc());
            let _ = self.err.flush();
            EXEC_FAILED
        })
    }

    fn run_builtin_in_child(&mut self, builtin: Builtin, args: &str) -> ExitCode {
        let mut ctx = BuiltinContext {
            stdout: &mut *self.out,
            env: &mut self.env,
            history: &self.history,
            jobs: &self.jobs,
        };
        let code = match builtin.execute(args, &mut ctx) {
            Ok(code) => code,
            Err(e) => {
                let _ = writeln!(self.err, "supersh: {e}");
                1
            }
        };
        let _ = self.out.flush();
        let _ = self.err.flush();
        code
    }

    fn report(&mut self, termination: &Termination) -> Result<()> {
        match termination.cause() {
            Some(cause) => {
                writeln!(self.err, "{cause}")?;
                self.err.flush()?;
            }
            None => debug!(%termination, "foreground command finished"),
        }
        Ok(())
    }

    fn fault(&mut self, message: impl Display) -> Result<()> {
        writeln!(self.err, "supersh: {message}")?;
        self.err.flush()?;
        Ok(())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// Make the shell process itself immune to interrupt and termination requests.
///
/// Children inherit the ignored disposition; nothing resets it for them.
pub fn ignore_interrupts() -> nix::Result<()> {
    // SAFETY: SIG_IGN installs no handler code.
    unsafe {
        signal(Signal::SIGINT, SigHandler::SigIgn)?;
        signal(Signal::SIGTERM, SigHandler::SigIgn)?;
    }
    Ok(())
}
