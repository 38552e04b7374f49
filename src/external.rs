use crate::command::{Argv, ExitCode};
use crate::env::Environment;
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, execve, fork};
use std::borrow::Cow;
use std::ffi::{CString, OsStr};
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Exit status of a child that could not even start its program.
pub const EXEC_FAILED: ExitCode = 127;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{0}: argument contains a NUL byte")]
    InvalidArgument(String),
    #[error("{}", .0.desc())]
    Fork(Errno),
    #[error("wait: {}", .0.desc())]
    Wait(Errno),
}

/// How a child process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Exited(ExitCode),
    Signaled { signal: Signal, core_dumped: bool },
}

impl Termination {
    fn from_status(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(_, code) => Some(Termination::Exited(code)),
            WaitStatus::Signaled(_, signal, core_dumped) => Some(Termination::Signaled {
                signal,
                core_dumped,
            }),
            _ => None,
        }
    }

    /// Human-readable cause for a signal death, `None` for a normal exit.
    pub fn cause(&self) -> Option<String> {
        let Termination::Signaled {
            signal,
            core_dumped,
        } = self
        else {
            return None;
        };
        let name = match signal {
            Signal::SIGABRT => "Aborted",
            Signal::SIGFPE => "Floating Point Exception",
            Signal::SIGILL => "Illegal Instruction",
            Signal::SIGINT => "Interrupted",
            Signal::SIGSEGV => "Segmentation Fault",
            Signal::SIGTERM => "Terminated",
            _ => "Signaled",
        };
        Some(if *core_dumped {
            format!("{name} (Dumped Core!)")
        } else {
            name.to_string()
        })
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exited(code) => write!(f, "exit: {code}"),
            Termination::Signaled { .. } => f.write_str(self.cause().as_deref().unwrap_or("")),
        }
    }
}

/// A program ready to be exec'd: resolved path, argument vector and environment,
/// all converted before forking so the child only has to call `execve`.
#[derive(Debug)]
pub struct ExternalCommand {
    name: String,
    /// `None` when a bare name matched nothing on `PATH`.
    path: Option<CString>,
    args: Vec<CString>,
    envp: Vec<CString>,
}

impl ExternalCommand {
    /// Resolve `argv[0]` through the `PATH` binding of `env`.
    ///
    /// A name containing `/` is used as given. A bare name is only ever looked
    /// up on `PATH`, never in the current directory.
    pub fn prepare(argv: &Argv, env: &Environment) -> Result<Self, LaunchError> {
        let name = argv.name().unwrap_or_default().to_string();
        let invalid = || LaunchError::InvalidArgument(name.clone());

        let path = if name.contains('/') {
            Some(CString::new(name.as_str()).map_err(|_| invalid())?)
        } else {
            let search_paths = OsStr::new(env.get_var("PATH").unwrap_or_default());
            find_command_path(search_paths, Path::new(&name))
                .map(|resolved| CString::new(resolved.as_os_str().as_bytes()))
                .transpose()
                .map_err(|_| invalid())?
        };
        let args = argv.to_cstrings().map_err(|_| invalid())?;
        let envp = env.to_envp().map_err(|_| invalid())?;

        Ok(Self {
            name,
            path,
            args,
            envp,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the current process image. Only returns on failure.
    pub fn exec(&self) -> Errno {
        let Some(path) = &self.path else {
            return Errno::ENOENT;
        };
        match execve(path, &self.args, &self.envp) {
            Ok(never) => match never {},
            Err(errno) => errno,
        }
    }
}

/// Fork, run `body` in the new process and terminate it with the returned code.
///
/// Callers must flush any buffered output first, or the child inherits a copy.
pub fn fork_child<F>(body: F) -> Result<Pid, LaunchError>
where
    F: FnOnce() -> ExitCode,
{
    // SAFETY: the child only runs `body` and then leaves through `_exit`,
    // never returning into the caller's stack frames.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            debug!(pid = %child, "forked child");
            Ok(child)
        }
        Ok(ForkResult::Child) => {
            let code = body();
            // SAFETY: `_exit` terminates the process immediately; always sound.
            unsafe { nix::libc::_exit(code) }
        }
        Err(errno) => Err(LaunchError::Fork(errno)),
    }
}

/// Block until `pid` terminates.
pub fn wait_for(pid: Pid) -> Result<Termination, LaunchError> {
    loop {
        match waitpid(pid, None) {
            Ok(status) => {
                if let Some(termination) = Termination::from_status(status) {
                    return Ok(termination);
                }
            }
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(LaunchError::Wait(errno)),
        }
    }
}

/// Non-blocking check of `pid`; `None` while it is still running.
pub fn poll(pid: Pid) -> nix::Result<Option<Termination>> {
    waitpid(pid, Some(WaitPidFlag::WNOHANG)).map(Termination::from_status)
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returned if it exists.
/// - `./foo`, or any path with more than one component: returned if it exists
///   relative to the current directory.
/// - A bare name: the first executable regular file in `search_paths` (PATH
///   syntax). Empty entries, directories and files without an execute bit
///   are skipped.
/// - Empty path: `None`.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, _) => None,
        (Some(name), None) if !path.is_absolute() && !path.starts_with(".") => {
            std::env::split_paths(search_paths)
                .filter(|dir| !dir.as_os_str().is_empty())
                .map(|dir| dir.join(name.as_os_str()))
                .find(|candidate| is_executable(candidate))
                .map(Cow::Owned)
        }
        _ => path.exists().then_some(Cow::Borrowed(path)),
    }
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;
    use std::fs;
    use std::sync::{Mutex, MutexGuard, OnceLock};
    use std::time::{Duration, Instant};

    fn lock_children() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn argv(line: &str) -> Argv {
        Argv::new(line.to_string(), crate::lexer::split_into_spans(line))
    }

    fn spawn(line: &str) -> Pid {
        let cmd = ExternalCommand::prepare(&argv(line), &Environment::new()).unwrap();
        fork_child(|| {
            cmd.exec();
            EXEC_FAILED
        })
        .unwrap()
    }

    fn poll_until_done(pid: Pid) -> Termination {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(t) = poll(pid).unwrap() {
                return t;
            }
            assert!(Instant::now() < deadline, "child {pid} did not finish");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_bare_name_found_in_search_path() {
        let found = find_command_path(OsStr::new("/nonexistent:/bin"), Path::new("sh"));
        assert_eq!(found.as_deref(), Some(Path::new("/bin/sh")));
    }

    #[test]
    fn test_bare_name_missing_from_search_path() {
        assert!(find_command_path(OsStr::new("/bin"), Path::new("no-such-tool-x")).is_none());
        assert!(find_command_path(OsStr::new("/bin"), Path::new("")).is_none());
    }

    #[test]
    fn test_paths_with_separators_skip_search() {
        let found = find_command_path(OsStr::new(""), Path::new("/bin/sh"));
        assert_eq!(found.as_deref(), Some(Path::new("/bin/sh")));
        assert!(find_command_path(OsStr::new("/bin"), Path::new("/bin/missing-x")).is_none());

        let dir = std::env::temp_dir().join(format!("supersh_path_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let script = dir.join("tool");
        fs::write(&script, "").unwrap();
        let found = find_command_path(OsStr::new("/bin"), &script);
        assert_eq!(found.as_deref(), Some(script.as_path()));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_prepare_uses_env_path_binding() {
        let mut env = Environment::default();
        env.set_var("PATH", "/bin");
        let cmd = ExternalCommand::prepare(&argv("sh -c true"), &env).unwrap();
        assert_eq!(cmd.path.as_deref().map(CStr::to_bytes), Some(&b"/bin/sh"[..]));
        assert_eq!(cmd.args.len(), 3);
        assert_eq!(cmd.envp[0].as_bytes(), b"PATH=/bin");

        let unknown = ExternalCommand::prepare(&argv("no-such-tool-x"), &env).unwrap();
        assert_eq!(unknown.path, None);
        assert_eq!(unknown.exec(), Errno::ENOENT);

        let explicit = ExternalCommand::prepare(&argv("./no-such-tool-x"), &env).unwrap();
        assert_eq!(
            explicit.path.as_deref().map(CStr::to_bytes),
            Some(&b"./no-such-tool-x"[..])
        );
    }

    fn write_tool(dir: &Path, body: &str, mode: u32) -> std::path::PathBuf {
        fs::create_dir_all(dir).unwrap();
        let tool = dir.join("tool");
        fs::write(&tool, body).unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(mode)).unwrap();
        tool
    }

    #[test]
    fn test_search_skips_entries_that_cannot_run() {
        let root = std::env::temp_dir().join(format!("supersh_search_{}", std::process::id()));
        let not_executable = root.join("a");
        let directory = root.join("b");
        let runnable = root.join("c");
        write_tool(&not_executable, "#!/bin/sh\nexit 0\n", 0o644);
        fs::create_dir_all(directory.join("tool")).unwrap();
        let expected = write_tool(&runnable, "#!/bin/sh\nexit 0\n", 0o755);

        let search = std::env::join_paths([&not_executable, &directory, &runnable]).unwrap();
        let found = find_command_path(&search, Path::new("tool"));
        assert_eq!(found.as_deref(), Some(expected.as_path()));

        let search = std::env::join_paths([&not_executable, &directory]).unwrap();
        assert!(find_command_path(&search, Path::new("tool")).is_none());
        assert!(find_command_path(OsStr::new(""), Path::new("Cargo.toml")).is_none());
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_bare_name_is_never_run_from_current_dir() {
        let _lock = lock_children();
        let dir = std::env::temp_dir().join(format!("supersh_cwd_{}", std::process::id()));
        write_tool(&dir, "#!/bin/sh\nexit 5\n", 0o755);

        let mut env = Environment::default();
        env.set_var("PATH", "/bin:/usr/bin");
        let cmd = ExternalCommand::prepare(&argv("tool"), &env).unwrap();
        assert_eq!(cmd.path, None);

        let pid = fork_child(|| {
            if nix::unistd::chdir(dir.as_path()).is_err() {
                return 99;
            }
            cmd.exec();
            EXEC_FAILED
        })
        .unwrap();
        assert_eq!(wait_for(pid).unwrap(), Termination::Exited(EXEC_FAILED));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_cause_names() {
        let sig = |signal, core_dumped| Termination::Signaled {
            signal,
            core_dumped,
        };
        assert_eq!(Termination::Exited(3).cause(), None);
        assert_eq!(sig(Signal::SIGABRT, false).cause().unwrap(), "Aborted");
        assert_eq!(
            sig(Signal::SIGFPE, false).cause().unwrap(),
            "Floating Point Exception"
        );
        assert_eq!(sig(Signal::SIGILL, false).cause().unwrap(), "Illegal Instruction");
        assert_eq!(sig(Signal::SIGINT, false).cause().unwrap(), "Interrupted");
        assert_eq!(
            sig(Signal::SIGSEGV, true).cause().unwrap(),
            "Segmentation Fault (Dumped Core!)"
        );
        assert_eq!(sig(Signal::SIGTERM, false).cause().unwrap(), "Terminated");
        assert_eq!(sig(Signal::SIGKILL, false).cause().unwrap(), "Signaled");
        assert_eq!(Termination::Exited(0).to_string(), "exit: 0");
    }

    #[test]
    fn test_foreground_wait_reports_exit_code() {
        let _lock = lock_children();
        assert_eq!(wait_for(spawn("true")).unwrap(), Termination::Exited(0));
        assert_eq!(wait_for(spawn("false")).unwrap(), Termination::Exited(1));
    }

    #[test]
    fn test_exec_failure_exits_127() {
        let _lock = lock_children();
        let pid = spawn("no-such-tool-x");
        assert_eq!(wait_for(pid).unwrap(), Termination::Exited(EXEC_FAILED));
    }

    #[test]
    fn test_poll_sees_running_then_finished() {
        let _lock = lock_children();
        let pid = spawn("sleep 0.3");
        assert_eq!(poll(pid).unwrap(), None);
        assert_eq!(poll_until_done(pid), Termination::Exited(0));
        assert!(poll(pid).is_err(), "a reaped child cannot be waited on again");
    }

    #[test]
    fn test_signal_death_is_classified() {
        let _lock = lock_children();
        let pid = spawn("sleep 30");
        nix::sys::signal::kill(pid, Signal::SIGKILL).unwrap();
        assert_eq!(
            wait_for(pid).unwrap(),
            Termination::Signaled {
                signal: Signal::SIGKILL,
                core_dumped: false
            }
        );
    }

    #[test]
    fn test_child_closure_exit_code() {
        let _lock = lock_children();
        let pid = fork_child(|| 42).unwrap();
        assert_eq!(wait_for(pid).unwrap(), Termination::Exited(42));
    }
}
