//! Extension process execution.
//!
//! Every extension call is one short-lived child process. The runner is a
//! trait so the host can be driven by a scripted fake in tests.

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

/// How often a running child is checked for cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A single process call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
    /// Extra environment, on top of the inherited one.
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

/// How a captured process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited on its own; `None` when killed by a signal.
    Exited(Option<i32>),
    TimedOut,
    Cancelled,
}

/// Everything a captured run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutput {
    pub termination: Termination,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.termination == Termination::Exited(Some(0))
    }
}

/// Spawns extension processes.
pub trait ProcessRunner: Send + Sync {
    /// Run to completion with stdout and stderr captured.
    ///
    /// Output of a timed-out or cancelled process is discarded.
    fn capture(&self, invocation: &Invocation, cancel: &CancelToken) -> io::Result<ProcessOutput>;

    /// Run with the terminal attached, blocking until exit.
    fn interactive(&self, invocation: &Invocation) -> io::Result<Option<i32>>;
}

/// Shared flag asking an outstanding invocation to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Re-arm the token for the next invocation.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Production runner backed by `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandRunner;

impl CommandRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for CommandRunner {
    fn capture(&self, invocation: &Invocation, cancel: &CancelToken) -> io::Result<ProcessOutput> {
        let mut child = invocation
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        tracing::debug!("Spawned {} (pid {})", invocation.program.display(), child.id());

        // Pipes are drained concurrently so a chatty child cannot block on a full buffer
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let started = Instant::now();
        let termination = loop {
            if let Some(stopped) = interrupted(invocation, started, cancel) {
                terminate(&mut child);
                break stopped;
            }
            if let Some(status) = child.wait_timeout(POLL_INTERVAL)? {
                break Termination::Exited(status.code());
            }
        };

        // A grandchild that inherited the pipes keeps them open past the
        // child's exit; the same deadline and token bound the wait for them
        let collected = match termination {
            Termination::Exited(_) => collect(stdout, invocation, started, cancel)
                .and_then(|out| Ok((out, collect(stderr, invocation, started, cancel)?))),
            stopped => Err(stopped),
        };

        match collected {
            Ok((stdout, stderr)) => Ok(ProcessOutput {
                termination,
                stdout,
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            }),
            // Reader threads stay detached until the pipes close
            Err(stopped) => Ok(ProcessOutput {
                termination: stopped,
                stdout: Vec::new(),
                stderr: String::new(),
            }),
        }
    }

    fn interactive(&self, invocation: &Invocation) -> io::Result<Option<i32>> {
        tracing::debug!("Handing terminal to {}", invocation.program.display());
        let status = invocation
            .command()
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;
        Ok(status.code())
    }
}

/// Find an executable file named `name` on `PATH`.
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Why a running invocation has to stop, if it does.
fn interrupted(
    invocation: &Invocation,
    started: Instant,
    cancel: &CancelToken,
) -> Option<Termination> {
    if cancel.is_cancelled() {
        tracing::info!("Cancelling {}", invocation.program.display());
        return Some(Termination::Cancelled);
    }
    let limit = invocation.timeout?;
    if started.elapsed() >= limit {
        tracing::warn!("{} timed out after {:?}", invocation.program.display(), limit);
        return Some(Termination::TimedOut);
    }
    None
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

/// Wait for a reader to hit end of file.
fn collect(
    reader: Option<Receiver<Vec<u8>>>,
    invocation: &Invocation,
    started: Instant,
    cancel: &CancelToken,
) -> Result<Vec<u8>, Termination> {
    let Some(reader) = reader else {
        return Ok(Vec::new());
    };
    loop {
        if let Some(stopped) = interrupted(invocation, started, cancel) {
            return Err(stopped);
        }
        match reader.recv_timeout(POLL_INTERVAL) {
            Ok(buf) => return Ok(buf),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Ok(Vec::new()),
        }
    }
}

fn terminate(child: &mut std::process::Child) {
    let _ = child.kill();
    let _ = child.wait();
}
