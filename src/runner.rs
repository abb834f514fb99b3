//! Bounded execution of control-plane commands.
//!
//! Faults never cross this boundary: a command that cannot be spawned or that
//! outlives its timeout is logged and reported as an unsuccessful
//! [`CommandResult`] with empty text. Exit status is recorded but callers
//! decide success from the output itself.
use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

/// Timeout for liveness probes.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);
/// Timeout for provisioning commands.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Flags whose values are secrets and must not reach the log.
const REDACTED_FLAGS: &[&str] = &["--api-key", "--dsn"];

/// Combined output of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// Stdout followed by stderr.
    pub text: String,
    pub succeeded: bool,
}

impl CommandResult {
    /// Result reported when the command could not run to completion.
    pub fn fault() -> Self {
        Self::default()
    }
}

/// Executes an argv and captures its output.
pub trait CommandRunner {
    fn run(&self, argv: &[String], timeout: Duration) -> CommandResult;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, argv: &[String], timeout: Duration) -> CommandResult {
        (**self).run(argv, timeout)
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, argv: &[String], timeout: Duration) -> CommandResult {
        match run_process(argv, timeout) {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(command = %redact_argv(argv), error = %format!("{err:#}"), "command fault");
                CommandResult::fault()
            }
        }
    }
}

fn run_process(argv: &[String], timeout: Duration) -> Result<CommandResult> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow!("command is empty"))?;

    let start = Instant::now();
    let deadline = start + timeout;
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawn {program}"))?;

    // Drain both pipes concurrently so a chatty command cannot fill one and
    // stall before the timeout is checked.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        if let Some(status) = child.try_wait().context("check command status")? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow!("timed out after {}ms", timeout.as_millis()));
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    // A background process left behind by the command can keep a pipe open
    // after the command itself exits; the deadline still applies.
    let mut text = collect(stdout, deadline, timeout)?;
    text.push_str(&collect(stderr, deadline, timeout)?);

    tracing::debug!(
        command = %redact_argv(argv),
        elapsed_ms = start.elapsed().as_millis(),
        exit_code = ?status.code(),
        output_bytes = text.len(),
        "command complete"
    );

    Ok(CommandResult {
        text,
        succeeded: status.success(),
    })
}

/// Read a pipe to EOF on its own thread; the bytes arrive on the receiver.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<Vec<u8>>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut bytes = Vec::new();
            let _ = pipe.read_to_end(&mut bytes);
            let _ = tx.send(bytes);
        });
        rx
    })
}

fn collect(pipe: Option<Receiver<Vec<u8>>>, deadline: Instant, timeout: Duration) -> Result<String> {
    let Some(rx) = pipe else {
        return Ok(String::new());
    };
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(RecvTimeoutError::Disconnected) => Ok(String::new()),
        Err(RecvTimeoutError::Timeout) => Err(anyhow!(
            "output still open after {}ms",
            timeout.as_millis()
        )),
    }
}

/// Render an argv for logs with secret flag values masked.
pub fn redact_argv(argv: &[String]) -> String {
    let mut rendered = Vec::with_capacity(argv.len());
    let mut mask_next = false;
    for arg in argv {
        if mask_next {
            rendered.push("***".to_string());
            mask_next = false;
            continue;
        }
        mask_next = REDACTED_FLAGS.contains(&arg.as_str());
        rendered.push(shell_words::quote(arg).into_owned());
    }
    rendered.join(" ")
}
