use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use super::{FilterCompletion, FilterError, FilterOutcome, ReportFilter};
use crate::report::DEFAULT_FILTER_TIMEOUT;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Filter that shells out to an external formatter.
///
/// Each report is written as JSON to the program's stdin; its stdout is taken as the
/// rendered crash-log text. The work runs on a dedicated thread and the completion
/// fires from there. A formatter still running after the deadline is killed.
#[derive(Debug, Clone)]
pub struct CommandFilter {
    program: PathBuf,
    args: Vec<String>,
    deadline: Duration,
}

impl CommandFilter {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self { program: program.into(), args, deadline: DEFAULT_FILTER_TIMEOUT }
    }

    /// How long one formatter run may take before it is killed.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl ReportFilter for CommandFilter {
    fn name(&self) -> &'static str {
        "command"
    }

    fn filter_reports(&self, reports: Vec<Value>, on_completion: FilterCompletion) {
        let program = self.program.clone();
        let args = self.args.clone();
        let deadline = self.deadline;
        let spawned = thread::Builder::new().name("report-filter".into()).spawn(move || {
            let outcome = run_all(&program, &args, deadline, &reports);
            on_completion(outcome);
        });
        // On failure the closure, and the completion with it, is dropped; the
        // caller sees a disconnected channel and falls back to raw text.
        if let Err(err) = spawned {
            warn!(%err, "failed to spawn report filter thread");
        }
    }
}

fn run_all(program: &Path, args: &[String], deadline: Duration, reports: &[Value]) -> FilterOutcome {
    let mut rendered = Vec::with_capacity(reports.len());
    for report in reports {
        match run_one(program, args, deadline, report) {
            Ok(text) => rendered.push(text),
            Err(err) => return FilterOutcome::failure(err),
        }
    }
    FilterOutcome::success(rendered)
}

fn run_one(
    program: &Path,
    args: &[String],
    deadline: Duration,
    report: &Value,
) -> Result<String, FilterError> {
    let input = serde_json::to_vec(report)
        .map_err(|e| FilterError::Command(format!("failed to serialize report: {e}")))?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| FilterError::Unavailable(format!("failed to spawn {}: {e}", program.display())))?;

    // Every pipe gets its own thread so a chatty formatter cannot deadlock on a full
    // pipe while we are still writing or waiting.
    let stdin = child.stdin.take();
    let writer = thread::spawn(move || -> std::io::Result<()> {
        if let Some(mut stdin) = stdin {
            stdin.write_all(&input)?;
        }
        Ok(())
    });
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = wait_until(&mut child, deadline)
        .map_err(|e| FilterError::Command(format!("failed to wait for {}: {e}", program.display())))?;
    let Some(status) = status else {
        warn!(program = %program.display(), ?deadline, "formatter timed out and was killed");
        return Err(FilterError::Command(format!(
            "{} did not finish within {deadline:?}",
            program.display()
        )));
    };

    match writer.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(%e, "formatter closed stdin early"),
        Err(_) => return Err(FilterError::Command("stdin writer panicked".into())),
    }
    let stdout = collect(stdout)?;
    let stderr = collect(stderr)?;

    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr);
        return Err(FilterError::Command(format!(
            "{} exited with {}: {}",
            program.display(),
            status,
            stderr.trim()
        )));
    }
    String::from_utf8(stdout)
        .map_err(|e| FilterError::Command(format!("formatter output is not UTF-8: {e}")))
}

/// Poll `child` until it exits or `deadline` passes. `Ok(None)` means it was killed
/// and reaped.
fn wait_until(child: &mut Child, deadline: Duration) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= deadline {
            // The child may have exited between the poll and the kill.
            if let Err(err) = child.kill() {
                debug!(%err, "formatter kill failed");
            }
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn collect(reader: JoinHandle<std::io::Result<Vec<u8>>>) -> Result<Vec<u8>, FilterError> {
    match reader.join() {
        Ok(Ok(buf)) => Ok(buf),
        Ok(Err(e)) => Err(FilterError::Command(format!("failed to read formatter output: {e}"))),
        Err(_) => Err(FilterError::Command("formatter output reader panicked".into())),
    }
}
