//! The encoder process abstraction.

use async_trait::async_trait;
use notecast_common::error::NotecastResult;

use crate::diagnostics::DiagnosticTail;

/// What a diagnostic observer wants the runner to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAction {
    Continue,
    /// Kill the process. Remaining output is drained but no longer observed.
    Terminate,
}

/// Receives every diagnostic line while a process runs.
pub trait LineObserver {
    fn on_line(&mut self, line: &str) -> LineAction;
}

impl<F> LineObserver for F
where
    F: FnMut(&str) -> LineAction,
{
    fn on_line(&mut self, line: &str) -> LineAction {
        self(line)
    }
}

/// Observer for callers that only care about the exit status.
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreLines;

impl LineObserver for IgnoreLines {
    fn on_line(&mut self, _line: &str) -> LineAction {
        LineAction::Continue
    }
}

/// Result of a process that ran to completion or was stopped on request.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,

    /// The observer asked for termination before the process exited.
    pub terminated_early: bool,

    /// Most recent diagnostic lines.
    pub diagnostics: DiagnosticTail,
}

/// Spawns the external encoder with explicit argument vectors.
///
/// `run` resolves with `Ok` on exit code 0 or when the observer requested
/// termination, and with `ProcessSpawn`/`ProcessExit` errors otherwise.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Program name used in logs and errors.
    fn program(&self) -> String;

    /// Run to completion, feeding stdout and stderr lines to `observer`.
    async fn run(
        &self,
        args: &[String],
        observer: &mut (dyn LineObserver + Send),
    ) -> NotecastResult<ProcessOutput>;

    /// Spawn with a writable standard input for streaming input data.
    async fn spawn_piped(&self, args: &[String]) -> NotecastResult<Box<dyn PipedProcess>>;

    /// Run without observing diagnostics.
    async fn run_quiet(&self, args: &[String]) -> NotecastResult<ProcessOutput> {
        self.run(args, &mut IgnoreLines).await
    }
}

/// A running process fed through its standard input.
#[async_trait]
pub trait PipedProcess: Send {
    /// OS process id, when known.
    fn id(&self) -> Option<u32>;

    /// Whether the input side has been closed (by `finish` or a failed write).
    fn input_closed(&self) -> bool;

    /// Write one chunk to standard input. Blocks while the pipe is full.
    async fn write_all(&mut self, bytes: &[u8]) -> NotecastResult<()>;

    /// Close standard input and wait for exit. Nonzero exits are errors.
    async fn finish(self: Box<Self>) -> NotecastResult<ProcessOutput>;
}

/// Render an argument vector for logs. Not meant to be re-parsed.
pub fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}
