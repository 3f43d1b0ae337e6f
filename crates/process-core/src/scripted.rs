//! In-memory [`ProcessRunner`] that replays scripted outcomes.
//!
//! Each invocation pops the next [`ScriptedRun`] (or succeeds silently when
//! the script is exhausted), replays its diagnostic lines through the
//! observer, and records the argument vector. With `touch_outputs`
//! enabled, a successful run creates an empty file at its last argument,
//! standing in for the file a real encoder would have written.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use notecast_common::error::{NotecastError, NotecastResult};

use crate::diagnostics::DiagnosticTail;
use crate::runner::{LineAction, LineObserver, PipedProcess, ProcessOutput, ProcessRunner};

/// How a scripted invocation ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedExit {
    Success,
    /// Nonzero exit with the given code.
    Code(i32),
    /// The binary could not be started.
    SpawnFailure(String),
    /// Piped mode only: every write fails, then the process exits with the code.
    BrokenPipe(i32),
}

/// One scripted invocation.
#[derive(Debug, Clone)]
pub struct ScriptedRun {
    pub lines: Vec<String>,
    pub exit: ScriptedExit,
}

impl ScriptedRun {
    pub fn success() -> Self {
        Self {
            lines: Vec::new(),
            exit: ScriptedExit::Success,
        }
    }

    pub fn exit_code(code: i32) -> Self {
        Self {
            lines: Vec::new(),
            exit: ScriptedExit::Code(code),
        }
    }

    pub fn spawn_failure(message: impl Into<String>) -> Self {
        Self {
            lines: Vec::new(),
            exit: ScriptedExit::SpawnFailure(message.into()),
        }
    }

    pub fn broken_pipe(code: i32) -> Self {
        Self {
            lines: Vec::new(),
            exit: ScriptedExit::BrokenPipe(code),
        }
    }

    pub fn with_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines = lines.into_iter().map(Into::into).collect();
        self
    }
}

/// Record of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub args: Vec<String>,
    pub piped: bool,
    /// The observer requested termination.
    pub terminated: bool,
}

#[derive(Debug, Default)]
struct ScriptState {
    script: VecDeque<ScriptedRun>,
    invocations: Vec<Invocation>,
}

/// Replays scripted outcomes instead of spawning processes.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    state: Arc<Mutex<ScriptState>>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    touch_outputs: bool,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty file at the last argument of each successful run.
    pub fn touching_outputs(mut self) -> Self {
        self.touch_outputs = true;
        self
    }

    /// Queue the outcome of the next invocation.
    pub fn push(&self, run: ScriptedRun) -> &Self {
        self.lock().script.push_back(run);
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.lock().invocations.clone()
    }

    /// Chunks written to piped processes, in write order.
    pub fn written_chunks(&self) -> Vec<Vec<u8>> {
        self.writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_run(&self, args: &[String], piped: bool) -> ScriptedRun {
        let mut state = self.lock();
        state.invocations.push(Invocation {
            args: args.to_vec(),
            piped,
            terminated: false,
        });
        state.script.pop_front().unwrap_or_else(ScriptedRun::success)
    }

    fn mark_terminated(&self) {
        if let Some(last) = self.lock().invocations.last_mut() {
            last.terminated = true;
        }
    }

    fn touch_output(&self, args: &[String]) -> NotecastResult<()> {
        if !self.touch_outputs {
            return Ok(());
        }
        match args.last() {
            Some(path) if path != "-" && !path.starts_with("pipe:") => {
                std::fs::write(PathBuf::from(path), b"")?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn tail_of(lines: &[String]) -> DiagnosticTail {
    let mut tail = DiagnosticTail::new(lines.len().max(1));
    for line in lines {
        tail.push(line.clone());
    }
    tail
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    fn program(&self) -> String {
        "scripted-ffmpeg".to_string()
    }

    async fn run(
        &self,
        args: &[String],
        observer: &mut (dyn LineObserver + Send),
    ) -> NotecastResult<ProcessOutput> {
        let run = self.next_run(args, false);
        if let ScriptedExit::SpawnFailure(message) = &run.exit {
            return Err(NotecastError::process_spawn(self.program(), message.clone()));
        }

        for line in &run.lines {
            if observer.on_line(line) == LineAction::Terminate {
                self.mark_terminated();
                return Ok(ProcessOutput {
                    code: None,
                    terminated_early: true,
                    diagnostics: tail_of(&run.lines),
                });
            }
        }

        match run.exit {
            ScriptedExit::Success => {
                self.touch_output(args)?;
                Ok(ProcessOutput {
                    code: Some(0),
                    terminated_early: false,
                    diagnostics: tail_of(&run.lines),
                })
            }
            ScriptedExit::Code(code) | ScriptedExit::BrokenPipe(code) => Err(
                NotecastError::process_exit(Some(code), tail_of(&run.lines).excerpt()),
            ),
            ScriptedExit::SpawnFailure(message) => {
                Err(NotecastError::process_spawn(self.program(), message))
            }
        }
    }

    async fn spawn_piped(&self, args: &[String]) -> NotecastResult<Box<dyn PipedProcess>> {
        let run = self.next_run(args, true);
        if let ScriptedExit::SpawnFailure(message) = &run.exit {
            return Err(NotecastError::process_spawn(self.program(), message.clone()));
        }
        Ok(Box::new(ScriptedPipe {
            runner: self.clone(),
            args: args.to_vec(),
            run,
            closed: false,
        }))
    }
}

struct ScriptedPipe {
    runner: ScriptedRunner,
    args: Vec<String>,
    run: ScriptedRun,
    closed: bool,
}

#[async_trait]
impl PipedProcess for ScriptedPipe {
    fn id(&self) -> Option<u32> {
        None
    }

    fn input_closed(&self) -> bool {
        self.closed
    }

    async fn write_all(&mut self, bytes: &[u8]) -> NotecastResult<()> {
        if self.closed {
            return Err(NotecastError::session_state("encoder input is already closed"));
        }
        if let ScriptedExit::BrokenPipe(_) = self.run.exit {
            self.closed = true;
            return Err(NotecastError::pipe("Broken pipe (os error 32)"));
        }
        self.runner
            .writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(bytes.to_vec());
        // Yield so concurrent writers get a chance to interleave if unserialized.
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> NotecastResult<ProcessOutput> {
        self.closed = true;
        let diagnostics = tail_of(&self.run.lines);
        match &self.run.exit {
            ScriptedExit::Success => {
                self.runner.touch_output(&self.args)?;
                Ok(ProcessOutput {
                    code: Some(0),
                    terminated_early: false,
                    diagnostics,
                })
            }
            ScriptedExit::Code(code) | ScriptedExit::BrokenPipe(code) => Err(
                NotecastError::process_exit(Some(*code), diagnostics.excerpt()),
            ),
            ScriptedExit::SpawnFailure(message) => {
                Err(NotecastError::process_spawn("scripted-ffmpeg", message.clone()))
            }
        }
    }
}
