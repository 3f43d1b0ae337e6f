//! `tokio::process` implementation of [`ProcessRunner`] for ffmpeg.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use notecast_common::config::EncoderConfig;
use notecast_common::error::{NotecastError, NotecastResult};

use crate::diagnostics::{DiagnosticTail, LineSplitter};
use crate::runner::{
    display_command, LineAction, LineObserver, PipedProcess, ProcessOutput, ProcessRunner,
};

/// Runs the ffmpeg binary as a child process.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    binary: PathBuf,
    tail_lines: usize,
}

impl FfmpegRunner {
    pub fn new(binary: impl Into<PathBuf>, tail_lines: usize) -> Self {
        Self {
            binary: binary.into(),
            tail_lines,
        }
    }

    /// Build a runner from configuration, resolving the binary location.
    pub fn from_config(config: &EncoderConfig) -> Self {
        Self::new(
            resolve_encoder_binary(config.binary.as_deref()),
            config.diagnostic_tail_lines,
        )
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).kill_on_drop(true);
        cmd
    }

    fn spawn(&self, cmd: &mut Command, args: &[String]) -> NotecastResult<Child> {
        tracing::debug!(command = %display_command(&self.program(), args), "Running encoder");
        let child = cmd
            .spawn()
            .map_err(|e| NotecastError::process_spawn(self.program(), e.to_string()))?;
        tracing::info!(pid = ?child.id(), args_len = args.len(), "Encoder process started");
        Ok(child)
    }
}

/// Locate the encoder binary.
///
/// Order: explicit configuration, the `FFMPEG_PATH` environment variable,
/// a `bin/ffmpeg` bundled next to the running executable, then `ffmpeg`
/// from `PATH`.
pub fn resolve_encoder_binary(configured: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }
    if let Some(path) = std::env::var_os("FFMPEG_PATH").filter(|v| !v.is_empty()) {
        return PathBuf::from(path);
    }
    let bundled = std::env::current_exe().ok().and_then(|exe| {
        let candidate = exe
            .parent()?
            .join("bin")
            .join(format!("ffmpeg{}", std::env::consts::EXE_SUFFIX));
        candidate.is_file().then_some(candidate)
    });
    bundled.unwrap_or_else(|| PathBuf::from("ffmpeg"))
}

/// Forward lines from one output stream until it closes.
fn forward_lines<R>(stream: R, tx: mpsc::UnboundedSender<String>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut stream = stream;
        let mut splitter = LineSplitter::default();
        let mut buf = [0u8; 4096];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    for line in splitter.push(&buf[..n]) {
                        if tx.send(line).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Failed reading encoder output");
                    break;
                }
            }
        }
        if let Some(line) = splitter.finish() {
            let _ = tx.send(line);
        }
    })
}

/// A failed `wait()` is reported against the binary that was spawned.
fn wait_failed(program: &str, err: std::io::Error) -> NotecastError {
    NotecastError::process_spawn(program, format!("failed waiting for exit: {err}"))
}

fn exit_result(output: ProcessOutput) -> NotecastResult<ProcessOutput> {
    if output.terminated_early || output.code == Some(0) {
        Ok(output)
    } else {
        Err(NotecastError::process_exit(
            output.code,
            output.diagnostics.excerpt(),
        ))
    }
}

#[async_trait]
impl ProcessRunner for FfmpegRunner {
    fn program(&self) -> String {
        self.binary.display().to_string()
    }

    async fn run(
        &self,
        args: &[String],
        observer: &mut (dyn LineObserver + Send),
    ) -> NotecastResult<ProcessOutput> {
        let mut cmd = self.command(args);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = self.spawn(&mut cmd, args)?;

        // Both pipes are drained concurrently so a full stderr buffer can
        // never stall the encoder.
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let mut diagnostics = DiagnosticTail::new(self.tail_lines);
        let mut terminated_early = false;
        while let Some(line) = rx.recv().await {
            if !terminated_early && observer.on_line(&line) == LineAction::Terminate {
                tracing::info!(pid = ?child.id(), "Terminating encoder on observer request");
                terminated_early = true;
                if let Err(err) = child.start_kill() {
                    tracing::warn!(error = %err, "Failed to kill encoder");
                }
            }
            diagnostics.push(line);
        }
        for reader in readers {
            let _ = reader.await;
        }

        let status = child
            .wait()
            .await
            .map_err(|e| wait_failed(&self.program(), e))?;
        tracing::info!(code = ?status.code(), terminated_early, "Encoder process exited");

        exit_result(ProcessOutput {
            code: status.code(),
            terminated_early,
            diagnostics,
        })
    }

    async fn spawn_piped(&self, args: &[String]) -> NotecastResult<Box<dyn PipedProcess>> {
        let mut cmd = self.command(args);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        let mut child = self.spawn(&mut cmd, args)?;

        let stdin = child.stdin.take();
        let tail_lines = self.tail_lines;
        let stderr_task = child.stderr.take().map(|stderr| {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let reader = forward_lines(stderr, tx);
            tokio::spawn(async move {
                let mut diagnostics = DiagnosticTail::new(tail_lines);
                while let Some(line) = rx.recv().await {
                    tracing::trace!(line = %line, "encoder");
                    diagnostics.push(line);
                }
                let _ = reader.await;
                diagnostics
            })
        });

        Ok(Box::new(FfmpegPipe {
            program: self.program(),
            child,
            stdin,
            stderr_task,
            tail_lines,
        }))
    }
}

/// ffmpeg child reading its input from a pipe.
struct FfmpegPipe {
    program: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<DiagnosticTail>>,
    tail_lines: usize,
}

#[async_trait]
impl PipedProcess for FfmpegPipe {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn input_closed(&self) -> bool {
        self.stdin.is_none()
    }

    async fn write_all(&mut self, bytes: &[u8]) -> NotecastResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| NotecastError::session_state("encoder input is already closed"))?;
        if let Err(err) = stdin.write_all(bytes).await {
            // A failed write means the encoder is gone; the input stays closed.
            self.stdin = None;
            return Err(NotecastError::pipe(format!(
                "failed to write {} bytes to encoder: {err}",
                bytes.len()
            )));
        }
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> NotecastResult<ProcessOutput> {
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(err) = stdin.shutdown().await {
                tracing::debug!(error = %err, "Encoder input was already closed");
            }
        }

        let status = self
            .child
            .wait()
            .await
            .map_err(|e| wait_failed(&self.program, e))?;

        let diagnostics = match self.stderr_task.take() {
            Some(task) => task
                .await
                .unwrap_or_else(|_| DiagnosticTail::new(self.tail_lines)),
            None => DiagnosticTail::new(self.tail_lines),
        };

        exit_result(ProcessOutput {
            code: status.code(),
            terminated_early: false,
            diagnostics,
        })
    }
}
