//! Child process execution for CLI-backed engines.

use super::{ProgressChannel, ProgressLine, ProgressStream};
use crate::errors::EngineError;
use crate::secrets::SecretValue;
use futures::channel::mpsc::{self, UnboundedSender};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Number of trailing stderr lines attached to a failure.
const STDERR_TAIL_LINES: usize = 20;

/// A command run against an engine executable.
///
/// Arguments must never contain secret values; secrets are passed on stdin
/// via [`EngineCommand::stdin_secret`].
#[derive(Debug, Clone)]
pub struct EngineCommand {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    stdin: Option<SecretValue>,
}

impl EngineCommand {
    /// Creates a command for `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdin: None,
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Writes a secret to the child's stdin, then closes it.
    #[must_use]
    pub fn stdin_secret(mut self, value: SecretValue) -> Self {
        self.stdin = Some(value);
        self
    }

    /// Renders the command line for logs and errors.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).kill_on_drop(true);
        if let Some(ref dir) = self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Runs to completion and returns captured stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exits unsuccessfully.
    pub async fn output(self) -> Result<String, EngineError> {
        let command_line = self.display();
        debug!(command = %command_line, "Running engine command");

        let mut cmd = self.build();
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd.stdin(if self.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = cmd.spawn()?;
        if let Some(secret) = self.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(secret.expose_secret().as_bytes()).await?;
                stdin.shutdown().await?;
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(EngineError::command_failed(
                command_line,
                output.status.to_string(),
                (!stderr.is_empty()).then_some(stderr),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Runs the command, yielding its stdout and stderr lines as they arrive.
    ///
    /// The process is spawned when the stream is first polled. A non-zero
    /// exit becomes the final `Err` item, carrying the tail of stderr.
    #[must_use]
    pub fn stream(self) -> ProgressStream {
        stream::once(async move { self.spawn_streaming() })
            .flatten()
            .boxed()
    }

    fn spawn_streaming(self) -> ProgressStream {
        let command_line = self.display();
        debug!(command = %command_line, "Streaming engine command");

        let mut cmd = self.build();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => return stream::once(async move { Err(EngineError::Io(err)) }).boxed(),
        };

        let (tx, rx) = mpsc::unbounded();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));

        tokio::spawn(async move {
            futures::join!(
                forward_lines(stdout, ProgressChannel::Stdout, tx.clone(), None),
                forward_lines(stderr, ProgressChannel::Stderr, tx.clone(), Some(tail.clone())),
            );

            let failure = match child.wait().await {
                Ok(status) if status.success() => None,
                Ok(status) => {
                    let detail = tail.lock().iter().cloned().collect::<Vec<_>>().join("\n");
                    Some(EngineError::command_failed(
                        command_line,
                        status.to_string(),
                        (!detail.is_empty()).then_some(detail),
                    ))
                }
                Err(err) => Some(EngineError::Io(err)),
            };

            if let Some(err) = failure {
                let _ = tx.unbounded_send(Err(err));
            }
        });

        rx.boxed()
    }
}

async fn forward_lines<R>(
    reader: Option<R>,
    channel: ProgressChannel,
    tx: UnboundedSender<Result<ProgressLine, EngineError>>,
    tail: Option<Arc<Mutex<VecDeque<String>>>>,
) where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                // Engines may print non-UTF-8 bytes; they never fail the operation.
                let line = String::from_utf8_lossy(trim_line_end(&buf)).into_owned();
                if let Some(ref tail) = tail {
                    let mut tail = tail.lock();
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line.clone());
                }
                // The receiver may already be gone; keep draining so the child never blocks.
                let _ = tx.unbounded_send(Ok(ProgressLine { channel, text: line }));
            }
            Err(err) => {
                // Only the exit status decides the outcome of the operation.
                warn!(?channel, error = %err, "Stopped reading engine output");
                break;
            }
        }
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display() {
        let cmd = EngineCommand::new("pulumi")
            .args(["refresh", "--yes"])
            .arg("--stack")
            .arg("dirien/app/dev");

        assert_eq!(cmd.display(), "pulumi refresh --yes --stack dirien/app/dev");
    }

    #[tokio::test]
    async fn test_output_captures_stdout() {
        let out = EngineCommand::new("sh")
            .args(["-c", "echo hello"])
            .output()
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_output_writes_secret_to_stdin() {
        let out = EngineCommand::new("sh")
            .args(["-c", "cat"])
            .stdin_secret(SecretValue::new("s3cr3t"))
            .output()
            .await
            .unwrap();
        assert_eq!(out, "s3cr3t");
    }

    #[tokio::test]
    async fn test_output_failure_includes_stderr() {
        let err = EngineCommand::new("sh")
            .args(["-c", "echo nope >&2; exit 4"])
            .output()
            .await
            .unwrap_err();

        match err {
            EngineError::CommandFailed { detail, .. } => assert_eq!(detail.as_deref(), Some("nope")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stream_yields_lines_in_order() {
        let items: Vec<_> = EngineCommand::new("sh")
            .args(["-c", "echo one; echo two"])
            .stream()
            .collect()
            .await;

        let lines: Vec<String> = items.into_iter().map(|r| r.unwrap().text).collect();
        assert_eq!(lines, vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn test_stream_tolerates_invalid_utf8() {
        let items: Vec<_> = EngineCommand::new("sh")
            .args(["-c", "echo before; printf 'caf\\351\\r\\n'; echo after; exit 0"])
            .stream()
            .collect()
            .await;

        let lines: Vec<String> = items.into_iter().map(|r| r.unwrap().text).collect();
        assert_eq!(
            lines,
            vec!["before".to_string(), "caf\u{fffd}".to_string(), "after".to_string()]
        );
    }

    #[tokio::test]
    async fn test_stream_failure_is_last_item() {
        let items: Vec<_> = EngineCommand::new("sh")
            .args(["-c", "echo working; echo broken >&2; exit 3"])
            .stream()
            .collect()
            .await;

        let (last, lines) = items.split_last().unwrap();
        assert!(matches!(last, Err(EngineError::CommandFailed { .. })));
        assert!(lines
            .iter()
            .any(|l| matches!(l, Ok(line) if line.channel == ProgressChannel::Stderr && line.text == "broken")));
        assert!(last.as_ref().unwrap_err().to_string().contains("broken"));
    }

    #[tokio::test]
    async fn test_stream_spawn_failure() {
        let items: Vec<_> = EngineCommand::new("/nonexistent/stackflow-engine")
            .stream()
            .collect()
            .await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(EngineError::Io(_))));
    }
}
