//! Console progress forwarding.
//!
//! Engine operations can run for minutes, so their output is passed through
//! to the operator line by line instead of being collected.

use crate::engine::{ProgressLine, ProgressStream};
use crate::errors::EngineError;
use futures::StreamExt;
use parking_lot::Mutex;
use std::io::Write;

/// Receives progress output and status messages.
pub trait ProgressSink: Send + Sync {
    /// Handles one line of engine output.
    fn line(&self, line: &ProgressLine);

    /// Handles an orchestrator status message.
    fn status(&self, message: &str);
}

/// Writes everything to standard output, flushing after each line.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutProgress;

impl StdoutProgress {
    fn write(text: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout must not abort a half-finished infrastructure operation.
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }
}

impl ProgressSink for StdoutProgress {
    fn line(&self, line: &ProgressLine) {
        Self::write(&line.text);
    }

    fn status(&self, message: &str) {
        Self::write(message);
    }
}

/// Records everything in memory.
#[derive(Debug, Default)]
pub struct CollectingProgress {
    entries: Mutex<Vec<String>>,
}

impl CollectingProgress {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every line and status message in arrival order.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Returns true if `text` was received.
    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        self.entries.lock().iter().any(|e| e == text)
    }
}

impl ProgressSink for CollectingProgress {
    fn line(&self, line: &ProgressLine) {
        self.entries.lock().push(line.text.clone());
    }

    fn status(&self, message: &str) {
        self.entries.lock().push(message.to_string());
    }
}

/// Drains a progress stream into a sink.
///
/// Returns the number of lines forwarded.
///
/// # Errors
///
/// Returns the first error the stream yields; nothing after it is read.
pub async fn forward_progress(
    mut stream: ProgressStream,
    sink: &dyn ProgressSink,
) -> Result<usize, EngineError> {
    let mut forwarded = 0;
    while let Some(item) = stream.next().await {
        let line = item?;
        sink.line(&line);
        forwarded += 1;
    }
    Ok(forwarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_forward_progress_passes_lines_through() {
        let sink = CollectingProgress::new();
        let items = vec![
            Ok(ProgressLine::stdout("Refreshing (dev)")),
            Ok(ProgressLine::stderr("warning: deprecated")),
        ];

        let count = forward_progress(stream::iter(items).boxed(), &sink).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(sink.entries(), vec!["Refreshing (dev)", "warning: deprecated"]);
    }

    #[tokio::test]
    async fn test_forward_progress_stops_at_first_error() {
        let sink = CollectingProgress::new();
        let items = vec![
            Ok(ProgressLine::stdout("before")),
            Err(EngineError::rejected("conflict")),
            Ok(ProgressLine::stdout("after")),
        ];

        let err = forward_progress(stream::iter(items).boxed(), &sink)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "conflict");
        assert_eq!(sink.entries(), vec!["before"]);
    }

    #[test]
    fn test_collecting_progress_status() {
        let sink = CollectingProgress::new();
        sink.status("Starting refresh");
        assert!(sink.contains("Starting refresh"));
        assert!(!sink.contains("Refresh succeeded!"));
    }
}
