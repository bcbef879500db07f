//! Recording mock console for unit and integration tests.
//!
//! The real console reads the process's stdin, which test code cannot feed,
//! and writes to stdout, which test code cannot observe.  `MockConsole`
//! replaces both with in-memory state: input lines come from a script queued
//! at construction, and every written line is recorded for assertions.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{LineInput, LineOutput};

/// A console whose input is scripted and whose output is recorded.
///
/// Once the script runs out, `read_line` returns `None` — the same signal a
/// real console gives on end of input — so tests exercise the disconnect path
/// for free.
#[derive(Default)]
pub struct MockConsole {
    inputs: Mutex<VecDeque<String>>,
    written: std::sync::Mutex<Vec<String>>,
}

impl MockConsole {
    /// Creates a console with no scripted input (immediate EOF).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a console that will yield `lines` in order, then EOF.
    pub fn with_script(lines: &[&str]) -> Self {
        Self {
            inputs: Mutex::new(lines.iter().map(|s| s.to_string()).collect()),
            written: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of everything written so far, in order.
    pub fn written_lines(&self) -> Vec<String> {
        self.written.lock().expect("output record poisoned").clone()
    }
}

#[async_trait]
impl LineInput for MockConsole {
    async fn read_line(&self) -> Option<String> {
        self.inputs.lock().await.pop_front()
    }
}

impl LineOutput for MockConsole {
    fn write_line(&self, line: &str) {
        self.written
            .lock()
            .expect("output record poisoned")
            .push(line.to_string());
    }
}
