//! Console I/O collaborators.
//!
//! The core never talks to stdin/stdout directly; it consumes a line-input
//! source and a line-output sink.  That keeps the loops testable with the
//! recording mock in [`mock`] and keeps user-facing chat output separate from
//! the `tracing` log stream.

pub mod mock;

use std::future::Future;
use std::io::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

/// Interval between activity-indicator ticks during a backoff wait.
const ACTIVITY_TICK: Duration = Duration::from_millis(500);

/// A source of console lines.  `None` means end of input (Ctrl-D / closed pipe).
#[async_trait]
pub trait LineInput: Send + Sync {
    /// Reads one line, without the trailing newline.
    async fn read_line(&self) -> Option<String>;
}

/// A sink for console lines.
pub trait LineOutput: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Real console backed by tokio stdin/stdout.
pub struct StdConsole {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl StdConsole {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    /// Prints `prompt` without a newline and reads the user's answer.
    pub async fn prompt(&self, prompt: &str) -> Option<String> {
        print!("{prompt}");
        let _ = std::io::stdout().flush();
        self.read_line().await
    }
}

impl Default for StdConsole {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LineInput for StdConsole {
    async fn read_line(&self) -> Option<String> {
        self.lines.lock().await.next_line().await.ok().flatten()
    }
}

impl LineOutput for StdConsole {
    fn write_line(&self, line: &str) {
        println!("{line}");
    }
}

/// Aborts the wrapped task when dropped, including during unwinding.
struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs `action` while a transient activity indicator ticks on stderr.
///
/// The indicator is a background task with no state of its own; it is
/// force-aborted the moment `action` completes, whatever the outcome — the
/// drop guard fires on the normal path and on unwind alike.
pub async fn run_with_activity<F>(label: &str, action: F) -> F::Output
where
    F: Future,
{
    let label = label.to_string();
    let indicator = AbortOnDrop(tokio::spawn(async move {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "{label}");
        let _ = stderr.flush();
        loop {
            tokio::time::sleep(ACTIVITY_TICK).await;
            let _ = write!(stderr, ".");
            let _ = stderr.flush();
        }
    }));

    let result = action.await;

    drop(indicator);
    let _ = writeln!(std::io::stderr());
    result
}

// ── Tests ─────────────────────────────────────────────────────────────────────
