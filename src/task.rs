//! Cancellable background build tasks
//!
//! Long-running work (consistency checks, graph construction) polls a
//! [`ProgressMonitor`] between operations. A build started with
//! [`BuildTask::spawn`] runs on its own thread and hands back a handle the
//! caller can cancel, poll, block on, or await.
//!
//! # Cancellation
//!
//! Cancellation is cooperative. Work checks [`ProgressMonitor::is_cancelled`]
//! between steps and, when set, drops every partial result and reports
//! [`TaskOutcome::Cancelled`].

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;

use crate::error::BuildError;

/// Marker returned by work that noticed a cancellation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Progress and cancellation hooks for long-running work
pub trait ProgressMonitor: Send + Sync {
    fn begin_task(&self, name: &str, total: usize);
    fn report_progress(&self, steps: usize);
    fn is_cancelled(&self) -> bool;
    fn done(&self);

    /// `Err(Cancelled)` when cancellation was requested
    fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Monitor that reports nothing and never cancels
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMonitor;

impl ProgressMonitor for NullMonitor {
    fn begin_task(&self, _name: &str, _total: usize) {}
    fn report_progress(&self, _steps: usize) {}
    fn is_cancelled(&self) -> bool {
        false
    }
    fn done(&self) {}
}

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token observing an existing flag (e.g. one set by a signal handler)
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        CancellationToken { flag }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

impl ProgressMonitor for CancellationToken {
    fn begin_task(&self, _name: &str, _total: usize) {}
    fn report_progress(&self, _steps: usize) {}
    fn is_cancelled(&self) -> bool {
        CancellationToken::is_cancelled(self)
    }
    fn done(&self) {}
}

/// Terminal progress bar that honours a cancellation token
pub struct ProgressBarMonitor {
    bar: ProgressBar,
    token: CancellationToken,
}

impl ProgressBarMonitor {
    pub fn new(token: CancellationToken) -> Self {
        ProgressBarMonitor {
            bar: ProgressBar::new(0),
            token,
        }
    }

    /// Monitor that draws nothing, for non-interactive output
    pub fn hidden(token: CancellationToken) -> Self {
        ProgressBarMonitor {
            bar: ProgressBar::hidden(),
            token,
        }
    }
}

impl ProgressMonitor for ProgressBarMonitor {
    fn begin_task(&self, name: &str, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        if let Ok(style) =
            ProgressStyle::with_template("{msg:>12} [{bar:40}] {pos}/{len} ({elapsed})")
        {
            self.bar.set_style(style.progress_chars("=> "));
        }
        self.bar.set_message(name.to_string());
    }

    fn report_progress(&self, steps: usize) {
        self.bar.inc(steps as u64);
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    fn done(&self) {
        self.bar.finish_and_clear();
    }
}

/// Monitor that records every call, for asserting progress reporting
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct CountingMonitor {
    pub begun: std::sync::atomic::AtomicUsize,
    pub total: std::sync::atomic::AtomicUsize,
    pub progress: std::sync::atomic::AtomicUsize,
    pub finished: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl ProgressMonitor for CountingMonitor {
    fn begin_task(&self, _name: &str, total: usize) {
        self.begun.fetch_add(1, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }
    fn report_progress(&self, steps: usize) {
        self.progress.fetch_add(steps, Ordering::SeqCst);
    }
    fn is_cancelled(&self) -> bool {
        false
    }
    fn done(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

/// How a background task ended
#[derive(Debug)]
pub enum TaskOutcome<T> {
    Completed(T),
    Cancelled,
    Failed(BuildError),
}

impl<T> TaskOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            TaskOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }

    /// Convert the result of cancellable, fallible work
    pub fn from_result(result: Result<Result<T, Cancelled>, BuildError>) -> Self {
        match result {
            Ok(Ok(value)) => TaskOutcome::Completed(value),
            Ok(Err(Cancelled)) => TaskOutcome::Cancelled,
            Err(err) => TaskOutcome::Failed(err),
        }
    }
}

/// Handle to work running on a dedicated thread
///
/// Dropping the handle does not stop the work; call [`BuildTask::cancel`].
pub struct BuildTask<T> {
    id: uuid::Uuid,
    token: CancellationToken,
    receiver: oneshot::Receiver<TaskOutcome<T>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl<T: Send + 'static> BuildTask<T> {
    /// Run `work` on a new thread with a fresh cancellation token
    pub fn spawn<F>(name: &str, work: F) -> Self
    where
        F: FnOnce(&CancellationToken) -> TaskOutcome<T> + Send + 'static,
    {
        Self::spawn_with_token(name, CancellationToken::new(), work)
    }

    /// Run `work` on a new thread observing `token`
    pub fn spawn_with_token<F>(name: &str, token: CancellationToken, work: F) -> Self
    where
        F: FnOnce(&CancellationToken) -> TaskOutcome<T> + Send + 'static,
    {
        let id = uuid::Uuid::new_v4();
        let (sender, receiver) = oneshot::channel();
        let worker_token = token.clone();
        let task_name = name.to_string();

        let handle = thread::Builder::new()
            .name(format!("edithist-{}", task_name))
            .spawn(move || {
                tracing::debug!(task = %task_name, %id, "build task started");
                let outcome = work(&worker_token);
                match &outcome {
                    TaskOutcome::Completed(_) => {
                        tracing::debug!(task = %task_name, %id, "build task completed")
                    }
                    TaskOutcome::Cancelled => {
                        tracing::info!(task = %task_name, %id, "build task cancelled")
                    }
                    TaskOutcome::Failed(err) => {
                        tracing::warn!(task = %task_name, %id, error = %err, "build task failed")
                    }
                }
                // The receiver may already be gone; nobody is waiting then.
                let _ = sender.send(outcome);
            })
            .ok();

        BuildTask {
            id,
            token,
            receiver,
            handle,
        }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    /// Request cooperative cancellation
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Block until the task ends
    ///
    /// Must not be called from inside an async runtime; use [`BuildTask::join`] there.
    pub fn wait(mut self) -> TaskOutcome<T> {
        let outcome = self.receiver.blocking_recv();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        outcome.unwrap_or(TaskOutcome::Failed(BuildError::TaskLost))
    }

    /// Await the task's end
    pub async fn join(mut self) -> TaskOutcome<T> {
        let receiver = self.receiver;
        self.handle.take();
        receiver
            .await
            .unwrap_or(TaskOutcome::Failed(BuildError::TaskLost))
    }
}
