//! Where background post-initialization runs, and where its failures go.
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::kernel::constants;
use crate::plugin_system::error::{PluginSystemError, Result};

/// One batch of work handed to an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs a post-initialization batch off the calling thread.
pub trait PostInitExecutor: Send + Sync {
    fn spawn(&self, job: Job) -> Result<()>;
}

/// Runs every batch on its own dedicated, named thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadExecutor;

impl PostInitExecutor for ThreadExecutor {
    fn spawn(&self, job: Job) -> Result<()> {
        std::thread::Builder::new()
            .name(constants::POST_INIT_THREAD_NAME.to_string())
            .spawn(job)
            .map(|_| ())
            .map_err(|e| PluginSystemError::BackgroundDispatch {
                message: format!("could not start worker thread: {}", e),
            })
    }
}

/// Runs batches on the blocking pool of a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Executor bound to the runtime the caller is running in, if any.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl PostInitExecutor for TokioExecutor {
    fn spawn(&self, job: Job) -> Result<()> {
        // The JoinHandle is dropped on purpose; completion is tracked by PostInitHandle.
        let _ = self.handle.spawn_blocking(job);
        Ok(())
    }
}

/// Receives failures that happen after `configure` already returned.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: PluginSystemError);
}

/// Default sink: logs the failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, error: PluginSystemError) {
        log::error!("Unhandled background plugin failure: {}", error);
    }
}

impl<F> ErrorSink for F
where
    F: Fn(PluginSystemError) + Send + Sync,
{
    fn report(&self, error: PluginSystemError) {
        self(error)
    }
}

/// Completion signal of a background post-initialization batch.
#[derive(Debug)]
pub struct PostInitHandle {
    done: oneshot::Receiver<()>,
}

impl PostInitHandle {
    pub(crate) fn channel() -> (oneshot::Sender<()>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { done: rx })
    }

    /// Blocks until the batch is over, whether it succeeded, failed or panicked.
    ///
    /// Must not be called from inside an async context; use [`finished`](Self::finished) there.
    pub fn wait(self) {
        let _ = self.done.blocking_recv();
    }

    pub async fn finished(self) {
        let _ = self.done.await;
    }
}
