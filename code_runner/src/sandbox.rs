use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use util::notebook::{Notebook, NotebookError};

/// How a failing cell affects the rest of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Record the error as the cell's output and keep going. Used for grading.
    FaultTolerant,
    /// Abort the document on the first failing cell. Used for reference runs.
    FaultStrict,
}

#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Wall-clock bound for the whole document.
    pub timeout: Duration,
    pub mode: ExecutionMode,
    /// Working directory for the kernel, so relative paths in cells resolve.
    pub context_dir: PathBuf,
    /// Used in log lines only.
    pub label: String,
}

impl ExecutionRequest {
    pub fn new(timeout: Duration, mode: ExecutionMode, context_dir: impl Into<PathBuf>) -> Self {
        Self {
            timeout,
            mode,
            context_dir: context_dir.into(),
            label: String::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("execution timed out after {0:?}")]
    Timeout(Duration),

    /// A cell raised while running in fault-strict mode.
    #[error("cell execution failed: {0}")]
    CellFault(String),

    /// The kernel or its driver could not be started or died.
    #[error("kernel failure: {0}")]
    Kernel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The sandbox answered with something that is not a notebook.
    #[error("sandbox returned an invalid notebook: {0}")]
    InvalidOutput(#[from] NotebookError),
}

/// Runs every code cell of a notebook and returns the executed copy.
///
/// Implementations never mutate the input; the returned notebook is a new
/// document carrying the captured outputs.
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn execute(
        &self,
        notebook: &Notebook,
        request: &ExecutionRequest,
    ) -> Result<Notebook, SandboxError>;
}
