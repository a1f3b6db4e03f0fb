//! An in-process sandbox for tests.
//!
//! [`ScriptedSandbox`] never starts a kernel. It "executes" each code cell by
//! reading directives from the cell source:
//!
//! - `#> text` prints `text` (a stream output ending in a newline)
//! - `#=> text` produces `text` as an execute result
//! - `#! raise Name` raises `Name`; later directives in the cell are skipped
//! - `#! hang` makes the whole document time out
//! - `#! crash` kills the kernel

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;
use util::notebook::{Cell, Notebook, Output};

use crate::sandbox::{ExecutionMode, ExecutionRequest, Sandbox, SandboxError};

/// One call seen by a [`ScriptedSandbox`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRun {
    pub label: String,
    pub mode: ExecutionMode,
    pub cell_count: usize,
    pub context_dir: PathBuf,
}

#[derive(Debug, Default)]
pub struct ScriptedSandbox {
    runs: Mutex<Vec<RecordedRun>>,
}

impl ScriptedSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> Vec<RecordedRun> {
        self.runs.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Sandbox for ScriptedSandbox {
    async fn execute(
        &self,
        notebook: &Notebook,
        request: &ExecutionRequest,
    ) -> Result<Notebook, SandboxError> {
        if let Ok(mut runs) = self.runs.lock() {
            runs.push(RecordedRun {
                label: request.label.clone(),
                mode: request.mode,
                cell_count: notebook.cells.len(),
                context_dir: request.context_dir.clone(),
            });
        }

        let mut executed = notebook.clone();
        let mut counter = 0;

        for (idx, cell) in executed.cells.iter_mut().enumerate() {
            let Cell::Code(code) = cell else { continue };
            counter += 1;
            code.execution_count = Some(counter);
            code.outputs.clear();

            for line in code.source.lines() {
                let line = line.trim_start();
                if let Some(text) = line.strip_prefix("#=> ") {
                    code.outputs.push(Output::execute_result(text));
                } else if let Some(text) = line.strip_prefix("#> ") {
                    code.outputs.push(Output::stream(format!("{text}\n")));
                } else if line == "#! hang" {
                    return Err(SandboxError::Timeout(request.timeout));
                } else if line == "#! crash" {
                    return Err(SandboxError::Kernel("kernel died".into()));
                } else if let Some(name) = line.strip_prefix("#! raise ") {
                    match request.mode {
                        ExecutionMode::FaultStrict => {
                            return Err(SandboxError::CellFault(format!("{name} in cell {idx}")));
                        }
                        ExecutionMode::FaultTolerant => {
                            code.outputs.push(Output::error(name, "raised by test script"));
                            break;
                        }
                    }
                }
            }
        }

        Ok(executed)
    }
}
