use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use util::execution_config::{ContainerLimits, ExecutionLimits};
use util::notebook::Notebook;

use crate::sandbox::{ExecutionMode, ExecutionRequest, Sandbox, SandboxError};

/// Exit status the driver uses for a cell error in strict mode.
const EXIT_CELL_FAULT: i32 = 2;
/// Exit status the driver uses when a single cell exceeds its timeout.
const EXIT_CELL_TIMEOUT: i32 = 3;

/// Mount point of the execution context inside the container.
const CONTAINER_WORKDIR: &str = "/work";

/// Reads a notebook on stdin, executes it with nbclient and writes the
/// executed notebook to stdout.
///
/// argv: timeout_secs kernel_name allow_errors(0|1) working_dir
const DRIVER: &str = r#"
import sys
import nbformat
from nbclient import NotebookClient
from nbclient.exceptions import CellExecutionError, CellTimeoutError

timeout, kernel, allow_errors, cwd = int(sys.argv[1]), sys.argv[2], sys.argv[3] == "1", sys.argv[4]
nb = nbformat.reads(sys.stdin.read(), as_version=4)
client = NotebookClient(
    nb,
    timeout=timeout,
    kernel_name=kernel,
    allow_errors=allow_errors,
    resources={"metadata": {"path": cwd}},
)
try:
    client.execute()
except CellTimeoutError as e:
    sys.stderr.write(str(e))
    sys.exit(3)
except CellExecutionError as e:
    sys.stderr.write(str(e))
    sys.exit(2)
nbformat.write(nb, sys.stdout)
"#;

/// Runs notebooks through a Jupyter kernel driven by a short-lived
/// interpreter process. With container limits set, the process runs under
/// `docker run` with networking disabled and the context bind-mounted at
/// `/work`.
#[derive(Debug, Clone)]
pub struct KernelSandbox {
    python: String,
    kernel_name: String,
    container: Option<ContainerLimits>,
}

impl KernelSandbox {
    pub fn new(python: impl Into<String>, kernel_name: impl Into<String>) -> Self {
        Self {
            python: python.into(),
            kernel_name: kernel_name.into(),
            container: None,
        }
    }

    pub fn from_limits(limits: &ExecutionLimits) -> Self {
        Self {
            python: limits.python.clone(),
            kernel_name: limits.kernel_name.clone(),
            container: limits.container.clone(),
        }
    }

    pub fn with_container(mut self, limits: ContainerLimits) -> Self {
        self.container = Some(limits);
        self
    }

    /// Program and arguments for one execution. `container_name` is only
    /// used when running under docker. `request.context_dir` is passed through
    /// as given; [`Sandbox::execute`] makes it absolute first.
    pub fn invocation(
        &self,
        request: &ExecutionRequest,
        container_name: &str,
    ) -> (String, Vec<String>) {
        let allow_errors = match request.mode {
            ExecutionMode::FaultTolerant => "1",
            ExecutionMode::FaultStrict => "0",
        };
        let timeout_secs = request.timeout.as_secs().max(1).to_string();

        match &self.container {
            None => {
                let args = vec![
                    "-c".to_string(),
                    DRIVER.to_string(),
                    timeout_secs,
                    self.kernel_name.clone(),
                    allow_errors.to_string(),
                    request.context_dir.display().to_string(),
                ];
                (self.python.clone(), args)
            }
            Some(limits) => {
                let args = vec![
                    "run".to_string(),
                    "--rm".to_string(),
                    "-i".to_string(),
                    format!("--name={container_name}"),
                    "--network=none".to_string(),
                    format!("--memory={}", limits.max_memory),
                    format!("--cpus={}", limits.max_cpus),
                    format!("--pids-limit={}", limits.max_processes),
                    "--security-opt=no-new-privileges".to_string(),
                    "--user=1000:1000".to_string(),
                    "--tmpfs=/tmp".to_string(),
                    "--env=HOME=/tmp".to_string(),
                    "-v".to_string(),
                    format!(
                        "{}:{CONTAINER_WORKDIR}{}",
                        request.context_dir.display(),
                        if limits.read_only_context { ":ro" } else { "" }
                    ),
                    format!("--workdir={CONTAINER_WORKDIR}"),
                    limits.image.clone(),
                    self.python.clone(),
                    "-c".to_string(),
                    DRIVER.to_string(),
                    timeout_secs,
                    self.kernel_name.clone(),
                    allow_errors.to_string(),
                    CONTAINER_WORKDIR.to_string(),
                ];
                ("docker".to_string(), args)
            }
        }
    }

    async fn remove_container(name: &str) {
        let result = Command::new("docker")
            .args(["rm", "-f", name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(e) = result {
            tracing::warn!(container = name, error = %e, "failed to remove timed-out container");
        }
    }
}

/// The last few lines of a driver's stderr, enough to show the failing cell.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(20);
    lines[start..].join("\n")
}

#[async_trait]
impl Sandbox for KernelSandbox {
    async fn execute(
        &self,
        notebook: &Notebook,
        request: &ExecutionRequest,
    ) -> Result<Notebook, SandboxError> {
        // Absolute, so the kernel and a docker bind mount see the same directory.
        let context_dir = tokio::fs::canonicalize(&request.context_dir)
            .await
            .map_err(|e| {
                SandboxError::Kernel(format!(
                    "context directory {} is not usable: {e}",
                    request.context_dir.display()
                ))
            })?;
        let request = &ExecutionRequest {
            context_dir,
            ..request.clone()
        };

        let container_name = format!("grader-{}", uuid::Uuid::new_v4());
        let (program, args) = self.invocation(request, &container_name);

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if self.container.is_none() {
            command.current_dir(&request.context_dir);
        }

        let input = notebook
            .to_json_pretty()
            .map_err(|e| SandboxError::Kernel(format!("could not serialise notebook: {e}")))?;

        tracing::debug!(
            label = %request.label,
            program = %program,
            mode = ?request.mode,
            timeout = ?request.timeout,
            "starting kernel"
        );

        let mut child = command
            .spawn()
            .map_err(|e| SandboxError::Kernel(format!("failed to start {program}: {e}")))?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SandboxError::Kernel("kernel stdin unavailable".into()))?;

        let feed = async move {
            let result = stdin.write_all(input.as_bytes()).await;
            drop(stdin);
            result
        };

        let run = async move { tokio::join!(feed, child.wait_with_output()) };

        let (fed, output) = match timeout(request.timeout, run).await {
            Ok(pair) => pair,
            Err(_) => {
                tracing::warn!(label = %request.label, timeout = ?request.timeout, "execution timed out");
                if self.container.is_some() {
                    Self::remove_container(&container_name).await;
                }
                return Err(SandboxError::Timeout(request.timeout));
            }
        };

        // A driver that exits early closes its stdin; the exit status says why.
        if let Err(e) = fed {
            tracing::debug!(label = %request.label, error = %e, "kernel did not consume the whole notebook");
        }
        let output = output?;

        match output.status.code() {
            Some(0) => Ok(Notebook::from_slice(&output.stdout)?),
            Some(EXIT_CELL_FAULT) => Err(SandboxError::CellFault(stderr_tail(&output.stderr))),
            Some(EXIT_CELL_TIMEOUT) => Err(SandboxError::Timeout(request.timeout)),
            code => Err(SandboxError::Kernel(format!(
                "exit code {}: {}",
                code.map(|c| c.to_string()).unwrap_or_else(|| "none".into()),
                stderr_tail(&output.stderr)
            ))),
        }
    }
}
