//! Notebook execution.
//!
//! Execution is a capability: anything implementing [`Sandbox`] can run an
//! assembled notebook and hand back the executed copy. [`KernelSandbox`] is
//! the production implementation; it drives a Jupyter kernel through a
//! short-lived interpreter process, optionally inside a locked-down container.

pub mod kernel;
pub mod sandbox;
pub mod test_helpers;

pub use kernel::KernelSandbox;
pub use sandbox::{ExecutionMode, ExecutionRequest, Sandbox, SandboxError};
