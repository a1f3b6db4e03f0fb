use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// How a student's outputs are compared against the expected reference text.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MarkingScheme {
    /// Expected text must appear inside one of the student's outputs.
    Substring,
    /// All textual outputs joined must equal the expected text (trailing whitespace ignored).
    Exact,
}

/// How submission cells are paired with reference cells.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CellMatching {
    /// Pair cells by index against the reference template.
    Positional,
    /// Pair cells by the question/role identifier carried in cell metadata.
    Tagged,
}

/// Resource limits applied when the kernel runs inside a container.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ContainerLimits {
    pub image: String,

    #[serde(default = "default_max_memory")]
    pub max_memory: u64,

    #[serde(default = "default_max_cpus")]
    pub max_cpus: u32,

    #[serde(default = "default_max_processes")]
    pub max_processes: u32,

    /// Mount the execution context read-only. Cells that write relative
    /// files then fail with a permission error.
    #[serde(default)]
    pub read_only_context: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionLimits {
    /// Wall-clock bound for executing one whole notebook.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_kernel_name")]
    pub kernel_name: String,

    /// Interpreter used to drive the kernel client.
    #[serde(default = "default_python")]
    pub python: String,

    /// Notebooks larger than this are rejected without being parsed.
    #[serde(default = "default_max_notebook_bytes")]
    pub max_notebook_bytes: u64,

    /// When set, the kernel runs inside this container image instead of on the host.
    #[serde(default)]
    pub container: Option<ContainerLimits>,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            kernel_name: default_kernel_name(),
            python: default_python(),
            max_notebook_bytes: default_max_notebook_bytes(),
            container: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarkingOptions {
    #[serde(default = "default_marking_scheme")]
    pub marking_scheme: MarkingScheme,

    #[serde(default = "default_cell_matching")]
    pub cell_matching: CellMatching,

    /// Points every submission starts with before any question is scored.
    #[serde(default)]
    pub baseline_points: f64,

    /// A reference code cell containing any of these substrings marks an answer cell.
    #[serde(default = "default_keep_markers")]
    pub keep_markers: Vec<String>,

    /// Overrides the number of answer cells a filtered submission must have.
    /// Derived from the reference when absent.
    #[serde(default)]
    pub expected_answer_cells: Option<usize>,
}

impl Default for MarkingOptions {
    fn default() -> Self {
        Self {
            marking_scheme: default_marking_scheme(),
            cell_matching: default_cell_matching(),
            baseline_points: 0.0,
            keep_markers: default_keep_markers(),
            expected_answer_cells: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub execution: ExecutionLimits,

    #[serde(default)]
    pub marking: MarkingOptions,
}

impl ExecutionConfig {
    pub fn default_config() -> Self {
        ExecutionConfig {
            execution: ExecutionLimits::default(),
            marking: MarkingOptions::default(),
        }
    }

    /// Load a grading configuration file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, String> {
        let file_contents = fs::read_to_string(path)
            .map_err(|_| format!("Failed to read config file at {:?}", path))?;

        let cfg: ExecutionConfig = serde_json::from_str(&file_contents)
            .map_err(|e| format!("Invalid config JSON format in {:?}: {e}", path))?;

        tracing::debug!(
            path = %path.display(),
            scheme = ?cfg.marking.marking_scheme,
            matching = ?cfg.marking.cell_matching,
            "loaded grading config"
        );
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .map_err(|e| format!("Failed to create config directory: {e:?}"))?;
            }
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config to JSON: {e}"))?;

        fs::write(path, json).map_err(|e| format!("Failed to write config file to disk: {e:?}"))?;

        Ok(())
    }
}

//Default Functions

fn default_timeout_secs() -> u64 {
    600
}

fn default_kernel_name() -> String {
    "python3".to_string()
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_max_notebook_bytes() -> u64 {
    20 * 1024 * 1024
}

fn default_max_memory() -> u64 {
    2_147_483_648
}

fn default_max_cpus() -> u32 {
    1
}

fn default_max_processes() -> u32 {
    256
}

fn default_marking_scheme() -> MarkingScheme {
    MarkingScheme::Substring
}

fn default_cell_matching() -> CellMatching {
    CellMatching::Positional
}

fn default_keep_markers() -> Vec<String> {
    ["points", "assert", "import", "don't change", "definition"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
