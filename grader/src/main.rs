use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use code_runner::{ExecutionMode, ExecutionRequest, KernelSandbox, Sandbox};
use marker::batch::{BatchRunner, clean_submissions};
use marker::injector::TestBattery;
use marker::maintenance::reseed_grade_ids;
use marker::reference::{CleanReference, ReferenceBundle, run_reference};
use marker::utilities::file_loader::{load_notebook, save_notebook};
use marker::{GradingJob, filters};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_appender::rolling;
use util::config::AppConfig;
use util::execution_config::ExecutionConfig;
use util::notebook::Notebook;
use util::paths::{ScratchDirs, output_root};
use util::score_table::ScoreTable;

#[derive(Parser, Debug)]
#[command(version, about = "Grade notebook submissions against a reference solution")]
struct Cli {
    /// Grading configuration (JSON). Built-in defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory for filtered and assembled notebooks and captured answers
    #[arg(long, global = true)]
    scratch_dir: Option<String>,
    /// Also log to stdout
    #[arg(long, global = true)]
    log_stdout: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute the reference solution and extract its expected outputs
    Reference {
        /// Reference solution notebook
        #[arg(long)]
        solution: PathBuf,
        /// Test-definition notebook; its first cell is the preamble
        #[arg(long)]
        tests: PathBuf,
        /// Where to write the clean reference. Defaults to the scratch directory
        #[arg(long)]
        out: Option<PathBuf>,
        /// Working directory for the kernel. Defaults to the solution's directory
        #[arg(long)]
        context_dir: Option<PathBuf>,
    },
    /// Grade every notebook under a submission directory
    Grade {
        submissions: PathBuf,
        #[arg(long)]
        solution: PathBuf,
        #[arg(long)]
        tests: PathBuf,
        /// Previously extracted clean reference. The reference is executed when omitted
        #[arg(long)]
        clean_reference: Option<PathBuf>,
        /// Score table (question id to points). Points in question metadata are used when omitted
        #[arg(long)]
        scores: Option<PathBuf>,
        /// Directory for grades.json and errors.txt. Defaults to GRADER_OUTPUT_ROOT
        #[arg(long)]
        output: Option<PathBuf>,
        /// Run every submission in this directory instead of next to its file
        #[arg(long)]
        context_dir: Option<PathBuf>,
    },
    /// Only filter submissions, writing the cleaned notebooks to the scratch directory
    Clean {
        submissions: PathBuf,
        #[arg(long)]
        solution: PathBuf,
    },
    /// Give every nbgrader grade id under a directory a fresh random value
    ReseedIds { dir: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(dir) = &cli.scratch_dir {
        AppConfig::set_scratch_root(dir.clone());
    }
    if cli.log_stdout {
        AppConfig::set_log_to_stdout(true);
    }
    let app = AppConfig::global().clone();
    let _log_guard = init_logging(&app.log_file, &app.log_level, app.log_to_stdout);

    let config = match &cli.config {
        Some(path) => ExecutionConfig::load(path).map_err(anyhow::Error::msg)?,
        None => ExecutionConfig::default_config(),
    };
    info!(project = %app.project_name, env = %app.env, "starting");

    match cli.command {
        Command::Reference {
            solution,
            tests,
            out,
            context_dir,
        } => {
            let reference = load_notebook(&solution, config.execution.max_notebook_bytes)?;
            let battery = TestBattery::load(&tests, config.execution.max_notebook_bytes)?;
            let sandbox = KernelSandbox::from_limits(&config.execution);
            let context_dir = context_dir.unwrap_or_else(|| parent_or_cwd(&solution));

            let clean = extract_reference(&reference, &battery, &config, &sandbox, &context_dir).await?;
            let out = out.unwrap_or_else(|| ScratchDirs::from_config().clean_reference_path());
            clean.save(&out)?;
            println!(
                "Extracted {} question(s) to {}",
                clean.len(),
                out.display()
            );
        }
        Command::Grade {
            submissions,
            solution,
            tests,
            clean_reference,
            scores,
            output,
            context_dir,
        } => {
            let reference = load_notebook(&solution, config.execution.max_notebook_bytes)?;
            let battery = TestBattery::load(&tests, config.execution.max_notebook_bytes)?;
            let sandbox = KernelSandbox::from_limits(&config.execution);

            let clean = match clean_reference {
                Some(path) => CleanReference::load(&path)?,
                None => {
                    let ctx = parent_or_cwd(&solution);
                    let clean = extract_reference(&reference, &battery, &config, &sandbox, &ctx).await?;
                    clean.save(&ScratchDirs::from_config().clean_reference_path())?;
                    clean
                }
            };
            let scores = scores
                .map(|p| ScoreTable::load(&p).map_err(anyhow::Error::msg))
                .transpose()?;

            let bundle = ReferenceBundle::new(reference, clean, scores)?;
            let job = GradingJob::new(&bundle, &battery, config)?;

            let mut runner = BatchRunner::new(&job, &sandbox, ScratchDirs::from_config());
            if let Some(dir) = context_dir {
                runner = runner.with_context_dir(dir);
            }
            let report = runner
                .run(&submissions)
                .await
                .with_context(|| format!("grading {}", submissions.display()))?;

            let output = output.unwrap_or_else(output_root);
            report.write(&output)?;
            println!(
                "Graded {} submission(s), {} error(s). Report written to {}",
                report.len(),
                report.errors.len(),
                output.display()
            );
        }
        Command::Clean {
            submissions,
            solution,
        } => {
            let reference = load_notebook(&solution, config.execution.max_notebook_bytes)?;
            let filter = filters::from_options(&config.marking);
            let scratch = ScratchDirs::from_config();

            let summary = clean_submissions(
                &submissions,
                &reference,
                filter.as_ref(),
                &scratch,
                config.execution.max_notebook_bytes,
            )?;
            for error in &summary.errors {
                eprintln!("{error}");
            }
            println!(
                "Cleaned {} submission(s) into {}",
                summary.cleaned.len(),
                scratch.filtered_dir().display()
            );
        }
        Command::ReseedIds { dir } => {
            let count = reseed_grade_ids(
                &dir,
                &mut rand::thread_rng(),
                config.execution.max_notebook_bytes,
            )?;
            println!("Reseeded grade ids in {count} notebook(s)");
        }
    }

    Ok(())
}

/// Run the reference fault-strict, keep the executed copy in scratch and
/// return its clean reference.
async fn extract_reference(
    reference: &Notebook,
    battery: &TestBattery,
    config: &ExecutionConfig,
    sandbox: &dyn Sandbox,
    context_dir: &Path,
) -> Result<CleanReference> {
    let filter = filters::from_options(&config.marking);
    let request = ExecutionRequest::new(
        Duration::from_secs(config.execution.timeout_secs),
        ExecutionMode::FaultStrict,
        context_dir,
    )
    .with_label("reference");

    let executed = run_reference(reference, battery, filter.as_ref(), sandbox, &request)
        .await
        .context("reference solution failed to run")?;
    save_notebook(&executed, &ScratchDirs::from_config().reference_executed_path())?;

    let clean = CleanReference::extract(&executed)?;
    info!(questions = clean.len(), "extracted clean reference");
    Ok(clean)
}

fn parent_or_cwd(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn init_logging(
    log_file: &str,
    log_level: &str,
    log_to_stdout: bool,
) -> tracing_appender::non_blocking::WorkerGuard {
    use std::fs;
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    fs::create_dir_all("logs").ok();

    let file_appender = rolling::daily("logs", log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(true)
        .with_thread_ids(true);

    let env_filter =
        EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    if log_to_stdout {
        registry.with(stdout_layer).init();
    } else {
        registry.init();
    }

    guard
}
