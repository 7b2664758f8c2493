use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use scout_agents::{Pipeline, RunReport};
use scout_core::{
    Config, ConfigLoader, ConfigOverrides, EventCollector, OpenAiChat, RunObserver, Task,
    TelemetryOptions, ToolBox, TraceCollector, TracingObserver, init_telemetry, persist_trace,
};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "scout",
    version,
    about = "Answer a question by researching it with web and file tools"
)]
struct Cli {
    /// Question to answer.
    #[arg(long)]
    task: String,

    /// Log tool calls and agent decisions to stderr.
    #[arg(long, short)]
    verbose: bool,

    /// Local file associated with the task.
    #[arg(long)]
    file_path: Option<PathBuf>,

    /// Also write the final answer to this file.
    #[arg(long)]
    answer_file: Option<PathBuf>,

    /// Directory to store the run trace as `{run_id}.json`.
    #[arg(long)]
    trace_dir: Option<PathBuf>,

    /// Maximum number of tool calls during research.
    #[arg(long)]
    max_tool_calls: Option<usize>,

    /// Model used by both agents (overrides config and OPENAI_MODEL).
    #[arg(long)]
    model: Option<String>,

    /// Configuration file (defaults to SCOUT_CONFIG, then ./scout.toml).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    dotenvy::dotenv().ok();

    let overrides = ConfigOverrides {
        model: cli.model.clone(),
        max_tool_calls: cli.max_tool_calls,
        verbose: cli.verbose,
    };
    let config = ConfigLoader::load(cli.config.clone(), &overrides)?;
    init_telemetry(TelemetryOptions::from(&config.logging))?;

    let question = cli.task.trim();
    if question.is_empty() {
        bail!("--task must not be empty");
    }
    let mut task = Task::new(question);
    if let Some(path) = &cli.file_path {
        if !path.exists() {
            warn!(path = %path.display(), "associated file does not exist");
        }
        task = task.with_attachment(path.clone());
    }

    let rt = Runtime::new()?;
    let report = rt.block_on(execute(&config, task, cli.trace_dir.as_deref()))?;

    println!("{}", report.answer);

    if let Some(path) = &cli.answer_file {
        match std::fs::write(path, format!("{}\n", report.answer)) {
            Ok(()) => info!(path = %path.display(), "answer written"),
            Err(err) => warn!(path = %path.display(), error = %err, "failed to write answer file"),
        }
    }

    Ok(())
}

async fn execute(
    config: &Config,
    task: Task,
    trace_dir: Option<&std::path::Path>,
) -> Result<RunReport> {
    let research_model = Arc::new(
        OpenAiChat::for_research(&config.llm).context("failed to build research model client")?,
    );
    let answer_model = Arc::new(
        OpenAiChat::for_answer(&config.llm).context("failed to build answer model client")?,
    );
    let tools = ToolBox::from_config(config)?;

    let (collector, mut receiver) = EventCollector::new();
    let observers: Vec<Arc<dyn RunObserver>> = vec![
        Arc::new(TracingObserver::new(config.logging.verbose)),
        Arc::new(collector),
    ];
    let pipeline = Pipeline::from_config(
        config,
        research_model,
        answer_model,
        tools,
        Arc::new(scout_core::CompositeObserver::new(observers)),
    );

    let run_id = Uuid::new_v4();
    info!(
        run_id = %run_id,
        model = %config.llm.model,
        max_tool_calls = config.research.max_tool_calls,
        "starting scout run"
    );
    let outcome = pipeline.run_with_id(task, run_id).await;

    let mut trace = TraceCollector::new();
    trace.drain(&mut receiver);
    debug!("{}", trace.summary().render_markdown());
    if let Some(dir) = trace_dir {
        match persist_trace(dir, &run_id.to_string(), trace.events()) {
            Ok(path) => info!(path = %path.display(), "trace persisted"),
            Err(err) => warn!(error = %err, "failed to persist trace"),
        }
    }

    Ok(outcome?)
}
