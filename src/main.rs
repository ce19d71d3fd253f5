// meeting-features/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{fs, path::{Path, PathBuf}, process::ExitCode, sync::Arc};
use tracing::info;

use meeting_features::{
    block::segment,
    config::{Config, ConfigManager},
    inference::GeminiClient,
    outline,
    pipeline::{run_pipeline, PipelineContext, Stage, StageStatus},
};

#[derive(Parser)]
#[command(name = "meeting-features", version, about = "Turn meeting transcripts into feature specs")]
struct Args {
    /// Parent directory for per-meeting folders (overrides config)
    #[arg(long, global = true)]
    output_root: Option<PathBuf>,
    /// Deepest indent that still opens a new sub-feature block (overrides config)
    #[arg(long, global = true)]
    max_indent: Option<usize>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline for one meeting; all stages unless `--stage` is given
    Run {
        meeting: String,
        file: String,
        /// Stage to run, repeatable; runs in the order given
        #[arg(long = "stage")]
        stages: Vec<Stage>,
    },
    /// Run a single stage
    Stage { stage: Stage, meeting: String, file: String },
    /// Parse a sub_features.txt and print its blocks without calling a model
    Outline { path: PathBuf },
    /// Print the merged configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let cwd = std::env::current_dir().context("current directory")?;
    let cm = ConfigManager::load(&cwd)?;
    let mut patch = Config::default();
    patch.pipeline.output_root = args.output_root;
    patch.pipeline.top_level_max_indent = args.max_indent;
    cm.apply_runtime_overlay(patch);
    let config = cm.get();

    match args.command {
        Command::Run { meeting, file, stages } => {
            let stages = if stages.is_empty() { Stage::ALL.to_vec() } else { stages };
            run(config, meeting, file, &stages).await
        }
        Command::Stage { stage, meeting, file } => run(config, meeting, file, &[stage]).await,
        Command::Outline { path } => {
            print_outline(&path, config.top_level_max_indent())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(config: Config, meeting: String, file: String, stages: &[Stage]) -> Result<ExitCode> {
    let inference = Arc::new(GeminiClient::new(config.clone()));
    let ctx = PipelineContext::new(meeting, file, config, inference);
    info!(meeting = %ctx.meeting_name, dir = %ctx.meeting_dir.display(), "running pipeline");

    let results = run_pipeline(&ctx, stages).await;
    for r in &results {
        println!("{r}");
    }
    let failed = results.iter().any(|r| matches!(r.status, StageStatus::Failed | StageStatus::Partial));
    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn print_outline(path: &Path, max_indent: usize) -> Result<()> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let parsed = outline::parse(&text);
    for node in parsed.iter() {
        println!("{}) {}", node.index, node.title);
        for block in segment(&node.children, max_indent) {
            println!("   [{}] {} ({} lines)", meeting_features::slugify(&block.title), block.title, block.line_count);
        }
    }
    for c in parsed.slug_collisions() {
        println!("collision: {} <- {:?}", c.slug, c.titles);
    }
    if parsed.orphaned_lines > 0 {
        println!("orphaned lines: {}", parsed.orphaned_lines);
    }
    Ok(())
}
