use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dockgen_core::{Pipeline, TraversalBudget, WorkspaceCandidate, WorkspacePicker};

mod generator;
mod picker;

#[derive(Parser, Debug)]
#[command(name = "dockgen")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate container build configuration for an existing project")]
struct Args {
    /// Candidate workspace roots; defaults to the current directory
    #[arg(value_name = "DIR")]
    roots: Vec<PathBuf>,

    /// Maximum directory depth to scan
    #[arg(long, default_value_t = 32)]
    max_depth: usize,

    /// Maximum number of files to scan before stopping
    #[arg(long, default_value_t = 10_000)]
    max_files: usize,

    /// Descend into symlinked directories (off by default)
    #[arg(long)]
    follow_symlinks: bool,

    /// Files read concurrently per batch during the scan
    #[arg(long, default_value_t = 64)]
    chunk_size: usize,

    /// Skip the workspace prompt and take the first candidate
    #[arg(long)]
    yes: bool,

    /// Print the generation report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    setup_tracing();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args = Args::parse();

    let roots = if args.roots.is_empty() {
        vec![std::env::current_dir()?]
    } else {
        args.roots.clone()
    };
    let candidates: Vec<WorkspaceCandidate> = roots
        .iter()
        .map(|path| WorkspaceCandidate::from_path(path))
        .collect();

    let picker: Box<dyn WorkspacePicker> = if args.yes {
        Box::new(picker::FirstPicker)
    } else {
        Box::new(picker::StdinPicker)
    };

    let root = match dockgen_core::workspace::resolve(&candidates, picker.as_ref()).await {
        Ok(root) => root,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    };
    info!(root = %root.path.display(), "workspace selected");

    let budget = TraversalBudget {
        max_depth: args.max_depth,
        max_files: args.max_files,
        follow_symlinks: args.follow_symlinks,
    };
    let pipeline = Pipeline::new(budget, args.chunk_size);
    let generator = generator::BuiltinGenerator::new(&root.path)?;

    let report = pipeline.generate(&root, &generator).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for path in &report.written {
            println!("wrote {path}");
        }
        for path in &report.skipped {
            println!("skipped {path}");
        }
        if report.ignore_updated {
            println!("updated .dockerignore");
        }
        if report.written.is_empty() && report.skipped.is_empty() {
            println!("nothing to generate");
        }
    }
    Ok(())
}

fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}
