use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::{collections::BTreeSet, fs, path::Path, path::PathBuf};

#[derive(Parser)]
#[command(name = "xtask", about = "meeting-features workspace tasks")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Validate a meeting's database.json against schemas/transcript_store.schema.json
    ValidateStore { file: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::ValidateStore { file } => validate_store(&file),
    }
}

fn validate_store(path: &Path) -> Result<()> {
    let schema_text = include_str!("../../schemas/transcript_store.schema.json");
    let schema: serde_json::Value = serde_json::from_str(schema_text)?;
    let compiled = jsonschema::validator_for(&schema)?;
    let data_text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let data: serde_json::Value = serde_json::from_str(&data_text).with_context(|| "parse json")?;
    let errors: Vec<_> = compiled.iter_errors(&data).collect();
    if !errors.is_empty() {
        eprintln!("Invalid: {}", path.display());
        for e in errors {
            eprintln!("- {}", e);
        }
        std::process::exit(1);
    }

    // titles are the lookup key, so they must be unique
    let mut seen = BTreeSet::new();
    for rec in data.as_array().into_iter().flatten() {
        let title = rec["title"].as_str().unwrap_or_default();
        if !seen.insert(title) {
            bail!("duplicate transcript title '{title}' in {}", path.display());
        }
    }
    println!("OK: {} ({} transcripts)", path.display(), seen.len());
    Ok(())
}
