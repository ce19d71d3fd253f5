// meeting-features/src/detail.rs

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::{
    block::FeatureBlock,
    config::ModelRole,
    fsutil::write_atomic,
    inference::{FeatureDetails, Inference, infer_structured},
    prompts,
    slug::slugify,
};

/// What happened to one block on this run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockOutcome {
    /// Output already existed; the model was not called.
    Skipped(PathBuf),
    Written(PathBuf),
    Failed { block_title: String, error: String },
}

impl BlockOutcome {
    pub fn is_written(&self) -> bool { matches!(self, Self::Written(_)) }
    pub fn is_skipped(&self) -> bool { matches!(self, Self::Skipped(_)) }
    pub fn is_failed(&self) -> bool { matches!(self, Self::Failed { .. }) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    pub fn tally(outcomes: &[BlockOutcome]) -> Self {
        let mut c = Self::default();
        for o in outcomes {
            match o {
                BlockOutcome::Written(_) => c.written += 1,
                BlockOutcome::Skipped(_) => c.skipped += 1,
                BlockOutcome::Failed { .. } => c.failed += 1,
            }
        }
        c
    }

    pub fn add(&mut self, other: Self) {
        self.written += other.written;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// `<main_folder>/<slug(title)>.txt`
pub fn detail_path(main_folder: &Path, title: &str) -> PathBuf {
    main_folder.join(format!("{}.txt", slugify(title)))
}

pub fn render_block_detail(main_title: &str, block: &FeatureBlock, details: &str) -> String {
    let rule = "=".repeat(20 + block.title.chars().count());
    format!("Main Feature: {main_title}\nFeature Block:\n{}\n{rule}\n\n{details}", block.body)
}

/// Extract details for each block of one main feature, skipping blocks whose file exists.
///
/// Blocks run one at a time, in order. A failed prompt or write is recorded and the
/// next block still runs. Re-running after a crash only calls the model for blocks
/// that have no file yet.
pub async fn process_blocks(
    main_title: &str,
    main_context: &str,
    blocks: &[FeatureBlock],
    main_folder: &Path,
    inference: &dyn Inference,
) -> Vec<BlockOutcome> {
    let mut outcomes = Vec::with_capacity(blocks.len());
    for block in blocks {
        let path = detail_path(main_folder, &block.title);
        if path.exists() {
            debug!(block = %block.title, path = %path.display(), "detail exists; skipping");
            outcomes.push(BlockOutcome::Skipped(path));
            continue;
        }
        let outcome = match write_block(main_title, main_context, block, &path, inference).await {
            Ok(()) => {
                info!(block = %block.title, path = %path.display(), "saved block details");
                BlockOutcome::Written(path)
            }
            Err(e) => {
                error!(block = %block.title, error = %e, "block failed");
                BlockOutcome::Failed { block_title: block.title.clone(), error: format!("{e:#}") }
            }
        };
        outcomes.push(outcome);
    }
    outcomes
}

async fn write_block(
    main_title: &str,
    main_context: &str,
    block: &FeatureBlock,
    path: &Path,
    inference: &dyn Inference,
) -> anyhow::Result<()> {
    let details: FeatureDetails = infer_structured(
        inference,
        ModelRole::DetailSub,
        prompts::DETAIL_SUB,
        prompts::block_detail_request(main_context, &block.body),
    )
    .await?;
    write_atomic(path, &render_block_detail(main_title, block, &details.details))?;
    Ok(())
}
