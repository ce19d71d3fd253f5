// meeting-features/src/pipeline.rs

use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, str::FromStr, sync::Arc};
use tracing::{error, info, warn};

use crate::{
    config::Config,
    detail::{OutcomeCounts, detail_path},
    inference::Inference,
    slug::{meeting_folder_name, slugify},
    stages,
    store,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Save,
    Summarize,
    ExtractMain,
    DetailMain,
    ExtractSub,
    DetailSub,
}

impl Stage {
    /// Pipeline order.
    pub const ALL: [Stage; 6] = [
        Stage::Save,
        Stage::Summarize,
        Stage::ExtractMain,
        Stage::DetailMain,
        Stage::ExtractSub,
        Stage::DetailSub,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::Summarize => "summarize",
            Self::ExtractMain => "extract-main",
            Self::DetailMain => "detail-main",
            Self::ExtractSub => "extract-sub",
            Self::DetailSub => "detail-sub",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for Stage {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace('_', "-");
        Stage::ALL
            .into_iter()
            .find(|st| st.name() == norm)
            .ok_or_else(|| format!("unknown stage '{s}' (expected one of: save, summarize, extract-main, detail-main, extract-sub, detail-sub)"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    /// Output was already there.
    Skipped,
    /// Ran, but some features or blocks failed.
    Partial,
    Failed,
}

/// What a stage reports back before the orchestrator stamps it with the stage name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageReport {
    pub status: StageStatus,
    pub message: String,
}

impl StageReport {
    pub fn completed(message: impl Into<String>) -> Self {
        Self { status: StageStatus::Completed, message: message.into() }
    }
    pub fn skipped(message: impl Into<String>) -> Self {
        Self { status: StageStatus::Skipped, message: message.into() }
    }
    /// Status from per-item outcomes: any failure makes it partial, all skips make it skipped.
    pub fn from_counts(counts: OutcomeCounts, message: impl Into<String>) -> Self {
        let status = if counts.failed > 0 {
            StageStatus::Partial
        } else if counts.written == 0 && counts.skipped > 0 {
            StageStatus::Skipped
        } else {
            StageStatus::Completed
        };
        Self { status, message: message.into() }
    }

    /// Features that could not run for lack of upstream input make the stage partial.
    pub fn with_missing(mut self, missing: usize) -> Self {
        if missing > 0 && self.status != StageStatus::Failed {
            self.status = StageStatus::Partial;
        }
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageResult {
    pub stage: Stage,
    pub status: StageStatus,
    pub message: String,
}

impl fmt::Display for StageResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {:?}: {}", self.stage, self.status, self.message)
    }
}

/// Everything a stage needs: which meeting, where its files live, and the model.
#[derive(Clone)]
pub struct PipelineContext {
    pub meeting_name: String,
    pub file_path: String,
    pub meeting_dir: PathBuf,
    pub config: Config,
    pub inference: Arc<dyn Inference>,
}

impl PipelineContext {
    pub fn new(meeting_name: impl Into<String>, file_path: impl Into<String>, config: Config, inference: Arc<dyn Inference>) -> Self {
        let meeting_name = meeting_name.into();
        let meeting_dir = config.output_root().join(meeting_folder_name(&meeting_name));
        Self { meeting_name, file_path: file_path.into(), meeting_dir, config, inference }
    }

    pub fn store_path(&self) -> PathBuf { store::store_path(&self.meeting_dir) }
    pub fn main_features_path(&self) -> PathBuf { self.meeting_dir.join("main_features.txt") }
    pub fn sub_features_path(&self) -> PathBuf { self.meeting_dir.join("sub_features.txt") }
    pub fn summary_path(&self) -> PathBuf {
        self.meeting_dir.join(format!("{}_summary.txt", meeting_folder_name(&self.meeting_name)))
    }

    /// `<meeting>/<slug(title)>/`
    pub fn main_folder(&self, main_title: &str) -> PathBuf { self.meeting_dir.join(slugify(main_title)) }

    /// `<meeting>/<slug(title)>/<slug(title)>.txt`
    pub fn main_detail_path(&self, main_title: &str) -> PathBuf {
        detail_path(&self.main_folder(main_title), main_title)
    }
}

/// Run one stage. Errors never escape: they come back as a `Failed` result.
pub async fn run_stage(ctx: &PipelineContext, stage: Stage) -> StageResult {
    info!(stage = %stage, meeting = %ctx.meeting_name, "stage start");
    let report = match stage {
        Stage::Save => stages::save(ctx).await,
        Stage::Summarize => stages::summarize(ctx).await,
        Stage::ExtractMain => stages::extract_main(ctx).await,
        Stage::DetailMain => stages::detail_main(ctx).await,
        Stage::ExtractSub => stages::extract_sub(ctx).await,
        Stage::DetailSub => stages::detail_sub(ctx).await,
    };
    let result = match report {
        Ok(StageReport { status, message }) => StageResult { stage, status, message },
        Err(e) => StageResult { stage, status: StageStatus::Failed, message: format!("{e:#}") },
    };
    match result.status {
        StageStatus::Failed => error!(stage = %stage, message = %result.message, "stage failed"),
        StageStatus::Partial => warn!(stage = %stage, message = %result.message, "stage partially failed"),
        _ => info!(stage = %stage, status = ?result.status, message = %result.message, "stage done"),
    }
    result
}

/// Run `stages` strictly in the order given. A failed stage does not stop later
/// ones and nothing is rolled back; every stage yields exactly one result.
pub async fn run_pipeline(ctx: &PipelineContext, stages: &[Stage]) -> Vec<StageResult> {
    let mut results = Vec::with_capacity(stages.len());
    for &stage in stages {
        results.push(run_stage(ctx, stage).await);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_parse_back() {
        for st in Stage::ALL {
            assert_eq!(st.name().parse::<Stage>().unwrap(), st);
        }
        assert_eq!("Detail_Sub".parse::<Stage>().unwrap(), Stage::DetailSub);
        assert!("deploy".parse::<Stage>().is_err());
    }

    #[test]
    fn report_status_from_counts() {
        let c = |written, skipped, failed| OutcomeCounts { written, skipped, failed };
        assert_eq!(StageReport::from_counts(c(0, 3, 0), "").status, StageStatus::Skipped);
        assert_eq!(StageReport::from_counts(c(1, 3, 0), "").status, StageStatus::Completed);
        assert_eq!(StageReport::from_counts(c(0, 0, 0), "").status, StageStatus::Completed);
        assert_eq!(StageReport::from_counts(c(2, 0, 1), "").status, StageStatus::Partial);
        assert_eq!(StageReport::from_counts(c(0, 2, 0), "").with_missing(0).status, StageStatus::Skipped);
        assert_eq!(StageReport::from_counts(c(0, 2, 0), "").with_missing(1).status, StageStatus::Partial);
        assert_eq!(StageReport::from_counts(c(0, 0, 0), "").with_missing(3).status, StageStatus::Partial);
    }
}
