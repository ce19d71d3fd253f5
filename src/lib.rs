pub mod slug;
pub mod outline;
pub mod block;
pub mod detail;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod inference;
pub mod prompts;
pub mod store;
pub mod stages;
pub mod pipeline;

pub use slug::{slugify, SlugCollision};
pub use outline::{parse, FeatureOutline, MainFeatureNode, RawOutlineLine};
pub use block::{segment, FeatureBlock, DEFAULT_TOP_LEVEL_MAX_INDENT};
pub use detail::{process_blocks, BlockOutcome, OutcomeCounts};
pub use config::{Config, ConfigManager, ModelRole};
pub use error::{InferenceError, MissingInput, StoreError};
pub use inference::{GeminiClient, Inference, InferenceRequest};
pub use store::{TranscriptRecord, TranscriptStore};
pub use pipeline::{run_pipeline, PipelineContext, Stage, StageResult, StageStatus};
