#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::{fs, path::Path, sync::Arc};

use meeting_features::{
    config::{Config, ModelRole},
    error::InferenceError,
    inference::{Inference, InferenceRequest},
    pipeline::PipelineContext,
};

type Responder = dyn Fn(&InferenceRequest) -> Result<Value, InferenceError> + Send + Sync;

/// Answers from a closure and remembers every request it saw.
pub struct ScriptedInference {
    respond: Box<Responder>,
    pub calls: Mutex<Vec<InferenceRequest>>,
}

impl ScriptedInference {
    pub fn new(respond: impl Fn(&InferenceRequest) -> Result<Value, InferenceError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self { respond: Box::new(respond), calls: Mutex::new(Vec::new()) })
    }

    pub fn call_count(&self) -> usize { self.calls.lock().len() }

    pub fn roles(&self) -> Vec<ModelRole> { self.calls.lock().iter().map(|r| r.role).collect() }
}

#[async_trait]
impl Inference for ScriptedInference {
    async fn infer(&self, request: &InferenceRequest) -> Result<Value, InferenceError> {
        self.calls.lock().push(request.clone());
        (self.respond)(request)
    }
}

/// A model that knows about one meeting with two main features.
pub fn product_meeting(request: &InferenceRequest) -> Result<Value, InferenceError> {
    Ok(match request.role {
        ModelRole::Summary => json!({ "summary": "We planned login and billing." }),
        ModelRole::ExtractMain => json!({ "features": ["User Login", "Billing"] }),
        ModelRole::DetailMain => json!({ "details": "Alice: users sign in with email or OAuth." }),
        ModelRole::ExtractSub if request.prompt.contains("1) User Login") => json!({
            "features": ["1) User Login", "   - Email login", "      -- password hashing", "   - OAuth"]
        }),
        ModelRole::ExtractSub => json!({ "features": ["2) Billing", "   - Invoices"] }),
        ModelRole::DetailSub => json!({ "details": "Bob: this block needs work." }),
    })
}

pub fn context(root: &Path, meeting: &str, transcript: &str, inference: Arc<dyn Inference>) -> PipelineContext {
    let file = root.join("transcript.txt");
    fs::write(&file, transcript).unwrap();
    let mut config = Config::default();
    config.pipeline.output_root = Some(root.join("out"));
    PipelineContext::new(meeting, file.to_string_lossy().into_owned(), config, inference)
}
