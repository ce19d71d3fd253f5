// meeting-features/src/inference.rs

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::{debug, error, instrument};

use crate::{
    config::{Config, ModelRole},
    error::InferenceError,
};

/// One prompt call. `schema` describes the JSON object the model must return.
#[derive(Clone, Debug)]
pub struct InferenceRequest {
    pub role: ModelRole,
    pub system_prompt: String,
    pub prompt: String,
    pub schema: Value,
}

/// The language model, seen as a function from prompt to structured output.
#[async_trait]
pub trait Inference: Send + Sync {
    async fn infer(&self, request: &InferenceRequest) -> Result<Value, InferenceError>;
}

/// A stage's expected response shape.
pub trait StructuredOutput: DeserializeOwned {
    fn schema() -> Value;
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MainFeatures {
    pub features: Vec<String>,
}

/// Outline lines (`N) Main`, `- Sub`, `-- sub-sub`), one entry per line.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HierarchicalFeatures {
    pub features: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureDetails {
    pub details: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Summary {
    pub summary: String,
}

fn string_list_schema(field: &str) -> Value {
    json!({
        "type": "OBJECT",
        "properties": { field: { "type": "ARRAY", "items": { "type": "STRING" } } },
        "required": [field],
    })
}

fn string_schema(field: &str) -> Value {
    json!({
        "type": "OBJECT",
        "properties": { field: { "type": "STRING" } },
        "required": [field],
    })
}

impl StructuredOutput for MainFeatures {
    fn schema() -> Value { string_list_schema("features") }
}
impl StructuredOutput for HierarchicalFeatures {
    fn schema() -> Value { string_list_schema("features") }
}
impl StructuredOutput for FeatureDetails {
    fn schema() -> Value { string_schema("details") }
}
impl StructuredOutput for Summary {
    fn schema() -> Value { string_schema("summary") }
}

/// Send `prompt` under `system_prompt` and decode the reply as `T`.
pub async fn infer_structured<T: StructuredOutput>(
    inference: &dyn Inference,
    role: ModelRole,
    system_prompt: &str,
    prompt: String,
) -> Result<T, InferenceError> {
    let request = InferenceRequest {
        role,
        system_prompt: system_prompt.to_string(),
        prompt,
        schema: T::schema(),
    };
    let value = inference.infer(&request).await?;
    Ok(serde_json::from_value(value)?)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'static str,
    response_schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(request: &'a InferenceRequest) -> Self {
        Self {
            system_instruction: Content { role: None, parts: vec![Part { text: &request.system_prompt }] },
            contents: vec![Content { role: Some("user"), parts: vec![Part { text: &request.prompt }] }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: &request.schema,
            },
        }
    }
}

/// Concatenate the first candidate's text parts and parse them as JSON.
fn decode_response(response: GenerateContentResponse) -> Result<Value, InferenceError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(InferenceError::Empty);
    }
    Ok(serde_json::from_str(&text)?)
}

/// Google Generative Language API client. Model, endpoint and key variable come from config per role.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    config: Config,
}

impl GeminiClient {
    pub fn new(config: Config) -> Self {
        debug!("Creating new Gemini client");
        Self { client: Client::new(), config }
    }
}

#[async_trait]
impl Inference for GeminiClient {
    #[instrument(skip(self, request), fields(role = request.role.key()))]
    async fn infer(&self, request: &InferenceRequest) -> Result<Value, InferenceError> {
        let target = self.config.pick_model(request.role);
        let key_env = target.api_key_env_or_default();
        let api_key = std::env::var(key_env).map_err(|_| InferenceError::MissingApiKey(key_env.to_string()))?;
        let url = format!("{}/models/{}:generateContent", target.base_url_or_default(), target.name_or_default());
        debug!(model = target.name_or_default(), prompt_chars = request.prompt.len(), "Sending request to Gemini API");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&GenerateContentRequest::new(request))
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Failed to send request to Gemini API");
                InferenceError::Http(e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Gemini API returned error");
            return Err(InferenceError::Api { status: status.as_u16(), message: body });
        }

        let body: GenerateContentResponse = response.json().await?;
        decode_response(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let req = InferenceRequest {
            role: ModelRole::DetailSub,
            system_prompt: "sys".into(),
            prompt: "hello".into(),
            schema: FeatureDetails::schema(),
        };
        let body = serde_json::to_value(GenerateContentRequest::new(&req)).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["required"][0], "details");
    }

    #[test]
    fn decodes_split_text_parts() {
        let raw = json!({
            "candidates": [{ "content": { "parts": [{ "text": "{\"features\": [\"Lo" }, { "text": "gin\"]}" }] } }]
        });
        let resp: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        let v = decode_response(resp).unwrap();
        let out: MainFeatures = serde_json::from_value(v).unwrap();
        assert_eq!(out.features, vec!["Login"]);
    }

    #[test]
    fn empty_candidates_is_an_error() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(decode_response(resp), Err(InferenceError::Empty)));
    }

    #[test]
    fn schemas_name_their_field() {
        assert_eq!(MainFeatures::schema()["properties"]["features"]["type"], "ARRAY");
        assert_eq!(Summary::schema()["properties"]["summary"]["type"], "STRING");
    }
}
