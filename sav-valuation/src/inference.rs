//! Inference request builder and response parser
//!
//! Builds the OpenAI-compatible chat-completion body sent upstream and turns
//! a successful response body into a validated [`ValuationResult`].
//!
//! Accepted success bodies:
//! - chat-completion envelope: `{"choices":[{"message":{"content":"<model JSON>"}}]}`
//! - bare model JSON: `{"mainItem":{...},"otherObjects":[...]}`
//! - relay result: `{"itemName":...,"estimatedValue":...,"detectedObjects":[...]}`

use crate::error::{Result, ValuationError};
use sav_common::{DetectedObject, ValuationResult};
use serde::{Deserialize, Serialize};

const SYSTEM_PROMPT: &str = "You are an insurance appraiser cataloguing school property. \
Identify the main item in the photo and estimate its replacement value in US dollars. \
Also list other notable objects visible in the photo with their estimated values and your \
confidence (0 to 1) that each object is present. Respond with JSON only, in exactly this form: \
{\"mainItem\":{\"name\":string,\"estimatedValue\":number},\
\"otherObjects\":[{\"name\":string,\"estimatedValue\":number,\"confidence\":number}]}";

const USER_PROMPT: &str = "Identify the main item in this photo and estimate its value.";

pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_MAX_TOKENS: u32 = 500;

// ========================================
// Outbound request
// ========================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// A fully built outbound request
///
/// Keeps the raw image payload alongside the chat body so a relay transport
/// can forward just the image.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    image_data_url: String,
    body: ChatCompletionRequest,
}

impl InferenceRequest {
    pub fn image_data_url(&self) -> &str {
        &self.image_data_url
    }

    pub fn body(&self) -> &ChatCompletionRequest {
        &self.body
    }
}

/// Builds chat-completion requests for one model and generation setting
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl RequestBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the outbound request for one image payload
    ///
    /// The payload is not inspected beyond being non-empty; content, size
    /// and MIME correctness are left to the upstream model.
    pub fn build(&self, image_data_url: &str) -> Result<InferenceRequest> {
        if image_data_url.trim().is_empty() {
            return Err(ValuationError::EmptyInput);
        }

        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: USER_PROMPT.to_string(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: image_data_url.to_string(),
                            },
                        },
                    ]),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat { kind: "json_object" },
        };

        Ok(InferenceRequest {
            image_data_url: image_data_url.to_string(),
            body,
        })
    }
}

// ========================================
// Response parsing
// ========================================

#[derive(Debug, Deserialize)]
struct CompletionEnvelope {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelOutput {
    main_item: MainItem,
    #[serde(default)]
    other_objects: Option<Vec<DetectedObject>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MainItem {
    name: String,
    estimated_value: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SuccessBody {
    Completion(CompletionEnvelope),
    Model(ModelOutput),
    Relayed(ValuationResult),
}

/// Parse and validate a successful response body
pub fn parse_response(body: &str) -> Result<ValuationResult> {
    let value: serde_json::Value = serde_json::from_str(body.trim()).map_err(|e| {
        ValuationError::MalformedUpstreamResponse(format!("body is not JSON: {}", e))
    })?;
    // serde's untagged error names the enum, not the body; report the shapes instead
    let parsed = SuccessBody::deserialize(value).map_err(|_| {
        ValuationError::MalformedUpstreamResponse(
            "expected mainItem {name, estimatedValue}, choices, or itemName/estimatedValue"
                .to_string(),
        )
    })?;

    let result = match parsed {
        SuccessBody::Completion(envelope) => {
            let content = envelope
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| {
                    ValuationError::MalformedUpstreamResponse(
                        "completion has no message content".to_string(),
                    )
                })?;
            let output: ModelOutput = serde_json::from_str(strip_code_fence(&content))
                .map_err(|e| {
                    ValuationError::MalformedUpstreamResponse(format!(
                        "model content is not valuation JSON: {}",
                        e
                    ))
                })?;
            output.into_result()
        }
        SuccessBody::Model(output) => output.into_result(),
        SuccessBody::Relayed(result) => result,
    };

    validate(&result)?;
    Ok(result)
}

impl ModelOutput {
    fn into_result(self) -> ValuationResult {
        ValuationResult {
            item_name: self.main_item.name,
            estimated_value: self.main_item.estimated_value,
            detected_objects: self.other_objects.unwrap_or_default(),
        }
    }
}

/// Models sometimes wrap JSON in a Markdown fence despite the directive
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn validate(result: &ValuationResult) -> Result<()> {
    let malformed = |msg: String| Err(ValuationError::MalformedUpstreamResponse(msg));

    if result.item_name.trim().is_empty() {
        return malformed("main item name is empty".to_string());
    }
    if !is_valid_value(result.estimated_value) {
        return malformed(format!(
            "main item value {} is not a finite non-negative number",
            result.estimated_value
        ));
    }

    for (i, object) in result.detected_objects.iter().enumerate() {
        if object.name.trim().is_empty() {
            return malformed(format!("detected object {} has an empty name", i));
        }
        if !is_valid_value(object.estimated_value) {
            return malformed(format!(
                "detected object '{}' has invalid value {}",
                object.name, object.estimated_value
            ));
        }
        if !(0.0..=1.0).contains(&object.confidence) {
            return malformed(format!(
                "detected object '{}' has confidence {} outside [0, 1]",
                object.name, object.confidence
            ));
        }
    }

    Ok(())
}

fn is_valid_value(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Detailed { message: String },
    Plain(String),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorField,
}

/// Extract a human-readable message from an error response body
///
/// Understands `{"error":{"message":...}}` (upstream) and `{"error":"..."}`
/// (relay); anything else falls back to the trimmed raw body.
pub fn extract_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: ErrorField::Detailed { message },
        }) => message,
        Ok(ErrorBody {
            error: ErrorField::Plain(message),
        }) => message,
        Err(_) => {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "no error details".to_string()
            } else {
                trimmed.to_string()
            }
        }
    }
}
