//! Nutrition estimation
//!
//! This module handles communication with the OpenAI API for turning meal
//! descriptions (text or photo) into calorie and macro estimates.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const TEXT_MODEL: &str = "gpt-3.5-turbo";
const VISION_MODEL: &str = "gpt-4o";
const VISION_MAX_TOKENS: u32 = 500;

const TEXT_SYSTEM_PROMPT: &str = "You are a nutrition expert. Estimate the nutritional \
content of the meal the user describes. Respond with a JSON object containing exactly \
these numeric fields: calories, protein, carbs, fat (grams for macros). If the meal is \
ambiguous, assume a typical serving.";

const VISION_PROMPT: &str = "Analyze this photo of a meal. Describe the meal briefly and \
estimate its nutritional content. Respond with only a JSON object containing these \
fields: description (string), calories, protein, carbs, fat (numbers, grams for macros).";

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum EstimationError {
  #[error("API key not configured")]
  MissingApiKey,

  #[error("Request failed: {0}")]
  Request(String),

  #[error("API error: {0}")]
  Api(String),

  #[error("Parse error: {0}")]
  Parse(String),
}

/// ---------------------------------------------------------------------------
/// Estimates
/// ---------------------------------------------------------------------------

/// Macro estimate for a described meal. All-zero values are a legitimate
/// answer (water, black coffee); a response missing a field is not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionEstimate {
  pub calories: f64,
  pub protein: f64,
  pub carbs: f64,
  pub fat: f64,
}

/// Photo estimate carries the model's own description of what it saw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoEstimate {
  pub description: String,
  pub calories: f64,
  pub protein: f64,
  pub carbs: f64,
  pub fat: f64,
}

/// ---------------------------------------------------------------------------
/// OpenAI API Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
  model: String,
  messages: Vec<ChatMessage>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
  #[serde(rename = "type")]
  format_type: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
  role: String,
  content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
  Text(String),
  Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
  #[serde(rename = "text")]
  Text { text: String },
  #[serde(rename = "image_url")]
  ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
  url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
  choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
  message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
  content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
  error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
  message: String,
}

/// ---------------------------------------------------------------------------
/// Nutrition Client
/// ---------------------------------------------------------------------------

pub struct NutritionClient {
  client: Client,
  api_key: String,
  base_url: String,
}

impl NutritionClient {
  /// Create a new client, loading the API key from the environment
  /// (a .env file is honored if present).
  pub fn from_env() -> Result<Self, EstimationError> {
    dotenvy::dotenv().ok();
    let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| EstimationError::MissingApiKey)?;

    Ok(Self {
      client: Client::new(),
      api_key,
      base_url: OPENAI_API_URL.to_string(),
    })
  }

  /// Point the client at a different API endpoint (used in tests).
  pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
    Self {
      client: Client::new(),
      api_key: api_key.into(),
      base_url: base_url.into(),
    }
  }

  /// Estimate calories and macros from a text description of a meal.
  pub async fn analyze_description(
    &self,
    description: &str,
  ) -> Result<NutritionEstimate, EstimationError> {
    let request = ChatRequest {
      model: TEXT_MODEL.to_string(),
      messages: vec![
        ChatMessage {
          role: "system".to_string(),
          content: MessageContent::Text(TEXT_SYSTEM_PROMPT.to_string()),
        },
        ChatMessage {
          role: "user".to_string(),
          content: MessageContent::Text(description.to_string()),
        },
      ],
      response_format: Some(ResponseFormat {
        format_type: "json_object".to_string(),
      }),
      max_tokens: None,
    };

    let content = self.complete(&request).await?;
    parse_estimate(&content)
  }

  /// Describe and estimate a meal from a photo. The image is sent inline
  /// as a base64 data URL.
  pub async fn analyze_photo(
    &self,
    image: &[u8],
    mime_type: &str,
  ) -> Result<PhotoEstimate, EstimationError> {
    let data_url = format!("data:{};base64,{}", mime_type, BASE64.encode(image));

    let request = ChatRequest {
      model: VISION_MODEL.to_string(),
      messages: vec![ChatMessage {
        role: "user".to_string(),
        content: MessageContent::Parts(vec![
          ContentPart::Text {
            text: VISION_PROMPT.to_string(),
          },
          ContentPart::ImageUrl {
            image_url: ImageUrl { url: data_url },
          },
        ]),
      }],
      response_format: None,
      max_tokens: Some(VISION_MAX_TOKENS),
    };

    let content = self.complete(&request).await?;
    parse_estimate(&content)
  }

  /// Send a chat completion request and return the first choice's text.
  async fn complete(&self, request: &ChatRequest) -> Result<String, EstimationError> {
    let url = format!("{}/chat/completions", self.base_url);

    let response = self
      .client
      .post(&url)
      .bearer_auth(&self.api_key)
      .json(request)
      .send()
      .await
      .map_err(|e| EstimationError::Request(e.to_string()))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| EstimationError::Request(e.to_string()))?;

    if !status.is_success() {
      if let Ok(error_resp) = serde_json::from_str::<OpenAiErrorResponse>(&body) {
        return Err(EstimationError::Api(error_resp.error.message));
      }
      return Err(EstimationError::Api(format!("HTTP {}: {}", status, body)));
    }

    let chat_response: ChatResponse =
      serde_json::from_str(&body).map_err(|e| EstimationError::Parse(e.to_string()))?;

    chat_response
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message.content)
      .ok_or_else(|| EstimationError::Parse("No content in response".to_string()))
  }
}

/// Parse the model's JSON answer strictly. A malformed or incomplete
/// payload is a hard error, never silently zeroed.
fn parse_estimate<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T, EstimationError> {
  serde_json::from_str(content.trim())
    .map_err(|e| EstimationError::Parse(format!("{}: {}", e, content)))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  fn chat_body(content: &str) -> String {
    serde_json::json!({
      "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
    .to_string()
  }

  #[tokio::test]
  async fn test_analyze_description_parses_estimate() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/chat/completions")
      .match_header("authorization", "Bearer test-key")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(chat_body(
        r#"{"calories": 420.0, "protein": 38.5, "carbs": 12.0, "fat": 22.0}"#,
      ))
      .create_async()
      .await;

    let client = NutritionClient::with_base_url("test-key", server.url());
    let estimate = client
      .analyze_description("grilled chicken salad")
      .await
      .expect("estimate");

    assert_eq!(estimate.calories, 420.0);
    assert_eq!(estimate.protein, 38.5);
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_all_zero_estimate_is_accepted() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/chat/completions")
      .with_status(200)
      .with_body(chat_body(
        r#"{"calories": 0, "protein": 0, "carbs": 0, "fat": 0}"#,
      ))
      .create_async()
      .await;

    let client = NutritionClient::with_base_url("test-key", server.url());
    let estimate = client.analyze_description("black coffee").await.expect("estimate");
    assert_eq!(estimate.calories, 0.0);
  }

  #[tokio::test]
  async fn test_missing_field_is_a_parse_error() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/chat/completions")
      .with_status(200)
      .with_body(chat_body(r#"{"calories": 420.0, "protein": 38.5}"#))
      .create_async()
      .await;

    let client = NutritionClient::with_base_url("test-key", server.url());
    let result = client.analyze_description("mystery meal").await;
    assert!(matches!(result, Err(EstimationError::Parse(_))));
  }

  #[tokio::test]
  async fn test_api_error_surfaces_message() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/chat/completions")
      .with_status(401)
      .with_body(r#"{"error": {"message": "Incorrect API key provided"}}"#)
      .create_async()
      .await;

    let client = NutritionClient::with_base_url("bad-key", server.url());
    let result = client.analyze_description("toast").await;
    match result {
      Err(EstimationError::Api(msg)) => assert!(msg.contains("Incorrect API key")),
      other => panic!("expected Api error, got {:?}", other.map(|_| ())),
    }
  }

  #[tokio::test]
  async fn test_analyze_photo_returns_description_and_macros() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/chat/completions")
      .match_body(mockito::Matcher::PartialJsonString(
        r#"{"model": "gpt-4o", "max_tokens": 500}"#.to_string(),
      ))
      .with_status(200)
      .with_body(chat_body(
        r#"{"description": "Bowl of oatmeal with berries", "calories": 310.0, "protein": 11.0, "carbs": 54.0, "fat": 6.0}"#,
      ))
      .create_async()
      .await;

    let client = NutritionClient::with_base_url("test-key", server.url());
    let estimate = client
      .analyze_photo(&[0xFF, 0xD8, 0xFF], "image/jpeg")
      .await
      .expect("estimate");

    assert_eq!(estimate.description, "Bowl of oatmeal with berries");
    assert_eq!(estimate.carbs, 54.0);
    mock.assert_async().await;
  }

  #[test]
  #[serial]
  fn test_from_env_requires_api_key() {
    temp_env::with_var("OPENAI_API_KEY", None::<&str>, || {
      assert!(matches!(
        NutritionClient::from_env(),
        Err(EstimationError::MissingApiKey)
      ));
    });

    temp_env::with_var("OPENAI_API_KEY", Some("sk-test"), || {
      assert!(NutritionClient::from_env().is_ok());
    });
  }
}
