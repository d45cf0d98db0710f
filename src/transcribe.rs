//! Speech-to-text
//!
//! Voice capture hands recorded audio to a transcription backend through
//! the `SpeechToText` trait. The shipped backend is the OpenAI Whisper
//! API; an on-device model can slot in behind the same trait.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const WHISPER_MODEL: &str = "whisper-1";

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum TranscribeError {
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
/// Contract
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Transcript {
  pub text: String,
}

/// Turn recorded audio into text. Implementations receive the raw bytes
/// and the MIME type the recorder produced.
#[async_trait]
pub trait SpeechToText {
  async fn transcribe(&self, audio: Vec<u8>, mime_type: &str)
    -> Result<Transcript, TranscribeError>;
}

/// ---------------------------------------------------------------------------
/// Whisper API Client
/// ---------------------------------------------------------------------------

pub struct WhisperApiClient {
  client: Client,
  api_key: String,
  base_url: String,
}

impl WhisperApiClient {
  /// Create a new client, loading the API key from the environment
  /// (a .env file is honored if present).
  pub fn from_env() -> Result<Self, TranscribeError> {
    dotenvy::dotenv().ok();
    let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| TranscribeError::MissingApiKey)?;

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
}

/// File extension Whisper expects for the uploaded part.
fn extension_for(mime_type: &str) -> &'static str {
  match mime_type {
    "audio/mpeg" | "audio/mp3" => "mp3",
    "audio/wav" | "audio/x-wav" => "wav",
    "audio/mp4" => "mp4",
    "audio/ogg" => "ogg",
    _ => "webm",
  }
}

#[async_trait]
impl SpeechToText for WhisperApiClient {
  async fn transcribe(
    &self,
    audio: Vec<u8>,
    mime_type: &str,
  ) -> Result<Transcript, TranscribeError> {
    let url = format!("{}/audio/transcriptions", self.base_url);

    let part = Part::bytes(audio)
      .file_name(format!("recording.{}", extension_for(mime_type)))
      .mime_str(mime_type)
      .map_err(|e| TranscribeError::Request(e.to_string()))?;

    let form = Form::new()
      .part("file", part)
      .text("model", WHISPER_MODEL);

    let response = self
      .client
      .post(&url)
      .bearer_auth(&self.api_key)
      .multipart(form)
      .send()
      .await
      .map_err(|e| TranscribeError::Request(e.to_string()))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| TranscribeError::Request(e.to_string()))?;

    if !status.is_success() {
      return Err(TranscribeError::Api(format!("HTTP {}: {}", status, body)));
    }

    serde_json::from_str(&body).map_err(|e| TranscribeError::Parse(e.to_string()))
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[tokio::test]
  async fn test_transcribe_returns_text() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/audio/transcriptions")
      .match_header("authorization", "Bearer test-key")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"text": "two eggs and a slice of toast"}"#)
      .create_async()
      .await;

    let client = WhisperApiClient::with_base_url("test-key", server.url());
    let transcript = client
      .transcribe(vec![1, 2, 3], "audio/webm")
      .await
      .expect("transcript");

    assert_eq!(transcript.text, "two eggs and a slice of toast");
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_api_failure_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/audio/transcriptions")
      .with_status(400)
      .with_body(r#"{"error": {"message": "Invalid file format"}}"#)
      .create_async()
      .await;

    let client = WhisperApiClient::with_base_url("test-key", server.url());
    let result = client.transcribe(vec![0], "audio/webm").await;
    assert!(matches!(result, Err(TranscribeError::Api(_))));
  }

  #[test]
  fn test_extension_matches_mime_type() {
    assert_eq!(extension_for("audio/mpeg"), "mp3");
    assert_eq!(extension_for("audio/wav"), "wav");
    assert_eq!(extension_for("application/octet-stream"), "webm");
  }

  #[test]
  #[serial]
  fn test_from_env_requires_api_key() {
    temp_env::with_var("OPENAI_API_KEY", None::<&str>, || {
      assert!(matches!(
        WhisperApiClient::from_env(),
        Err(TranscribeError::MissingApiKey)
      ));
    });
  }
}
