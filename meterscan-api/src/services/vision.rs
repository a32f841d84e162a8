//! Vision API client
//!
//! Estimates a meter reading from a photo. [`GeminiVisionClient`] sends one
//! `generateContent` request to the Gemini REST API, takes the first number
//! in the model's answer as the reading, and saves the image so it can be
//! served back to the client. There is no retry: any failure is returned
//! to the caller as a [`VisionError`].

use async_trait::async_trait;
use meterscan_common::MeasureType;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::image_store::ImageStore;

const USER_AGENT: &str = concat!("meterscan/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;
const IMAGE_MIME_TYPE: &str = "image/jpeg";

/// Vision client errors
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Image storage error: {0}")]
    StorageError(#[from] std::io::Error),
}

/// Result of analyzing one meter photo
#[derive(Debug, Clone, PartialEq)]
pub struct VisionReading {
    pub image_url: String,
    pub measure_value: f64,
    pub measure_uuid: String,
}

/// Estimates readings from meter photos
#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn analyze(
        &self,
        image_base64: &str,
        measure_type: MeasureType,
    ) -> Result<VisionReading, VisionError>;

    /// Drop whatever `analyze` stored for a reading that was not persisted
    async fn discard(&self, _measure_uuid: &str) -> Result<(), VisionError> {
        Ok(())
    }
}

// Gemini generateContent wire types

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
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
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, all text parts concatenated
    fn first_text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        Some(text)
    }
}

/// Prompt sent alongside the image
pub fn prompt_for(measure_type: MeasureType) -> &'static str {
    match measure_type {
        MeasureType::Water => "What is the reading on this water meter?",
        MeasureType::Gas => "What is the reading on this gas meter?",
    }
}

/// First decimal number (`\d+(\.\d+)?`) in `text`; 0 when there is none
pub fn extract_reading(text: &str) -> f64 {
    let bytes = text.as_bytes();
    let Some(start) = bytes.iter().position(u8::is_ascii_digit) else {
        return 0.0;
    };

    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }

    // Fractional part only counts when at least one digit follows the dot
    if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }

    text[start..end].parse().unwrap_or(0.0)
}

/// Gemini-backed [`VisionClient`]
pub struct GeminiVisionClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    image_store: ImageStore,
}

impl GeminiVisionClient {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        image_store: ImageStore,
    ) -> Result<Self, VisionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| VisionError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            image_store,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    async fn generate(&self, image_base64: &str, measure_type: MeasureType) -> Result<String, VisionError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: prompt_for(measure_type),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: IMAGE_MIME_TYPE,
                            data: image_base64,
                        },
                    },
                ],
            }],
        };

        debug!(model = %self.model, measure_type = %measure_type, "Querying Gemini API");

        let response = self
            .http_client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| VisionError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Gemini API returned an error");
            return Err(VisionError::ApiError(status.as_u16(), error_text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| VisionError::ParseError(e.to_string()))?;

        parsed
            .first_text()
            .ok_or_else(|| VisionError::ParseError("response contained no candidates".to_string()))
    }
}

#[async_trait]
impl VisionClient for GeminiVisionClient {
    async fn analyze(
        &self,
        image_base64: &str,
        measure_type: MeasureType,
    ) -> Result<VisionReading, VisionError> {
        let text = self.generate(image_base64, measure_type).await?;
        let measure_value = extract_reading(&text);
        let measure_uuid = Uuid::new_v4().to_string();

        let image_url = self.image_store.save(image_base64, &measure_uuid).await?;

        info!(
            measure_uuid = %measure_uuid,
            measure_value = measure_value,
            "Vision analysis complete"
        );

        Ok(VisionReading {
            image_url,
            measure_value,
            measure_uuid,
        })
    }

    async fn discard(&self, measure_uuid: &str) -> Result<(), VisionError> {
        self.image_store.remove(measure_uuid).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::{json, Value};

    #[test]
    fn test_extract_reading() {
        assert_eq!(extract_reading("The reading is 01234.56 m³"), 1234.56);
        assert_eq!(extract_reading("Reading: 789"), 789.0);
        assert_eq!(extract_reading("about 12. Done"), 12.0);
        assert_eq!(extract_reading("no digits here"), 0.0);
        assert_eq!(extract_reading("first 3 then 4.5"), 3.0);
    }

    #[test]
    fn test_prompt_for_type() {
        assert!(prompt_for(MeasureType::Water).contains("water"));
        assert!(prompt_for(MeasureType::Gas).contains("gas"));
    }

    #[test]
    fn test_request_wire_shape() {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: "p" },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: IMAGE_MIME_TYPE,
                            data: "aGk=",
                        },
                    },
                ],
            }],
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({"contents": [{"parts": [
                {"text": "p"},
                {"inline_data": {"mime_type": "image/jpeg", "data": "aGk="}}
            ]}]})
        );
    }

    #[test]
    fn test_response_first_text() {
        let parsed: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "The meter "}, {"text": "shows 42"}]}}]
        }))
        .unwrap();
        assert_eq!(parsed.first_text().as_deref(), Some("The meter shows 42"));

        let empty: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(empty.first_text().is_none());
    }

    /// Serve a fake generateContent endpoint on an ephemeral port
    async fn spawn_fake_gemini(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_analyze_against_fake_server() {
        let router = Router::new().route(
            "/v1beta/models/:model_call",
            post(|Json(body): Json<Value>| async move {
                let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap_or_default();
                assert!(prompt.contains("gas"));
                Json(json!({
                    "candidates": [{"content": {"parts": [{"text": "The gas meter reads 00482.7"}]}}]
                }))
            }),
        );
        let base_url = spawn_fake_gemini(router).await;

        let dir = tempfile::tempdir().unwrap();
        let client = GeminiVisionClient::new(
            "test-key".to_string(),
            base_url,
            "gemini-1.5-flash".to_string(),
            ImageStore::new(dir.path(), "http://localhost:3000"),
        )
        .unwrap();

        let image = STANDARD.encode(b"jpeg-bytes");
        let reading = client.analyze(&image, MeasureType::Gas).await.unwrap();

        assert_eq!(reading.measure_value, 482.7);
        assert_eq!(
            reading.image_url,
            format!("http://localhost:3000/temp/{}.jpg", reading.measure_uuid)
        );
        let saved = dir.path().join(format!("{}.jpg", reading.measure_uuid));
        assert!(saved.exists());

        client.discard(&reading.measure_uuid).await.unwrap();
        assert!(!saved.exists());
    }

    #[tokio::test]
    async fn test_analyze_api_error() {
        let router = Router::new().route(
            "/v1beta/models/:model_call",
            post(|| async { (axum::http::StatusCode::FORBIDDEN, "API key not valid") }),
        );
        let base_url = spawn_fake_gemini(router).await;

        let dir = tempfile::tempdir().unwrap();
        let client = GeminiVisionClient::new(
            "bad-key".to_string(),
            base_url,
            "gemini-1.5-flash".to_string(),
            ImageStore::new(dir.path(), "http://localhost:3000"),
        )
        .unwrap();

        let err = client
            .analyze(&STANDARD.encode(b"x"), MeasureType::Water)
            .await
            .unwrap_err();
        assert!(matches!(err, VisionError::ApiError(403, _)));
    }

    #[tokio::test]
    async fn test_analyze_unreachable_service() {
        let dir = tempfile::tempdir().unwrap();
        let client = GeminiVisionClient::new(
            "k".to_string(),
            "http://127.0.0.1:9".to_string(),
            "m".to_string(),
            ImageStore::new(dir.path(), "http://localhost:3000"),
        )
        .unwrap();

        let err = client
            .analyze(&STANDARD.encode(b"x"), MeasureType::Water)
            .await
            .unwrap_err();
        assert!(matches!(err, VisionError::NetworkError(_)));
    }
}
