//! Gemini `generateContent` wire types.

use base64::Engine;
use serde::{Deserialize, Serialize};

use roadwatch_core::ImageFrame;

/// Request body for `models/{model}:generateContent`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    /// One user turn: the prompt text, then each frame inline, in order.
    pub fn from_prompt_and_frames(prompt: &str, frames: &[ImageFrame]) -> Self {
        let mut parts = Vec::with_capacity(frames.len() + 1);
        parts.push(Part::Text {
            text: prompt.to_string(),
        });
        parts.extend(frames.iter().map(Part::from_frame));
        Self {
            contents: vec![Content { parts }],
        }
    }

    /// Number of image parts across all turns.
    pub fn image_count(&self) -> usize {
        self.contents
            .iter()
            .flat_map(|c| &c.parts)
            .filter(|p| matches!(p, Part::InlineData { .. }))
            .count()
    }

    /// Total base64 payload size of the image parts, in bytes.
    pub fn inline_bytes(&self) -> usize {
        self.contents
            .iter()
            .flat_map(|c| &c.parts)
            .map(|p| match p {
                Part::InlineData { inline_data } => inline_data.data.len(),
                Part::Text { .. } => 0,
            })
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

impl Part {
    pub fn from_frame(frame: &ImageFrame) -> Self {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: frame.mime_type.clone(),
                data: base64::engine::general_purpose::STANDARD.encode(&frame.data),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InlineData {
    pub mime_type: String,
    /// Base64-encoded bytes.
    pub data: String,
}

/// Response body. Only the fields the pipeline reads are modelled.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidatePart {
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_puts_prompt_first() {
        let frames = vec![
            ImageFrame::with_mime_type(vec![1, 2, 3], "image/jpeg"),
            ImageFrame::with_mime_type(vec![4, 5], "image/png"),
        ];
        let request = GenerateContentRequest::from_prompt_and_frames("Describe", &frames);
        let json = serde_json::to_value(&request).unwrap();

        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["text"], "Describe");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(parts[1]["inline_data"]["data"], "AQID");
        assert_eq!(parts[2]["inline_data"]["mime_type"], "image/png");
        assert_eq!(request.image_count(), 2);
        assert_eq!(request.inline_bytes(), 4 + 4);
    }

    #[test]
    fn test_request_without_frames_is_text_only() {
        let request = GenerateContentRequest::from_prompt_and_frames("Describe", &[]);
        assert_eq!(request.contents[0].parts.len(), 1);
        assert_eq!(request.image_count(), 0);
    }

    #[test]
    fn test_response_first_text() {
        let json = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "Two cars collided."}, {"text": "ignored"}], "role": "model"},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10}
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.first_text(), Some("Two cars collided."));
    }

    #[test]
    fn test_response_without_candidates() {
        let json = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.first_text(), None);
    }
}
