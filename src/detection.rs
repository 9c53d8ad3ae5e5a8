use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::overlay::{BoundingBox, TextRegion};

/// One text block as reported by the detection server.
///
/// Only the fields the overlay reads are typed; the rest are carried as raw
/// JSON so an odd value in one of them never rejects the block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedText {
    pub text: String,
    pub position: [f64; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub english: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fg_color: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_spacing: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Value>,
}

impl DetectedText {
    pub fn to_region(&self) -> TextRegion {
        let [xmin, ymin, xmax, ymax] = self.position;
        TextRegion {
            bbox: BoundingBox::new(xmin, ymin, xmax, ymax),
            original_text: self.text.clone(),
            translated_text: self.english.clone().filter(|text| !text.is_empty()),
            font_size_hint: self.font_size.filter(|size| *size != 0.0 && !size.is_nan()),
            is_vertical: self.vertical.unwrap_or(false),
            line_count_hint: self
                .lines
                .as_ref()
                .map(|lines| lines.len())
                .filter(|count| *count > 0),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionResponse {
    #[serde(default)]
    pub results: Vec<DetectedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionResponse {
    pub fn regions(&self) -> Vec<TextRegion> {
        self.results.iter().map(DetectedText::to_region).collect()
    }
}

/// Accepts either `{"results": [...]}` or a bare array of text blocks.
///
/// Each block is read on its own; a block without usable `text` and
/// `position` is logged and skipped while the others are kept.
pub fn parse_detection_response(body: &str) -> Result<DetectionResponse> {
    let parsed: Value =
        serde_json::from_str(body).with_context(|| "failed to parse detection response")?;
    let entries = match parsed {
        Value::Array(entries) => entries,
        Value::Object(mut fields) => {
            if let Some(error) = fields.remove("error").and_then(error_text) {
                return Err(anyhow!("detection server error: {}", error));
            }
            match fields.remove("results") {
                Some(Value::Array(entries)) => entries,
                None | Some(Value::Null) => Vec::new(),
                Some(other) => {
                    return Err(anyhow!(
                        "detection response results is not an array: {}",
                        other
                    ));
                }
            }
        }
        other => return Err(anyhow!("unexpected detection response: {}", other)),
    };

    let total = entries.len();
    let results: Vec<DetectedText> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(idx, entry)| match serde_json::from_value(entry) {
            Ok(block) => Some(block),
            Err(err) => {
                warn!("skipping detection result {}: {}", idx, err);
                None
            }
        })
        .collect();
    if results.len() < total {
        debug!("kept {} of {} detection results", results.len(), total);
    }
    Ok(DetectionResponse {
        results,
        error: None,
    })
}

/// The server's `error` text from an error body, if it carries one.
pub fn server_error_message(body: &str) -> Option<String> {
    let mut parsed: Value = serde_json::from_str(body).ok()?;
    parsed.as_object_mut()?.remove("error").and_then(error_text)
}

fn error_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}
