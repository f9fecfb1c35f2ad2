//! Job payloads.
//!
//! The payload is an explicit tagged type rather than a free-form
//! object so per-kind fields stay type-checked while the queue engine
//! itself treats the whole thing as opaque.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single subtitle cue, optionally precomputed by the submitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubtitleCue {
    /// Cue start offset in seconds
    pub start: f64,
    /// Cue end offset in seconds
    pub end: f64,
    /// Cue text
    pub text: String,
}

/// Parameters for rendering one clip artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipParams {
    /// Source media URL
    pub source_url: String,
    /// Clip start timestamp (format: "MM:SS" or "HH:MM:SS")
    pub start: String,
    /// Clip end timestamp
    pub end: String,
    /// Render style identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Precomputed subtitles; when absent the pipeline generates them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitles: Option<Vec<SubtitleCue>>,
}

/// Work description carried by a job record.
///
/// Owned exclusively by the submitter until claimed and read-only to
/// the execution harness afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    /// Render a clip artifact from a source video
    RenderClip(ClipParams),
    /// Schema-free payload for job kinds the engine does not know about
    Opaque { data: serde_json::Value },
}

impl JobPayload {
    /// Wrap an arbitrary JSON value as an opaque payload.
    pub fn opaque(data: serde_json::Value) -> Self {
        Self::Opaque { data }
    }

    /// Validate the payload at submission time.
    ///
    /// Malformed payloads are rejected synchronously before any record
    /// is created.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            JobPayload::RenderClip(params) => {
                if params.source_url.trim().is_empty() {
                    return Err("source_url must not be empty".into());
                }
                if params.start.trim().is_empty() || params.end.trim().is_empty() {
                    return Err("start and end timestamps are required".into());
                }
                Ok(())
            }
            JobPayload::Opaque { data } => {
                if data.is_null() {
                    return Err("opaque payload must not be null".into());
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_clip_payload_serde_round_trip() {
        let payload = JobPayload::RenderClip(ClipParams {
            source_url: "https://example.com/video".into(),
            start: "00:10".into(),
            end: "00:42".into(),
            style: Some("split".into()),
            subtitles: Some(vec![SubtitleCue {
                start: 10.0,
                end: 12.5,
                text: "hello".into(),
            }]),
        });

        let json = serde_json::to_string(&payload).expect("serialize payload");
        assert!(json.contains("\"kind\":\"render_clip\""));
        let decoded: JobPayload = serde_json::from_str(&json).expect("deserialize payload");
        assert_eq!(decoded, payload);
    }

    #[test]
    fn validation_rejects_empty_source() {
        let payload = JobPayload::RenderClip(ClipParams {
            source_url: "  ".into(),
            start: "00:00".into(),
            end: "00:05".into(),
            style: None,
            subtitles: None,
        });
        assert!(payload.validate().is_err());
    }

    #[test]
    fn validation_rejects_null_opaque() {
        assert!(JobPayload::opaque(serde_json::Value::Null).validate().is_err());
        assert!(JobPayload::opaque(serde_json::json!({"any": 1})).validate().is_ok());
    }
}
