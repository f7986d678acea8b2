//! Response validation.

use serde::Deserialize;
use tracing::warn;

use roboseg_models::{validate_segment_times, ActionSegment, SegmentationResult};

use crate::error::{PipelineError, PipelineResult};

/// The model's output: segments only, nothing else.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelOutput {
    action_segments: Vec<ActionSegment>,
}

/// Strip a surrounding markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

/// Parse and validate raw model text into a [`SegmentationResult`].
///
/// With `strict` set, every segment's times must be `HH:MM:SS.mmm` and
/// `start_time` must not be after `end_time`.
pub fn parse_segmentation(raw: &str, strict: bool) -> PipelineResult<SegmentationResult> {
    let value: serde_json::Value =
        serde_json::from_str(strip_code_fence(raw)).map_err(|e| {
            warn!(raw_response = %raw, "Model response is not valid JSON: {}", e);
            PipelineError::MalformedJson {
                message: e.to_string(),
                raw: raw.to_string(),
            }
        })?;

    let output: ModelOutput = serde_json::from_value(value).map_err(|e| {
        warn!(raw_response = %raw, "Model response does not match schema: {}", e);
        PipelineError::schema_validation(e.to_string())
    })?;

    if strict {
        for (index, segment) in output.action_segments.iter().enumerate() {
            validate_segment_times(&segment.start_time, &segment.end_time).map_err(|e| {
                PipelineError::schema_validation(format!("action_segments[{}]: {}", index, e))
            })?;
        }
    }

    Ok(SegmentationResult::new(output.action_segments))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SEGMENTS: &str = r#"{"action_segments": [
        {"action": "robot grasps cup", "start_time": "00:00:01.000", "end_time": "00:00:03.500"},
        {"action": "robot places cup on tray", "start_time": "00:00:04.000", "end_time": "00:00:06.250"}
    ]}"#;

    #[test]
    fn test_parse_valid_response() {
        let result = parse_segmentation(TWO_SEGMENTS, false).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.action_segments[1].action, "robot places cup on tray");
        assert!(result.downloaded_video_path.is_none());
    }

    #[test]
    fn test_parse_empty_segments() {
        let result = parse_segmentation(r#"{"action_segments": []}"#, true).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_parse_fenced_response() {
        let fenced = format!("```json\n{}\n```", TWO_SEGMENTS);
        assert_eq!(parse_segmentation(&fenced, false).unwrap().len(), 2);
    }

    #[test]
    fn test_malformed_json_keeps_raw_text() {
        let err = parse_segmentation("Sure! Here are the segments:", false).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
        match err {
            PipelineError::MalformedJson { raw, .. } => {
                assert_eq!(raw, "Sure! Here are the segments:")
            }
            other => panic!("expected MalformedJson, got {:?}", other),
        }
    }

    #[test]
    fn test_schema_violations() {
        let cases = [
            r#"{"segments": []}"#,
            r#"{"action_segments": {}}"#,
            r#"{"action_segments": [{"action": "a", "start_time": "00:00:01.000"}]}"#,
            r#"{"action_segments": [{"action": 1, "start_time": "x", "end_time": "y"}]}"#,
            r#"{"action_segments": [], "downloaded_video_path": "uploads/x.mp4"}"#,
            r#"{"action_segments": [{"action": "a", "start_time": "x", "end_time": "y", "confidence": 0.9}]}"#,
            r#"[]"#,
        ];

        for case in cases {
            let err = parse_segmentation(case, false).unwrap_err();
            assert_eq!(err.kind(), "schema_validation", "case: {}", case);
        }
    }

    #[test]
    fn test_timestamps_opaque_unless_strict() {
        let loose = r#"{"action_segments": [{"action": "a", "start_time": "5s", "end_time": "1s"}]}"#;
        assert!(parse_segmentation(loose, false).is_ok());

        let err = parse_segmentation(loose, true).unwrap_err();
        assert_eq!(err.kind(), "schema_validation");
        assert!(err.to_string().contains("action_segments[0]"));

        let reversed = r#"{"action_segments": [{"action": "a", "start_time": "00:00:05.000", "end_time": "00:00:01.000"}]}"#;
        assert!(parse_segmentation(reversed, true).is_err());
    }
}
