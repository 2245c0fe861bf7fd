//! JSON output formatting

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Wrapper for JSON output with metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T> {
    /// The actual data
    pub data: T,

    /// Metadata about the response
    pub meta: Metadata,
}

/// Metadata included in JSON output
#[derive(Debug, Serialize, Deserialize)]
pub struct Metadata {
    /// Timestamp of the response
    pub timestamp: String,

    /// CLI version
    pub version: String,
}

impl<T> JsonOutput<T> {
    /// Create a new JSON output with metadata
    pub fn new(data: T) -> Self {
        Self {
            data,
            meta: Metadata {
                timestamp: Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }
}

/// Format data as pretty-printed JSON
pub fn format_json<T: Serialize + ?Sized>(data: &T) -> Result<String, serde_json::Error> {
    let output = JsonOutput::new(data);
    serde_json::to_string_pretty(&output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Clone)]
    struct LessonRow {
        lesson_id: String,
        progress: u32,
    }

    #[test]
    fn test_envelope_carries_version() {
        let output = JsonOutput::new(vec!["html-1", "html-2"]);

        assert_eq!(output.data, vec!["html-1", "html-2"]);
        assert_eq!(output.meta.version, env!("CARGO_PKG_VERSION"));
        assert!(!output.meta.timestamp.is_empty());
    }

    #[test]
    fn test_format_json_rows() {
        let rows = vec![LessonRow {
            lesson_id: "css-3".to_string(),
            progress: 75,
        }];

        let result = format_json(&rows).unwrap();

        assert!(result.contains("\"data\""));
        assert!(result.contains("\"lesson_id\": \"css-3\""));
        assert!(result.contains("\"progress\": 75"));
        assert!(result.contains("\"timestamp\""));
    }

    #[test]
    fn test_format_json_empty_vec() {
        let rows: Vec<LessonRow> = vec![];
        let result = format_json(&rows).unwrap();

        assert!(result.contains("\"data\": []"));
    }

    #[test]
    fn test_format_json_single_object() {
        let result = format_json(&serde_json::json!({"completed": 1, "total": 2})).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["data"]["total"], 2);
    }
}
