//! Narrow view of a report record used for fingerprinting.

use serde_json::Value;

use crate::error::{ModelError, Result};

/// Topic and concatenated response text of one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportContent {
    pub topic_id: String,
    pub text: String,
}

/// Extracts [`ReportContent`] from a parsed record.
pub trait ReportReader {
    fn read(&self, record: &Value) -> Result<ReportContent>;
}

/// Reads the standard report layout.
///
/// The topic comes from `metadata.topic_id` or `metadata.narrative_id`
/// (integers are accepted and rendered as strings; when both are present
/// they must agree). Response text is the `text` of each element of the
/// top-level `responses` array (or `answer` when `responses` is absent),
/// joined by single spaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportReader;

impl ReportReader for JsonReportReader {
    fn read(&self, record: &Value) -> Result<ReportContent> {
        let metadata = record
            .get("metadata")
            .and_then(Value::as_object)
            .ok_or_else(|| ModelError::ReportContent("missing metadata object".to_string()))?;

        let topic_id = identifier(metadata.get("topic_id"))?;
        let narrative_id = identifier(metadata.get("narrative_id"))?;
        let topic_id = match (topic_id, narrative_id) {
            (Some(topic), Some(narrative)) if topic != narrative => {
                return Err(ModelError::ReportContent(format!(
                    "topic_id '{topic}' disagrees with narrative_id '{narrative}'"
                )));
            }
            (Some(topic), _) => topic,
            (None, Some(narrative)) => narrative,
            (None, None) => {
                return Err(ModelError::ReportContent("missing topic_id".to_string()));
            }
        };

        let responses = record
            .get("responses")
            .or_else(|| record.get("answer"))
            .and_then(Value::as_array)
            .ok_or_else(|| ModelError::ReportContent("missing responses".to_string()))?;
        let mut texts = Vec::with_capacity(responses.len());
        for response in responses {
            let text = response
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| ModelError::ReportContent("response without text".to_string()))?;
            texts.push(text);
        }

        Ok(ReportContent {
            topic_id,
            text: texts.join(" "),
        })
    }
}

fn identifier(value: Option<&Value>) -> Result<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(Value::Number(number)) if number.is_i64() || number.is_u64() => {
            Ok(Some(number.to_string()))
        }
        Some(other) => Err(ModelError::ReportContent(format!("topic identifier is {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_topic_and_joins_text() {
        let record = json!({
            "metadata": {"team_id": "t", "run_id": "r", "topic_id": "101"},
            "responses": [{"text": "first"}, {"text": "second"}]
        });
        let content = JsonReportReader.read(&record).expect("content");
        assert_eq!(content.topic_id, "101");
        assert_eq!(content.text, "first second");
    }

    #[test]
    fn accepts_integer_narrative_and_answer_alias() {
        let record = json!({
            "metadata": {"narrative_id": 7},
            "answer": [{"text": "only", "citations": []}]
        });
        let content = JsonReportReader.read(&record).expect("content");
        assert_eq!(content.topic_id, "7");
        assert_eq!(content.text, "only");
    }

    #[test]
    fn disagreeing_identifiers_fail() {
        let record = json!({
            "metadata": {"topic_id": "1", "narrative_id": "2"},
            "responses": []
        });
        assert!(JsonReportReader.read(&record).is_err());
    }

    #[test]
    fn missing_responses_fail() {
        let record = json!({"metadata": {"topic_id": "1"}});
        assert!(JsonReportReader.read(&record).is_err());
    }
}
