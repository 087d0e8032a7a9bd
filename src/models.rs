//! Normalized payloads returned to callers, identical for Cloud and Server.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub account_id: Option<String>,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub email_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub key: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    pub fields: IssueFields,
}

impl Issue {
    pub fn summary(&self) -> Option<&str> {
        self.fields.summary.as_deref()
    }

    pub fn worklogs(&self) -> &[Worklog] {
        &self.fields.worklog.worklogs
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueFields {
    pub summary: Option<String>,
    pub project: Option<Project>,
    pub worklog: WorklogList,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorklogList {
    pub worklogs: Vec<Worklog>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub account_id: Option<String>,
    pub name: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worklog {
    pub id: Option<String>,
    pub time_spent_seconds: u64,
    pub started: Option<String>,
    pub comment: Option<WorklogComment>,
    pub author: Option<Author>,
}

/// Server sends comments as plain strings, Cloud as rich documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorklogComment {
    Text(String),
    Document(Value),
}

impl WorklogComment {
    /// Minimal single-paragraph rich document wrapping `text`.
    pub fn document(text: &str) -> Self {
        WorklogComment::Document(json!({
            "type": "doc",
            "version": 1,
            "content": [{
                "type": "paragraph",
                "content": [{"type": "text", "text": text}]
            }]
        }))
    }

    pub fn plain_text(&self) -> String {
        match self {
            WorklogComment::Text(text) => text.clone(),
            WorklogComment::Document(doc) => extract_text(doc),
        }
    }

    pub(crate) fn into_value(self) -> Value {
        match self {
            WorklogComment::Text(text) => Value::String(text),
            WorklogComment::Document(doc) => doc,
        }
    }
}

fn extract_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(extract_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => {
            if let Some(Value::String(text)) = map.get("text") {
                return text.clone();
            }

            match (map.get("type").and_then(Value::as_str), map.get("content")) {
                (Some("paragraph"), Some(Value::Array(inline))) => inline
                    .iter()
                    .map(extract_text)
                    .collect::<Vec<_>>()
                    .concat(),
                (_, Some(content)) => extract_text(content),
                _ => String::new(),
            }
        }
        _ => String::new(),
    }
}

/// A single page of a list endpoint. `next_cursor` is an opaque token on
/// Cloud and a numeric offset on Server; `None` means no further pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: Option<u64>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueList {
    pub total: u64,
    pub data: Vec<Issue>,
}

impl IssueList {
    pub fn new(data: Vec<Issue>) -> Self {
        Self {
            total: data.len() as u64,
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorklogPage {
    pub total: u64,
    pub worklogs: Vec<Worklog>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_comment_round_trips_to_plain_text() {
        let comment = WorklogComment::document("Reviewed PR");
        assert_eq!(comment.plain_text(), "Reviewed PR");
        assert_eq!(
            comment.into_value(),
            json!({"type": "doc", "version": 1, "content": [{"type": "paragraph", "content": [{"type": "text", "text": "Reviewed PR"}]}]})
        );
    }

    #[test]
    fn flattens_multi_paragraph_documents() {
        let doc = WorklogComment::Document(json!({
            "type": "doc",
            "content": [
                {"type": "paragraph", "content": [{"type": "text", "text": "Fix "}, {"type": "text", "text": "cache"}]},
                {"type": "paragraph", "content": [{"type": "text", "text": "Line two"}]}
            ]
        }));
        assert_eq!(doc.plain_text(), "Fix cache\nLine two");
    }

    #[test]
    fn untagged_comment_deserializes_both_shapes() {
        let text: WorklogComment = serde_json::from_value(json!("plain")).expect("text");
        assert_eq!(text, WorklogComment::Text("plain".into()));

        let doc: WorklogComment =
            serde_json::from_value(json!({"type": "doc", "content": []})).expect("doc");
        assert!(matches!(doc, WorklogComment::Document(_)));
    }

    #[test]
    fn issue_list_counts_data() {
        let list = IssueList::new(vec![Issue {
            key: "ABC-1".into(),
            fields: IssueFields::default(),
        }]);
        assert_eq!(list.total, 1);
        assert_eq!(list.data[0].summary(), None);
        assert!(list.data[0].worklogs().is_empty());
    }
}
