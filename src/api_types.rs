//! Upstream response and request shapes, one type per Jira payload.
//!
//! Nothing here leaves the crate; every shape is converted into the
//! normalized types in [`crate::models`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{
    Author, CurrentUser, Issue, IssueFields, Project, Worklog, WorklogComment, WorklogList,
    WorklogPage,
};

// ============================================================================
// Shared nested shapes
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiUser {
    account_id: Option<String>,
    name: Option<String>,
    display_name: Option<String>,
    email_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiProject {
    key: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiWorklog {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    time_spent_seconds: Option<u64>,
    #[serde(default)]
    started: Option<String>,
    #[serde(default)]
    comment: Option<Value>,
    #[serde(default)]
    author: Option<ApiUser>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiWorklogContainer {
    #[serde(default)]
    worklogs: Vec<ApiWorklog>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiIssueFields {
    summary: Option<String>,
    project: Option<ApiProject>,
    worklog: Option<ApiWorklogContainer>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiIssue {
    key: String,
    #[serde(default)]
    fields: ApiIssueFields,
}

// ============================================================================
// Search: Cloud `POST search/jql` and Server `GET search`
// ============================================================================

/// Body of a Cloud `search/jql` request. Field order is fixed so the
/// serialized form can serve as a cache key.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudSearchRequest {
    pub jql: String,
    pub max_results: usize,
    pub fields: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CloudSearchResponse {
    pub issues: Option<Vec<ApiIssue>>,
    pub results: Option<Vec<ApiIssue>>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub is_last: Option<bool>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerSearchResponse {
    #[serde(default)]
    pub start_at: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
    pub issues: Option<Vec<ApiIssue>>,
    pub results: Option<Vec<ApiIssue>>,
}

// ============================================================================
// Projects: Cloud `project/search` (paged) and Server `project` (array)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CloudProjectSearchResponse {
    #[serde(default)]
    pub start_at: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub is_last: Option<bool>,
    pub values: Vec<ApiProject>,
}

pub(crate) type ServerProjectsResponse = Vec<ApiProject>;

// ============================================================================
// Issue picker
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct PickerResponse {
    #[serde(default)]
    pub sections: Vec<PickerSection>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PickerSection {
    #[serde(default)]
    pub issues: Vec<PickerIssue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PickerIssue {
    pub key: String,
    #[serde(default)]
    pub summary_text: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

// ============================================================================
// Worklogs
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct ApiWorklogPage {
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    worklogs: Vec<ApiWorklog>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorklogCreateRequest {
    pub time_spent_seconds: u64,
    pub started: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<Value>,
}

// ============================================================================
// Conversions to normalized types
// ============================================================================

impl From<ApiUser> for CurrentUser {
    fn from(user: ApiUser) -> Self {
        CurrentUser {
            account_id: user.account_id,
            name: user.name,
            display_name: user.display_name,
            email_address: user.email_address,
        }
    }
}

impl From<ApiUser> for Author {
    fn from(user: ApiUser) -> Self {
        Author {
            account_id: user.account_id,
            name: user.name,
            display_name: user.display_name,
        }
    }
}

impl From<ApiProject> for Project {
    fn from(project: ApiProject) -> Self {
        Project {
            key: project.key,
            name: project.name,
        }
    }
}

impl From<ApiWorklog> for Worklog {
    fn from(worklog: ApiWorklog) -> Self {
        let comment = worklog.comment.and_then(|value| match value {
            Value::Null => None,
            Value::String(text) => Some(WorklogComment::Text(text)),
            other => Some(WorklogComment::Document(other)),
        });
        Worklog {
            id: worklog.id,
            time_spent_seconds: worklog.time_spent_seconds.unwrap_or(0),
            started: worklog.started,
            comment,
            author: worklog.author.map(Author::from),
        }
    }
}

impl From<ApiIssue> for Issue {
    fn from(issue: ApiIssue) -> Self {
        let f = issue.fields;
        Issue {
            key: issue.key,
            fields: IssueFields {
                summary: f.summary,
                project: f.project.map(Project::from),
                worklog: WorklogList {
                    worklogs: f
                        .worklog
                        .unwrap_or_default()
                        .worklogs
                        .into_iter()
                        .map(Worklog::from)
                        .collect(),
                },
            },
        }
    }
}

impl From<ApiWorklogPage> for WorklogPage {
    fn from(page: ApiWorklogPage) -> Self {
        let worklogs: Vec<Worklog> = page.worklogs.into_iter().map(Worklog::from).collect();
        WorklogPage {
            total: page.total.unwrap_or(worklogs.len() as u64),
            worklogs,
        }
    }
}

impl PickerIssue {
    pub(crate) fn into_issue(self) -> Issue {
        Issue {
            key: self.key,
            fields: IssueFields {
                summary: self.summary_text.or(self.summary),
                project: None,
                worklog: WorklogList::default(),
            },
        }
    }
}

/// Picks the issue array out of a search response; either key is accepted.
pub(crate) fn take_issue_array(
    issues: Option<Vec<ApiIssue>>,
    results: Option<Vec<ApiIssue>>,
) -> Option<Vec<Issue>> {
    issues
        .or(results)
        .map(|items| items.into_iter().map(Issue::from).collect())
}
