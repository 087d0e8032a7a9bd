//! Cloud vs Server/Data-Center differences behind one [`DeploymentAdapter`].

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::api_types::{
    take_issue_array, CloudProjectSearchResponse, CloudSearchRequest, CloudSearchResponse,
    ServerProjectsResponse, ServerSearchResponse,
};
use crate::config::ClientConfig;
use crate::error::JiraError;
use crate::models::{Issue, Page, Project, WorklogComment};

pub const CLOUD_PAGE_SIZE: usize = 100;
pub const SERVER_PAGE_SIZE: usize = 1000;
pub const CLOUD_PROJECT_PAGE_SIZE: usize = 500;
pub const SEARCH_FIELDS: [&str; 3] = ["summary", "parent", "project"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentKind {
    #[default]
    Cloud,
    #[serde(alias = "datacenter", alias = "dc")]
    Server,
}

impl FromStr for DeploymentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cloud" => Ok(DeploymentKind::Cloud),
            "server" | "datacenter" | "dc" => Ok(DeploymentKind::Server),
            other => Err(format!(
                "unknown jira deployment '{other}', expected cloud or server"
            )),
        }
    }
}

impl fmt::Display for DeploymentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentKind::Cloud => f.write_str("cloud"),
            DeploymentKind::Server => f.write_str("server"),
        }
    }
}

pub fn resolve_api_version(kind: DeploymentKind) -> &'static str {
    match kind {
        DeploymentKind::Cloud => "3",
        DeploymentKind::Server => "2",
    }
}

fn api_prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^rest/api/\d+(/|$)").expect("valid api prefix pattern"))
}

/// Rewrites Cloud-shaped `rest/api/3` segments for Server deployments.
pub fn translate_legacy_path(config: &ClientConfig, path: &str) -> String {
    match config.kind() {
        DeploymentKind::Cloud => path.to_string(),
        DeploymentKind::Server => {
            path.replace("rest/api/3", &format!("rest/api/{}", config.api_version()))
        }
    }
}

/// `{host}/rest/api/{version}/{endpoint}`, where `host` keeps any context
/// path such as `/jira`. Accepts root-relative,
/// already-versioned and already-absolute paths and yields the same URL
/// for all of them, so the result is safe to use as a cache key.
pub fn build_absolute_url(config: &ClientConfig, endpoint_path: &str) -> String {
    let mut path = endpoint_path.trim();

    let under_host = path
        .strip_prefix(config.host())
        .filter(|rest| rest.is_empty() || rest.starts_with('/'));
    if let Some(rest) = under_host {
        path = rest;
    } else {
        for scheme in ["https://", "http://"] {
            if let Some(rest) = path.strip_prefix(scheme) {
                path = rest.find('/').map(|idx| &rest[idx..]).unwrap_or("");
                break;
            }
        }
    }

    let path = path.trim_start_matches('/');
    let path = match api_prefix_pattern().find(path) {
        Some(m) => &path[m.end()..],
        None => path,
    };
    let path = path.trim_start_matches('/');

    format!(
        "{}/rest/api/{}/{}",
        config.host(),
        config.api_version(),
        path
    )
}

/// `build_absolute_url` plus an encoded query string in the given order.
pub fn build_url_with_query(
    config: &ClientConfig,
    endpoint_path: &str,
    query: &[(&str, String)],
) -> Result<String, JiraError> {
    let base = build_absolute_url(config, endpoint_path);
    if query.is_empty() {
        return Ok(base);
    }
    let url = reqwest::Url::parse_with_params(&base, query)
        .map_err(|err| JiraError::invalid(format!("invalid request url '{base}': {err}")))?;
    Ok(url.to_string())
}

/// One search page request, ready for the executor.
#[derive(Debug)]
pub enum SearchRequest {
    /// Cacheable POST carrying a JSON body (Cloud).
    Post {
        url: String,
        body: CloudSearchRequest,
    },
    /// Offset-paged GET (Server).
    Get {
        url: String,
        start_at: u64,
        max_results: usize,
    },
}

pub trait DeploymentAdapter: Send + Sync + fmt::Debug {
    fn kind(&self) -> DeploymentKind;

    fn api_version(&self) -> &'static str {
        resolve_api_version(self.kind())
    }

    /// Default (and maximum) page size of the search endpoint.
    fn max_page_size(&self) -> usize;

    fn build_search_request(
        &self,
        config: &ClientConfig,
        jql: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<SearchRequest, JiraError>;

    fn parse_search_response(
        &self,
        body: Value,
        request: &SearchRequest,
    ) -> Result<Page<Issue>, JiraError>;

    fn build_projects_url(&self, config: &ClientConfig, offset: u64) -> Result<String, JiraError>;

    fn parse_projects_response(&self, body: Value, offset: u64)
        -> Result<Page<Project>, JiraError>;

    fn worklog_comment(&self, text: &str) -> WorklogComment;
}

pub fn adapter_for(kind: DeploymentKind) -> Box<dyn DeploymentAdapter> {
    match kind {
        DeploymentKind::Cloud => Box::new(CloudAdapter),
        DeploymentKind::Server => Box::new(ServerAdapter),
    }
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(body: Value, what: &str) -> Result<T, JiraError> {
    serde_json::from_value(body)
        .map_err(|err| JiraError::unexpected(200, format!("malformed {what} response: {err}")))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CloudAdapter;

impl DeploymentAdapter for CloudAdapter {
    fn kind(&self) -> DeploymentKind {
        DeploymentKind::Cloud
    }

    fn max_page_size(&self) -> usize {
        CLOUD_PAGE_SIZE
    }

    fn build_search_request(
        &self,
        config: &ClientConfig,
        jql: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<SearchRequest, JiraError> {
        Ok(SearchRequest::Post {
            url: build_absolute_url(config, "search/jql"),
            body: CloudSearchRequest {
                jql: jql.to_string(),
                max_results: page_size.clamp(1, CLOUD_PAGE_SIZE),
                fields: SEARCH_FIELDS.to_vec(),
                next_page_token: cursor.filter(|c| !c.is_empty()).map(str::to_string),
            },
        })
    }

    fn parse_search_response(
        &self,
        body: Value,
        _request: &SearchRequest,
    ) -> Result<Page<Issue>, JiraError> {
        let payload: CloudSearchResponse = decode(body, "search")?;
        let items = take_issue_array(payload.issues, payload.results).ok_or_else(|| {
            JiraError::unexpected(200, "search response has no issues or results array")
        })?;

        let next_cursor = match payload.next_page_token {
            Some(token) if !token.is_empty() && payload.is_last != Some(true) => Some(token),
            _ => None,
        };

        Ok(Page {
            items,
            total: payload.total,
            next_cursor,
        })
    }

    fn build_projects_url(&self, config: &ClientConfig, offset: u64) -> Result<String, JiraError> {
        build_url_with_query(
            config,
            "project/search",
            &[
                ("maxResults", CLOUD_PROJECT_PAGE_SIZE.to_string()),
                ("startAt", offset.to_string()),
            ],
        )
    }

    fn parse_projects_response(
        &self,
        body: Value,
        offset: u64,
    ) -> Result<Page<Project>, JiraError> {
        let payload: CloudProjectSearchResponse = decode(body, "project search")?;
        let start_at = payload.start_at.unwrap_or(offset);
        let items: Vec<Project> = payload.values.into_iter().map(Project::from).collect();
        let seen = start_at + items.len() as u64;

        let more = match (payload.is_last, payload.total) {
            (Some(is_last), _) => !is_last,
            (None, Some(total)) => seen < total,
            (None, None) => false,
        };

        Ok(Page {
            next_cursor: (more && !items.is_empty()).then(|| seen.to_string()),
            items,
            total: payload.total,
        })
    }

    fn worklog_comment(&self, text: &str) -> WorklogComment {
        WorklogComment::document(text)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ServerAdapter;

impl DeploymentAdapter for ServerAdapter {
    fn kind(&self) -> DeploymentKind {
        DeploymentKind::Server
    }

    fn max_page_size(&self) -> usize {
        SERVER_PAGE_SIZE
    }

    fn build_search_request(
        &self,
        config: &ClientConfig,
        jql: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<SearchRequest, JiraError> {
        let start_at = match cursor.map(str::trim).filter(|c| !c.is_empty()) {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                JiraError::invalid(format!("server cursor must be a numeric offset, got '{raw}'"))
            })?,
            None => 0,
        };
        let max_results = page_size.clamp(1, SERVER_PAGE_SIZE);

        let url = build_url_with_query(
            config,
            &translate_legacy_path(config, "/rest/api/3/search"),
            &[
                ("jql", jql.to_string()),
                ("fields", SEARCH_FIELDS.join(",")),
                ("maxResults", max_results.to_string()),
                ("startAt", start_at.to_string()),
            ],
        )?;

        Ok(SearchRequest::Get {
            url,
            start_at,
            max_results,
        })
    }

    fn parse_search_response(
        &self,
        body: Value,
        request: &SearchRequest,
    ) -> Result<Page<Issue>, JiraError> {
        let (requested_start, max_results) = match request {
            SearchRequest::Get {
                start_at,
                max_results,
                ..
            } => (*start_at, *max_results),
            SearchRequest::Post { body: post, .. } => (0, post.max_results),
        };

        let payload: ServerSearchResponse = decode(body, "search")?;
        let items = take_issue_array(payload.issues, payload.results).ok_or_else(|| {
            JiraError::unexpected(200, "search response has no issues or results array")
        })?;

        let start_at = payload.start_at.unwrap_or(requested_start);
        let returned = items.len();
        let next_offset = start_at + returned as u64;
        let more = match payload.total {
            Some(total) => next_offset < total,
            None => returned >= max_results,
        };

        Ok(Page {
            next_cursor: (more && returned > 0).then(|| next_offset.to_string()),
            items,
            total: payload.total,
        })
    }

    fn build_projects_url(&self, config: &ClientConfig, _offset: u64) -> Result<String, JiraError> {
        Ok(build_absolute_url(config, "project"))
    }

    fn parse_projects_response(
        &self,
        body: Value,
        offset: u64,
    ) -> Result<Page<Project>, JiraError> {
        let payload: ServerProjectsResponse = decode(body, "project list")?;
        let total = payload.len() as u64;
        let items = payload
            .into_iter()
            .skip(offset as usize)
            .map(Project::from)
            .collect();

        Ok(Page {
            items,
            total: Some(total),
            next_cursor: None,
        })
    }

    fn worklog_comment(&self, text: &str) -> WorklogComment {
        WorklogComment::Text(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn cloud() -> ClientConfig {
        ClientConfig::new(DeploymentKind::Cloud, "acme.atlassian.net", "me", "t").expect("cfg")
    }

    fn server() -> ClientConfig {
        ClientConfig::new(DeploymentKind::Server, "jira.acme.local", "me", "t").expect("cfg")
    }

    fn strip_host<'a>(config: &ClientConfig, url: &'a str) -> &'a str {
        url.strip_prefix(config.host()).expect("url starts with host")
    }

    #[test]
    fn resolves_api_versions() {
        assert_eq!(resolve_api_version(DeploymentKind::Cloud), "3");
        assert_eq!(resolve_api_version(DeploymentKind::Server), "2");
        assert_eq!(CloudAdapter.api_version(), "3");
        assert_eq!(ServerAdapter.api_version(), "2");
    }

    #[test]
    fn builds_same_url_for_every_path_shape() {
        let cfg = cloud();
        let expected = "https://acme.atlassian.net/rest/api/3/issue/ABC-1";
        for path in [
            "issue/ABC-1",
            "/issue/ABC-1",
            "//issue/ABC-1",
            "/rest/api/3/issue/ABC-1",
            "rest/api/2/issue/ABC-1",
            "https://acme.atlassian.net/rest/api/3/issue/ABC-1",
        ] {
            assert_eq!(build_absolute_url(&cfg, path), expected, "path {path}");
        }
    }

    #[test]
    fn url_construction_is_idempotent() {
        for cfg in [cloud(), server()] {
            for path in ["myself", "/rest/api/3/search?jql=a", "issue/X-1/worklog", ""] {
                let once = build_absolute_url(&cfg, path);
                let twice = build_absolute_url(&cfg, &once);
                assert_eq!(once, twice);
                let relative = strip_host(&cfg, &once);
                assert_eq!(build_absolute_url(&cfg, relative), once);
            }
        }
    }

    #[test]
    fn keeps_host_context_path() {
        let cfg = ClientConfig::new(
            DeploymentKind::Server,
            "https://corp.example.com/jira/",
            "me",
            "t",
        )
        .expect("cfg");
        let expected = "https://corp.example.com/jira/rest/api/2/issue/ABC-1";

        assert_eq!(cfg.host(), "https://corp.example.com/jira");
        for path in ["issue/ABC-1", "/rest/api/3/issue/ABC-1", expected] {
            assert_eq!(build_absolute_url(&cfg, path), expected, "path {path}");
        }
        let once = build_absolute_url(&cfg, "myself");
        assert_eq!(once, "https://corp.example.com/jira/rest/api/2/myself");
        assert_eq!(build_absolute_url(&cfg, &once), once);
        assert_eq!(
            build_url_with_query(&cfg, "project", &[("startAt", "0".to_string())]).expect("url"),
            "https://corp.example.com/jira/rest/api/2/project?startAt=0"
        );
    }

    #[test]
    fn server_translates_cloud_shaped_paths() {
        assert_eq!(
            translate_legacy_path(&server(), "/rest/api/3/issue/ABC-1"),
            "/rest/api/2/issue/ABC-1"
        );
        assert_eq!(
            translate_legacy_path(&cloud(), "/rest/api/3/issue/ABC-1"),
            "/rest/api/3/issue/ABC-1"
        );
        assert_eq!(
            build_absolute_url(&server(), "/rest/api/3/issue/ABC-1"),
            "https://jira.acme.local/rest/api/2/issue/ABC-1"
        );
    }

    #[test]
    fn parses_deployment_kind() {
        assert_eq!("Cloud".parse::<DeploymentKind>(), Ok(DeploymentKind::Cloud));
        assert_eq!("dc".parse::<DeploymentKind>(), Ok(DeploymentKind::Server));
        assert!("other".parse::<DeploymentKind>().is_err());
        assert_eq!(DeploymentKind::Server.to_string(), "server");
    }

    #[test]
    fn cloud_search_request_caps_page_size_and_carries_token() {
        let request = CloudAdapter
            .build_search_request(&cloud(), "project = X", Some("tok"), 500)
            .expect("request");
        match request {
            SearchRequest::Post { url, body } => {
                assert_eq!(url, "https://acme.atlassian.net/rest/api/3/search/jql");
                assert_eq!(body.max_results, 100);
                assert_eq!(body.next_page_token.as_deref(), Some("tok"));
                assert_eq!(body.fields, vec!["summary", "parent", "project"]);
            }
            other => panic!("expected POST, got {other:?}"),
        }
    }

    #[test]
    fn server_search_request_uses_offset_cursor() {
        let request = ServerAdapter
            .build_search_request(&server(), "project = X", Some("200"), 50)
            .expect("request");
        match request {
            SearchRequest::Get {
                url,
                start_at,
                max_results,
            } => {
                assert_eq!(start_at, 200);
                assert_eq!(max_results, 50);
                assert!(url.starts_with("https://jira.acme.local/rest/api/2/search?jql=project"));
                assert!(url.ends_with("&fields=summary%2Cparent%2Cproject&maxResults=50&startAt=200"));
            }
            other => panic!("expected GET, got {other:?}"),
        }

        let err = ServerAdapter
            .build_search_request(&server(), "x", Some("tok"), 50)
            .expect_err("non numeric cursor");
        assert!(matches!(err, JiraError::Validation { status: None, .. }));
    }

    #[test]
    fn cloud_search_response_ends_on_last_page() {
        let request = CloudAdapter
            .build_search_request(&cloud(), "x", None, 100)
            .expect("request");
        let page = CloudAdapter
            .parse_search_response(
                json!({"issues": [{"key": "X-1", "fields": {"summary": "a"}}], "nextPageToken": "t2", "isLast": true}),
                &request,
            )
            .expect("page");
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next_cursor, None);

        let err = CloudAdapter
            .parse_search_response(json!({"nextPageToken": "t2"}), &request)
            .expect_err("missing issues");
        assert!(matches!(err, JiraError::UnexpectedResponse { .. }));
    }

    #[test]
    fn server_search_response_computes_next_offset() {
        let request = ServerAdapter
            .build_search_request(&server(), "x", Some("100"), 100)
            .expect("request");
        let issues: Vec<Value> = (0..100)
            .map(|i| json!({"key": format!("X-{i}"), "fields": {}}))
            .collect();

        let page = ServerAdapter
            .parse_search_response(
                json!({"startAt": 100, "maxResults": 100, "total": 250, "issues": issues}),
                &request,
            )
            .expect("page");
        assert_eq!(page.next_cursor.as_deref(), Some("200"));
        assert_eq!(page.total, Some(250));

        let last = ServerAdapter
            .parse_search_response(
                json!({"startAt": 200, "total": 201, "results": [{"key": "X-200"}]}),
                &request,
            )
            .expect("page");
        assert_eq!(last.next_cursor, None);
    }

    #[test]
    fn project_pages_differ_by_deployment() {
        let page = CloudAdapter
            .parse_projects_response(
                json!({"startAt": 0, "total": 2, "isLast": false, "values": [{"key": "A", "name": "Alpha"}]}),
                0,
            )
            .expect("cloud");
        assert_eq!(page.next_cursor.as_deref(), Some("1"));

        let page = ServerAdapter
            .parse_projects_response(
                json!([{"key": "A", "name": "Alpha"}, {"key": "B", "name": "Beta"}]),
                1,
            )
            .expect("server");
        assert_eq!(page.items, vec![Project { key: "B".into(), name: Some("Beta".into()) }]);
        assert_eq!(page.total, Some(2));
        assert_eq!(page.next_cursor, None);

        assert_eq!(
            CloudAdapter.build_projects_url(&cloud(), 500).expect("url"),
            "https://acme.atlassian.net/rest/api/3/project/search?maxResults=500&startAt=500"
        );
        assert_eq!(
            ServerAdapter.build_projects_url(&server(), 0).expect("url"),
            "https://jira.acme.local/rest/api/2/project"
        );
    }

    #[test]
    fn worklog_comment_shape_follows_deployment() {
        assert!(matches!(
            CloudAdapter.worklog_comment("hi"),
            WorklogComment::Document(_)
        ));
        assert_eq!(
            ServerAdapter.worklog_comment("hi"),
            WorklogComment::Text("hi".into())
        );
    }
}
