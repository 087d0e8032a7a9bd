use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::api_types::PickerResponse;
use crate::config::ClientConfig;
use crate::deployment::{build_url_with_query, decode, DeploymentAdapter, SearchRequest};
use crate::error::JiraError;
use crate::executor::RequestExecutor;
use crate::models::{Issue, IssueList, Page};

pub const DEFAULT_HARD_CAP: usize = 10_000;
pub const DEFAULT_DROPDOWN_CAP: usize = 200;

/// Upper bounds for multi-page aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationLimits {
    /// Never collect more than this many issues.
    pub hard_cap: usize,
    /// Default target for a bare `project = X` filter.
    pub dropdown_cap: usize,
}

impl Default for PaginationLimits {
    fn default() -> Self {
        Self {
            hard_cap: DEFAULT_HARD_CAP,
            dropdown_cap: DEFAULT_DROPDOWN_CAP,
        }
    }
}

fn simple_project_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)^\s*project\s*=\s*("[^"]+"|'[^']+'|[A-Za-z0-9_\-]+)\s*$"#)
            .expect("valid project filter pattern")
    })
}

/// True for a JQL string that is nothing but `project = KEY`.
pub fn is_simple_project_filter(jql: &str) -> bool {
    simple_project_pattern().is_match(jql)
}

/// How many issues an aggregation should collect.
pub fn resolve_target(desired: Option<usize>, jql: &str, limits: PaginationLimits) -> usize {
    match desired {
        Some(n) => n.min(limits.hard_cap),
        None if is_simple_project_filter(jql) => limits.dropdown_cap.min(limits.hard_cap),
        None => limits.hard_cap,
    }
}

/// Walks search pages for one client. Borrowed per call from `JiraClient`.
pub struct Paginator<'a> {
    executor: &'a RequestExecutor,
    adapter: &'a dyn DeploymentAdapter,
    config: &'a ClientConfig,
    limits: PaginationLimits,
}

impl<'a> Paginator<'a> {
    pub fn new(
        executor: &'a RequestExecutor,
        adapter: &'a dyn DeploymentAdapter,
        config: &'a ClientConfig,
        limits: PaginationLimits,
    ) -> Self {
        Self {
            executor,
            adapter,
            config,
            limits,
        }
    }

    pub fn fetch_page(
        &self,
        jql: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<Page<Issue>, JiraError> {
        let request = self
            .adapter
            .build_search_request(self.config, jql, cursor, page_size)?;
        let body = match &request {
            SearchRequest::Post { url, body } => self.executor.post_cached(url, body)?,
            SearchRequest::Get { url, .. } => self.executor.get(url)?,
        };
        self.adapter.parse_search_response(body, &request)
    }

    pub fn collect_issues(&self, desired: Option<usize>, jql: &str) -> Result<IssueList, JiraError> {
        let target = resolve_target(desired, jql, self.limits);
        let mut issues: Vec<Issue> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen_cursors: HashSet<String> = HashSet::new();

        while issues.len() < target {
            let remaining = target - issues.len();
            let page_size = remaining.min(self.adapter.max_page_size());
            let page = self.fetch_page(jql, cursor.as_deref(), page_size)?;
            let returned = page.items.len();
            issues.extend(page.items.into_iter().take(remaining));

            tracing::debug!(
                "jira search page returned={} collected={} target={} total={:?} next_cursor_present={}",
                returned,
                issues.len(),
                target,
                page.total,
                page.next_cursor.is_some()
            );

            if returned == 0 {
                break;
            }
            if let Some(total) = page.total {
                if issues.len() as u64 >= total {
                    break;
                }
            }
            match page.next_cursor {
                Some(next) if seen_cursors.insert(next.clone()) => cursor = Some(next),
                Some(next) => {
                    tracing::warn!(
                        "jira search cursor {} did not advance; stopping at {} issues",
                        next,
                        issues.len()
                    );
                    break;
                }
                None => break,
            }
        }

        Ok(IssueList::new(issues))
    }

    pub fn fetch_suggestions(
        &self,
        query: &str,
        project: Option<&str>,
    ) -> Result<IssueList, JiraError> {
        let current_jql = project
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| format!("project = {p}"))
            .unwrap_or_default();
        let url = build_url_with_query(
            self.config,
            "issue/picker",
            &[("query", query.to_string()), ("currentJQL", current_jql)],
        )?;

        let body = self.executor.get(&url)?;
        let payload: PickerResponse = decode(body, "issue picker")?;

        let mut seen = HashSet::new();
        let data = payload
            .sections
            .into_iter()
            .flat_map(|section| section.issues)
            .filter(|issue| seen.insert(issue.key.clone()))
            .map(|issue| issue.into_issue())
            .collect();
        Ok(IssueList::new(data))
    }
}
