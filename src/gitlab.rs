use std::time::Duration;

use anyhow::{bail, Context, Result};
use http::StatusCode;
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;

use crate::changes::RawChange;
use crate::utils::PipeMap;

mod retry;

pub(crate) use retry::{retry, Attempt, Outcome, RetryPolicy};

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// A commit as listed by the repository and merge request commit endpoints.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub(crate) struct CommitRef {
    pub id: String,
    pub parent_ids: Vec<String>,
    pub title: Option<String>,
    pub message: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProtectedBranch {
    /// Branch name or wildcard pattern such as `release-*`.
    pub name: String,
}

#[derive(Deserialize)]
struct MergeRequestChanges {
    #[serde(default)]
    changes: Vec<RawChange>,
}

#[derive(Deserialize)]
struct Comparison {
    #[serde(default)]
    diffs: Vec<RawChange>,
}

/// Filters for [`GitLab::repository_commits`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct CommitQuery<'a> {
    pub ref_name: &'a str,
    pub since: Option<&'a str>,
    pub until: Option<&'a str>,
    pub per_page: u32,
    pub page: u32,
}

impl<'a> CommitQuery<'a> {
    pub(crate) fn new(ref_name: &'a str) -> Self {
        Self {
            ref_name,
            since: None,
            until: None,
            per_page: 100,
            page: 1,
        }
    }
}

/// Thin client for the GitLab v4 REST API.
///
/// Every call reports non-success statuses as errors carrying the status and body;
/// the event handlers decide how to degrade.
#[derive(Debug)]
pub(crate) struct GitLab {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
    retry_policy: RetryPolicy,
}

impl GitLab {
    pub(crate) fn new(base_url: &str, token: SecretString, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token,
            retry_policy: RetryPolicy::default(),
        })
    }

    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    fn project_url(&self, project: u64, path: &str) -> String {
        format!("{}/api/v4/projects/{project}/{path}", self.base_url)
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.http
            .get(url)
            .header(TOKEN_HEADER, self.token.expose_secret())
    }

    fn post(&self, url: &str) -> RequestBuilder {
        self.http
            .post(url)
            .header(TOKEN_HEADER, self.token.expose_secret())
    }

    /// Send `request` and return the body if the status is `expected`.
    async fn send(&self, request: RequestBuilder, expected: StatusCode) -> Result<String> {
        let response = request.send().await.context("request to GitLab failed")?;
        let status = response.status();
        let url = response.url().clone();
        let body = response
            .text()
            .await
            .with_context(|| format!("failed to read response from {url}"))?;
        tracing::debug!("GitLab {url} responded {status}: {body}");
        if status != expected {
            bail!("GitLab {url} responded {status}: {body}");
        }
        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let body = self.send(request, StatusCode::OK).await?;
        serde_json::from_str(&body).context("unexpected GitLab response body")
    }

    pub(crate) async fn merge_request_changes(&self, project: u64, iid: u64) -> Result<Vec<RawChange>> {
        let url = self.project_url(project, &format!("merge_requests/{iid}/changes"));
        let request = self.get(&url).query(&[("access_raw_diffs", "true")]);
        let MergeRequestChanges { changes } = self.get_json(request).await?;
        Ok(changes)
    }

    pub(crate) async fn merge_request_commits(&self, project: u64, iid: u64) -> Result<Vec<CommitRef>> {
        let url = self.project_url(project, &format!("merge_requests/{iid}/commits"));
        self.get_json(self.get(&url)).await
    }

    pub(crate) async fn create_merge_request_note(
        &self,
        project: u64,
        iid: u64,
        body: &str,
    ) -> Result<()> {
        let url = self.project_url(project, &format!("merge_requests/{iid}/notes"));
        let request = self.post(&url).json(&json!({ "body": body }));
        self.send(request, StatusCode::CREATED).await?;
        Ok(())
    }

    pub(crate) async fn protected_branches(&self, project: u64) -> Result<Vec<ProtectedBranch>> {
        let url = self.project_url(project, "protected_branches");
        self.get_json(self.get(&url)).await
    }

    pub(crate) async fn repository_commits(
        &self,
        project: u64,
        query: CommitQuery<'_>,
    ) -> Result<Vec<CommitRef>> {
        let url = self.project_url(project, "repository/commits");
        let request = self
            .get(&url)
            .query(&[("ref_name", query.ref_name)])
            .pipe_map(query.since, |req, since| req.query(&[("since", since)]))
            .pipe_map(query.until, |req, until| req.query(&[("until", until)]))
            .query(&[("per_page", query.per_page), ("page", query.page)]);
        self.get_json(request).await
    }

    pub(crate) async fn compare(&self, project: u64, from: &str, to: &str) -> Result<Vec<RawChange>> {
        let url = self.project_url(project, "repository/compare");
        let request = self.get(&url).query(&[("from", from), ("to", to)]);
        let Comparison { diffs } = self.get_json(request).await?;
        Ok(diffs)
    }

    pub(crate) async fn create_commit_comment(&self, project: u64, sha: &str, note: &str) -> Result<()> {
        let url = self.project_url(project, &format!("repository/commits/{sha}/comments"));
        let request = self.post(&url).json(&json!({ "note": note }));
        self.send(request, StatusCode::CREATED).await?;
        Ok(())
    }
}
