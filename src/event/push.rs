use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{event_name, lenient, lenient_field, lenient_nested, Parsed};
use crate::constants::{BRANCH_REF_PREFIX, PUSH_KIND};

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
struct ProjectRef {
    id: Option<u64>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub(crate) struct CommitAuthor {
    pub name: Option<String>,
}

/// One entry of a push hook's `commits`, newest first.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub(crate) struct PushCommit {
    pub id: Option<String>,
    pub message: Option<String>,
    pub timestamp: Option<String>,
    pub url: Option<String>,
    #[serde(deserialize_with = "lenient_nested")]
    pub author: Option<CommitAuthor>,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CommitSummary {
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub timestamp: Option<String>,
    pub url: Option<String>,
}

impl From<&PushCommit> for CommitSummary {
    fn from(commit: &PushCommit) -> Self {
        CommitSummary {
            message: commit.message.clone(),
            author: commit.author.as_ref().and_then(|a| a.name.clone()),
            timestamp: commit.timestamp.clone(),
            url: commit.url.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PushEvent {
    pub project_id: Option<u64>,
    pub branch_name: String,
    pub before: Option<String>,
    pub after: Option<String>,
    pub commits: Vec<PushCommit>,
}

impl PushEvent {
    pub(crate) fn parse(payload: &Value) -> Parsed<Self> {
        match event_name(payload) {
            Some(PUSH_KIND) => {
                let project_id: Option<u64> = lenient_field(payload, "project_id");
                let project: Option<ProjectRef> = lenient_field(payload, "project");
                let git_ref: Option<String> = lenient_field(payload, "ref");
                let commits = lenient_field::<Vec<Value>>(payload, "commits")
                    .iter()
                    .map(lenient)
                    .collect();
                Parsed::Event(Self {
                    project_id: project_id.or(project.and_then(|p| p.id)),
                    branch_name: git_ref
                        .as_deref()
                        .map(|r| r.strip_prefix(BRANCH_REF_PREFIX).unwrap_or(r))
                        .unwrap_or_default()
                        .to_owned(),
                    before: lenient_field(payload, "before"),
                    after: lenient_field(payload, "after"),
                    commits,
                })
            }
            kind => Parsed::Ignored {
                kind: kind.map(ToOwned::to_owned),
            },
        }
    }

    pub(crate) fn commit_summaries(&self) -> Vec<CommitSummary> {
        self.commits.iter().map(CommitSummary::from).collect()
    }
}
