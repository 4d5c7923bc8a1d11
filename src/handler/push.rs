use serde_json::Value;

use crate::changes::RawChange;
use crate::constants::is_null_sha;
use crate::event::{CommitSummary, Parsed, PushEvent};
use crate::gitlab::{CommitQuery, GitLab};

/// What a push did to its branch, judged from the `before`/`after` pointers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PushRange {
    /// `before` is the null sha: the branch was just created.
    Creation { after: String },
    /// `after` is the null sha: the branch was deleted.
    Deletion,
    Update { before: String, after: String },
}

impl PushRange {
    /// `None` if either pointer is missing or blank.
    pub(crate) fn classify(before: Option<&str>, after: Option<&str>) -> Option<Self> {
        let before = before.map(str::trim).filter(|s| !s.is_empty())?;
        let after = after.map(str::trim).filter(|s| !s.is_empty())?;
        Some(if is_null_sha(after) {
            PushRange::Deletion
        } else if is_null_sha(before) {
            PushRange::Creation {
                after: after.to_owned(),
            }
        } else {
            PushRange::Update {
                before: before.to_owned(),
                after: after.to_owned(),
            }
        })
    }
}

pub(crate) struct PushHandler<'a> {
    gitlab: &'a GitLab,
    event: Parsed<PushEvent>,
}

impl<'a> PushHandler<'a> {
    pub(crate) fn new(payload: &Value, gitlab: &'a GitLab) -> Self {
        Self {
            gitlab,
            event: PushEvent::parse(payload),
        }
    }

    pub(crate) fn event(&self) -> Option<&PushEvent> {
        self.event.event()
    }

    fn push_event(&self, operation: &str) -> Option<&PushEvent> {
        if let Parsed::Ignored { kind } = &self.event {
            tracing::warn!("Invalid event type: {kind:?}. Only 'push' events support {operation}.");
        }
        self.event()
    }

    pub(crate) fn commit_summaries(&self) -> Vec<CommitSummary> {
        let Some(event) = self.push_event("collecting commits") else {
            return Vec::new();
        };
        let summaries = event.commit_summaries();
        tracing::info!("Collected {} commits from push event", summaries.len());
        summaries
    }

    /// The file changes introduced by this push.
    ///
    /// Branch deletions yield nothing. For a new branch the range starts at the parent
    /// of the first pushed commit, or at the null sha if that commit is a root.
    pub(crate) async fn resolve_diff_range(&self) -> Vec<RawChange> {
        let Some(event) = self.push_event("resolving changes") else {
            return Vec::new();
        };
        if event.commits.is_empty() {
            tracing::info!("No commits found in push event");
            return Vec::new();
        }
        let Some(range) = PushRange::classify(event.before.as_deref(), event.after.as_deref())
        else {
            tracing::info!("Push event lacks before/after commits, nothing to compare");
            return Vec::new();
        };
        let Some(project) = event.project_id else {
            tracing::warn!("Push event lacks a project id, cannot resolve changes");
            return Vec::new();
        };
        let (before, after) = match range {
            PushRange::Deletion => {
                tracing::info!("Branch {} was deleted, nothing to compare", event.branch_name);
                return Vec::new();
            }
            PushRange::Update { before, after } => (before, after),
            PushRange::Creation { after } => {
                let first = event.commits[0].id.as_deref().unwrap_or_default();
                let before = match self.lookup_parent_commit(first).await {
                    Some(parent) => parent,
                    None => event.before.clone().unwrap_or_default(),
                };
                (before, after)
            }
        };
        self.gitlab
            .compare(project, &before, &after)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to compare {before}...{after}: {e:#}");
                Vec::new()
            })
    }

    /// First parent of `sha`, looked up through the repository commit listing.
    pub(crate) async fn lookup_parent_commit(&self, sha: &str) -> Option<String> {
        let project = self.event()?.project_id?;
        if sha.is_empty() {
            return None;
        }
        let query = CommitQuery {
            per_page: 1,
            page: 1,
            ..CommitQuery::new(sha)
        };
        match self.gitlab.repository_commits(project, query).await {
            Ok(commits) => commits.into_iter().next()?.parent_ids.into_iter().next(),
            Err(e) => {
                tracing::warn!("Failed to get commits for ref {sha}: {e:#}");
                None
            }
        }
    }

    /// Comment on the newest commit of the push, which is `after`.
    ///
    /// `commits` is ordered newest first, so its last element is the oldest commit.
    pub(crate) async fn post_comment(&self, message: &str) {
        let Some(event) = self.push_event("posting comments") else {
            return;
        };
        let Some(sha) = event.after.as_deref().filter(|s| !s.is_empty()) else {
            tracing::error!("Last commit id not found in the webhook's 'after' field");
            return;
        };
        let Some(project) = event.project_id else {
            tracing::error!("Push event lacks a project id, cannot comment on {sha}");
            return;
        };
        match self.gitlab.create_commit_comment(project, sha, message).await {
            Ok(()) => tracing::info!("Comment successfully added to commit {sha}"),
            Err(e) => tracing::error!("Failed to add comment to commit {sha}: {e:#}"),
        }
    }
}
