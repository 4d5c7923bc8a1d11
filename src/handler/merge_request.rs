use serde_json::Value;

use crate::changes::RawChange;
use crate::event::{MergeRequestEvent, Parsed};
use crate::gitlab::{retry, Attempt, CommitRef, GitLab, Outcome};

pub(crate) struct MergeRequestHandler<'a> {
    gitlab: &'a GitLab,
    event: Parsed<MergeRequestEvent>,
}

impl<'a> MergeRequestHandler<'a> {
    pub(crate) fn new(payload: &Value, gitlab: &'a GitLab) -> Self {
        Self {
            gitlab,
            event: MergeRequestEvent::parse(payload),
        }
    }

    pub(crate) fn event(&self) -> Option<&MergeRequestEvent> {
        self.event.event()
    }

    /// Project id and merge request iid, if this is a usable merge request event.
    fn target(&self, operation: &str) -> Option<(u64, u64)> {
        match &self.event {
            Parsed::Ignored { kind } => {
                tracing::warn!(
                    "Invalid event type: {kind:?}. Only 'merge_request' events support {operation}."
                );
                None
            }
            Parsed::Event(MergeRequestEvent {
                project_id: Some(project),
                merge_request_iid: Some(iid),
                ..
            }) => Some((*project, *iid)),
            Parsed::Event(_) => {
                tracing::warn!("Merge request event lacks project id or iid, cannot {operation}");
                None
            }
        }
    }

    /// Fetch the merge request's changes, retrying while GitLab still reports none.
    pub(crate) async fn fetch_changes(&self) -> Vec<RawChange> {
        let Some((project, iid)) = self.target("fetching changes") else {
            return Vec::new();
        };
        let policy = self.gitlab.retry_policy();
        let outcome = retry(policy, |attempt| async move {
            match self.gitlab.merge_request_changes(project, iid).await {
                Ok(changes) if !changes.is_empty() => Attempt::Done(changes),
                Ok(_) => {
                    tracing::info!(
                        "Changes of !{iid} are empty (attempt {attempt}/{})",
                        policy.max_attempts
                    );
                    Attempt::Retry
                }
                Err(e) => {
                    tracing::warn!("Failed to get changes of !{iid}: {e:#}");
                    Attempt::Abort
                }
            }
        })
        .await;
        if matches!(outcome, Outcome::Exhausted) {
            tracing::warn!("Changes of !{iid} are still empty, giving up");
        }
        outcome.into_option().unwrap_or_default()
    }

    pub(crate) async fn fetch_commits(&self) -> Vec<CommitRef> {
        let Some((project, iid)) = self.target("fetching commits") else {
            return Vec::new();
        };
        self.gitlab
            .merge_request_commits(project, iid)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to get commits of !{iid}: {e:#}");
                Vec::new()
            })
    }

    /// Post `body` as a note. Failures are logged, never returned.
    pub(crate) async fn post_note(&self, body: &str) {
        let Some((project, iid)) = self.target("posting notes") else {
            return;
        };
        match self.gitlab.create_merge_request_note(project, iid, body).await {
            Ok(()) => tracing::info!("Note successfully added to merge request !{iid}"),
            Err(e) => tracing::error!("Failed to add note to !{iid}: {e:#}"),
        }
    }

    /// Whether the target branch matches one of the project's protected branch rules.
    ///
    /// A failed lookup counts as "not protected".
    pub(crate) async fn is_target_branch_protected(&self) -> bool {
        let Some(MergeRequestEvent {
            project_id: Some(project),
            target_branch: Some(target_branch),
            ..
        }) = self.event()
        else {
            tracing::warn!("No project or target branch to check protection for");
            return false;
        };
        match self.gitlab.protected_branches(*project).await {
            Ok(rules) => rules
                .iter()
                .any(|rule| branch_matches(&rule.name, target_branch)),
            Err(e) => {
                tracing::warn!("Failed to get protected branches: {e:#}");
                false
            }
        }
    }
}

/// Shell-style wildcard match, as GitLab applies protected branch names.
fn branch_matches(pattern: &str, branch: &str) -> bool {
    glob::Pattern::new(pattern).map_or(pattern == branch, |p| p.matches(branch))
}
