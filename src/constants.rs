use std::time::Duration;

pub(crate) const DEFAULT_SUPPORTED_EXTENSIONS: &[&str] = &[".java", ".py", ".php"];

/// GitLab indexes merge request diffs asynchronously, so a fresh MR can report no changes.
pub(crate) const CHANGES_MAX_ATTEMPTS: u32 = 3;
pub(crate) const CHANGES_RETRY_DELAY: Duration = Duration::from_secs(10);

pub(crate) const MERGE_REQUEST_KIND: &str = "merge_request";
pub(crate) const PUSH_KIND: &str = "push";

/// Merge request actions that trigger a review.
pub(crate) const REVIEWED_ACTIONS: &[&str] = &["open", "reopen", "update"];

pub(crate) const REVIEW_NOTE_MARKER: &str = "<!-- gitlab-review-hook summary -->";

pub(crate) const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// GitLab's "no commit" id, sent as `before` on branch creation and `after` on deletion.
pub(crate) fn is_null_sha(sha: &str) -> bool {
    !sha.is_empty() && sha.bytes().all(|b| b == b'0')
}
