use std::sync::Arc;

use anyhow::Result;
use futures::{channel::mpsc::Receiver, StreamExt};
use serde_json::Value;
use tracing::Instrument;

use crate::changes::ChangeFilter;
use crate::constants::REVIEWED_ACTIONS;
use crate::event::{Delivery, EventKind};
use crate::gitlab::GitLab;
use crate::handler::{MergeRequestHandler, PushHandler};
use crate::utils::slugify_url;

mod review;

pub(crate) use review::{ReviewRequest, Reviewer, SummaryReviewer};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Settings {
    pub push_review_enabled: bool,
    pub protected_branches_only: bool,
    /// Render reviews without posting them back.
    pub dry_run: bool,
}

/// Shared, read-only state for reviewing deliveries.
#[derive(Debug)]
pub(crate) struct Pipeline<R> {
    pub gitlab: GitLab,
    pub filter: ChangeFilter,
    pub reviewer: R,
    pub settings: Settings,
}

pub(crate) async fn runner<R>(mut receiver: Receiver<Delivery>, pipeline: Arc<Pipeline<R>>)
where
    R: Reviewer + Send + Sync + 'static,
{
    // loop runs until sender disconnects
    while let Some(delivery) = receiver.next().await {
        let span = tracing::info_span!(
            "handle_event",
            kind = %delivery.kind,
            project = %project_slug(&delivery.payload)
        );
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(
            async move {
                if let Err(error) = pipeline.handle(&delivery).await {
                    tracing::error!("{error:#}");
                }
            }
            .instrument(span),
        );
    }
}

fn project_slug(payload: &Value) -> String {
    payload
        .pointer("/project/web_url")
        .and_then(Value::as_str)
        .map(slugify_url)
        .unwrap_or_default()
}

impl<R: Reviewer + Sync> Pipeline<R> {
    /// Review one delivery and post the result. Returns the review text, if any.
    pub(crate) async fn handle(&self, delivery: &Delivery) -> Result<Option<String>> {
        match delivery.kind {
            EventKind::MergeRequest => self.merge_request(&delivery.payload).await,
            EventKind::Push => self.push(&delivery.payload).await,
        }
    }

    async fn merge_request(&self, payload: &Value) -> Result<Option<String>> {
        let handler = MergeRequestHandler::new(payload, &self.gitlab);
        let Some(event) = handler.event() else {
            return Ok(None);
        };
        let action = event.action.as_deref().unwrap_or_default();
        tracing::info!(
            "Merge request !{} {action}: {} -> {}",
            event.merge_request_iid.unwrap_or_default(),
            event.attributes.source_branch.as_deref().unwrap_or("?"),
            event.target_branch.as_deref().unwrap_or("?"),
        );
        if !REVIEWED_ACTIONS.contains(&action) {
            tracing::info!("Merge request action {action:?} is not reviewed, skipping");
            return Ok(None);
        }
        if self.settings.protected_branches_only && !handler.is_target_branch_protected().await {
            tracing::info!(
                "Target branch {:?} is not protected, skipping",
                event.target_branch
            );
            return Ok(None);
        }

        let changes = self.filter.filter(&handler.fetch_changes().await);
        if changes.is_empty() {
            tracing::info!("No reviewable changes in merge request");
            return Ok(None);
        }
        let commit_messages = handler
            .fetch_commits()
            .await
            .into_iter()
            .filter_map(|commit| commit.message.or(commit.title))
            .collect();

        let review = self
            .reviewer
            .review(&ReviewRequest {
                kind: EventKind::MergeRequest,
                title: event.attributes.title.as_deref(),
                changes: &changes,
                commit_messages,
            })
            .await?;
        if !self.settings.dry_run {
            handler.post_note(&review).await;
        }
        Ok(Some(review))
    }

    async fn push(&self, payload: &Value) -> Result<Option<String>> {
        if !self.settings.push_review_enabled {
            tracing::info!("Push review is disabled, skipping");
            return Ok(None);
        }
        let handler = PushHandler::new(payload, &self.gitlab);
        let Some(event) = handler.event() else {
            return Ok(None);
        };

        let changes = self.filter.filter(&handler.resolve_diff_range().await);
        if changes.is_empty() {
            tracing::info!("No reviewable changes in push to {}", event.branch_name);
            return Ok(None);
        }
        let commit_messages = handler
            .commit_summaries()
            .into_iter()
            .filter_map(|summary| summary.message)
            .collect();

        let review = self
            .reviewer
            .review(&ReviewRequest {
                kind: EventKind::Push,
                title: Some(event.branch_name.as_str()).filter(|b| !b.is_empty()),
                changes: &changes,
                commit_messages,
            })
            .await?;
        if !self.settings.dry_run {
            handler.post_comment(&review).await;
        }
        Ok(Some(review))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{any, body_string_contains, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::fixtures::{MERGE_REQUEST, PUSH};
    use crate::gitlab::test_utils::client;

    fn pipeline(server: &MockServer, settings: Settings) -> Pipeline<SummaryReviewer> {
        Pipeline {
            gitlab: client(server),
            filter: ChangeFilter::default(),
            reviewer: SummaryReviewer,
            settings,
        }
    }

    fn delivery(kind: EventKind, payload: &str) -> Delivery {
        Delivery {
            kind,
            payload: serde_json::from_str(payload).unwrap(),
        }
    }

    async fn mount_merge_request(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42/merge_requests/7/changes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"changes": [
                {"new_path": "ledger/sync.py", "diff": "@@ -1 +1,2 @@\n-a\n+b\n+c\n"},
                {"new_path": "README.md", "diff": "+docs\n"},
                {"new_path": "old.py", "diff": "-x\n", "deleted_file": true},
            ]})))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42/merge_requests/7/commits"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "f88f7bd", "title": "Retry ledger sync", "message": "Retry ledger sync\n"}
            ])))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_merge_request_is_reviewed_and_noted() {
        let server = MockServer::start().await;
        mount_merge_request(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/v4/projects/42/merge_requests/7/notes"))
            .and(body_string_contains("ledger/sync.py"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        let review = pipeline(&server, Settings::default())
            .handle(&delivery(EventKind::MergeRequest, MERGE_REQUEST))
            .await
            .unwrap()
            .unwrap();
        assert!(review.contains("| `ledger/sync.py` | +2 | -1 |"));
        assert!(!review.contains("README.md"));
        assert!(!review.contains("old.py"));
        assert!(review.contains("- Retry ledger sync"));
    }

    #[tokio::test]
    async fn test_dry_run_does_not_post() {
        let server = MockServer::start().await;
        mount_merge_request(&server).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;
        let settings = Settings {
            dry_run: true,
            ..Settings::default()
        };
        let review = pipeline(&server, settings)
            .handle(&delivery(EventKind::MergeRequest, MERGE_REQUEST))
            .await
            .unwrap();
        assert!(review.is_some());
    }

    #[tokio::test]
    async fn test_unreviewed_action_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let mut payload: Value = serde_json::from_str(MERGE_REQUEST).unwrap();
        payload["object_attributes"]["action"] = json!("merge");
        let review = pipeline(&server, Settings::default())
            .handle(&Delivery {
                kind: EventKind::MergeRequest,
                payload,
            })
            .await
            .unwrap();
        assert_eq!(review, None);
    }

    #[tokio::test]
    async fn test_unprotected_target_branch_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42/protected_branches"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": "main"}])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42/merge_requests/7/changes"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let settings = Settings {
            protected_branches_only: true,
            ..Settings::default()
        };
        let review = pipeline(&server, settings)
            .handle(&delivery(EventKind::MergeRequest, MERGE_REQUEST))
            .await
            .unwrap();
        assert_eq!(review, None);
    }

    #[tokio::test]
    async fn test_push_review_disabled_by_default() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let review = pipeline(&server, Settings::default())
            .handle(&delivery(EventKind::Push, PUSH))
            .await
            .unwrap();
        assert_eq!(review, None);
    }

    #[tokio::test]
    async fn test_push_is_reviewed_and_commented() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42/repository/compare"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"diffs": [
                {"new_path": "src/Ledger.java", "diff": "+class Ledger {}\n"},
            ]})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v4/projects/42/repository/commits/abc123/comments"))
            .and(body_string_contains("src/Ledger.java"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        let settings = Settings {
            push_review_enabled: true,
            ..Settings::default()
        };
        let review = pipeline(&server, settings)
            .handle(&delivery(EventKind::Push, PUSH))
            .await
            .unwrap()
            .unwrap();
        assert!(review.contains("## Push summary: main"));
        assert!(review.contains("- Handle ledger timeouts"));
        assert!(review.contains("- Add ledger client"));
    }

    #[test]
    fn test_project_slug() {
        let payload: Value = serde_json::from_str(PUSH).unwrap();
        assert_eq!(project_slug(&payload), "gitlab_example_com_acme_payments");
        assert_eq!(project_slug(&json!({})), "");
    }
}
