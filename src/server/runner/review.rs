use std::future::Future;

use anyhow::Result;
use askama::Template;
use chrono::{DateTime, Utc};

use crate::changes::FilteredChange;
use crate::constants::REVIEW_NOTE_MARKER;
use crate::event::EventKind;

/// Everything a reviewer gets to see about one delivery.
#[derive(Debug, Clone)]
pub(crate) struct ReviewRequest<'a> {
    pub kind: EventKind,
    /// Merge request title or pushed branch.
    pub title: Option<&'a str>,
    pub changes: &'a [FilteredChange],
    pub commit_messages: Vec<String>,
}

/// Turns a set of changes into the text posted back to GitLab.
pub(crate) trait Reviewer {
    fn review(&self, request: &ReviewRequest<'_>) -> impl Future<Output = Result<String>> + Send;
}

/// Posts a Markdown overview of the changed files and commits.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SummaryReviewer;

impl Reviewer for SummaryReviewer {
    async fn review(&self, request: &ReviewRequest<'_>) -> Result<String> {
        make(request, Utc::now())
    }
}

#[derive(Template)]
#[template(path = "note.md.j2", escape = "none")]
struct Note<'a> {
    marker: &'a str,
    heading: &'static str,
    title: Option<&'a str>,
    changes: &'a [FilteredChange],
    additions: usize,
    deletions: usize,
    commits: Vec<&'a str>,
    now: DateTime<Utc>,
}

fn make(request: &ReviewRequest<'_>, now: DateTime<Utc>) -> Result<String> {
    Ok(Note {
        marker: REVIEW_NOTE_MARKER,
        heading: match request.kind {
            EventKind::MergeRequest => "Merge request summary",
            EventKind::Push => "Push summary",
        },
        title: request.title,
        changes: request.changes,
        additions: request.changes.iter().map(|c| c.additions).sum(),
        deletions: request.changes.iter().map(|c| c.deletions).sum(),
        commits: request
            .commit_messages
            .iter()
            .filter_map(|m| m.lines().next())
            .filter(|line| !line.trim().is_empty())
            .collect(),
        now,
    }
    .render()?)
}
