use serde::Deserialize;

use crate::constants::DEFAULT_SUPPORTED_EXTENSIONS;

/// A file change as returned by the merge request changes or compare endpoints.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub(crate) struct RawChange {
    pub diff: String,
    pub new_path: String,
    pub deleted_file: bool,
}

/// A change that passed the extension allow-list, with its line counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FilteredChange {
    pub diff: String,
    pub new_path: String,
    pub additions: usize,
    pub deletions: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct ChangeFilter {
    extensions: Vec<String>,
}

impl Default for ChangeFilter {
    fn default() -> Self {
        Self::new(DEFAULT_SUPPORTED_EXTENSIONS.iter().copied())
    }
}

impl ChangeFilter {
    pub(crate) fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(Into::into)
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    pub(crate) fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn is_supported(&self, path: &str) -> bool {
        self.extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }

    /// Keep non-deleted files with an allow-listed extension, in input order.
    pub(crate) fn filter(&self, changes: &[RawChange]) -> Vec<FilteredChange> {
        changes
            .iter()
            .filter(|change| !change.deleted_file)
            .filter(|change| self.is_supported(&change.new_path))
            .map(|change| {
                let (additions, deletions) = count_lines(&change.diff);
                FilteredChange {
                    diff: change.diff.clone(),
                    new_path: change.new_path.clone(),
                    additions,
                    deletions,
                }
            })
            .collect()
    }
}

/// Count added and removed lines of a unified diff, skipping `+++`/`---` headers.
pub(crate) fn count_lines(diff: &str) -> (usize, usize) {
    diff.lines().fold((0, 0), |(add, del), line| {
        if line.starts_with('+') && !line.starts_with("+++") {
            (add + 1, del)
        } else if line.starts_with('-') && !line.starts_with("---") {
            (add, del + 1)
        } else {
            (add, del)
        }
    })
}
