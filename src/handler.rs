//! Per-delivery handlers for merge request and push hooks.
//!
//! A handler owns the parsed event for one delivery and performs the GitLab calls
//! that belong to it. Upstream failures never escape a handler: they are logged and
//! turned into empty results, so the review pipeline can carry on without them.

mod merge_request;
mod push;

pub(crate) use merge_request::MergeRequestHandler;
pub(crate) use push::PushHandler;
