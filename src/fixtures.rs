pub(crate) const MERGE_REQUEST: &str = include_str!("fixtures/merge_request.json");
pub(crate) const PUSH: &str = include_str!("fixtures/push.json");
