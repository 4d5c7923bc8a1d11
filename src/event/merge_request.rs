use serde::Deserialize;
use serde_json::Value;

use super::{lenient, lenient_nested, object_kind, Parsed};
use crate::constants::MERGE_REQUEST_KIND;

/// The `object_attributes` of a merge request hook. Every field is optional.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub(crate) struct MergeRequestAttributes {
    #[serde(deserialize_with = "lenient_nested")]
    pub iid: Option<u64>,
    #[serde(deserialize_with = "lenient_nested")]
    pub target_project_id: Option<u64>,
    #[serde(deserialize_with = "lenient_nested")]
    pub action: Option<String>,
    #[serde(deserialize_with = "lenient_nested")]
    pub target_branch: Option<String>,
    #[serde(deserialize_with = "lenient_nested")]
    pub source_branch: Option<String>,
    #[serde(deserialize_with = "lenient_nested")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct MergeRequestEvent {
    pub merge_request_iid: Option<u64>,
    pub project_id: Option<u64>,
    pub action: Option<String>,
    pub target_branch: Option<String>,
    pub attributes: MergeRequestAttributes,
}

impl MergeRequestEvent {
    pub(crate) fn parse(payload: &Value) -> Parsed<Self> {
        match object_kind(payload) {
            Some(MERGE_REQUEST_KIND) => {
                let attributes: MergeRequestAttributes = payload
                    .get("object_attributes")
                    .map(lenient)
                    .unwrap_or_default();
                Parsed::Event(Self {
                    merge_request_iid: attributes.iid,
                    project_id: attributes.target_project_id,
                    action: attributes.action.clone(),
                    target_branch: attributes.target_branch.clone(),
                    attributes,
                })
            }
            kind => Parsed::Ignored {
                kind: kind.map(ToOwned::to_owned),
            },
        }
    }
}
