//! Mutating webhook stamping the creator identity on ShadowPods.

use api_types::CREATOR_USER_LABEL;
use json_patch::AddOperation;
use json_patch::Patch;
use json_patch::PatchOperation;
use kube::core::admission::AdmissionRequest;
use kube::core::admission::AdmissionResponse;
use kube::core::admission::Operation;
use kube::core::DynamicObject;
use tracing::debug;
use tracing::warn;

use super::response::allowed;
use super::response::errored;

/// Sets the creator label to the requesting user on create, and keeps it
/// immutable on update.
#[derive(Debug, Default)]
pub struct ShadowPodMutator;

impl ShadowPodMutator {
    pub fn new() -> Self {
        Self
    }

    #[tracing::instrument(skip_all, fields(operation = ?req.operation, namespace = ?req.namespace, name = %req.name))]
    pub fn handle(&self, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let requester = req.user_info.username.as_deref().unwrap_or_default();

        let creator = match req.operation {
            Operation::Create => requester.to_string(),
            Operation::Update => match creator_of(req.old_object.as_ref()) {
                Some(creator) => creator.to_string(),
                None => requester.to_string(),
            },
            _ => return allowed(req),
        };

        if creator.is_empty() {
            warn!("Request carries no user name, creator label not set");
            return allowed(req);
        }

        let Some(object) = req.object.as_ref() else {
            return errored(req, 400, "the request does not carry an object");
        };
        let Some(patch) = creator_patch(object, &creator) else {
            return allowed(req);
        };

        debug!(creator = %creator, "Stamping creator label");
        match allowed(req).with_patch(patch) {
            Ok(response) => response,
            Err(e) => errored(req, 500, format!("cannot serialize patch: {e}")),
        }
    }
}

fn creator_of(object: Option<&DynamicObject>) -> Option<&str> {
    object?
        .metadata
        .labels
        .as_ref()?
        .get(CREATOR_USER_LABEL)
        .map(String::as_str)
}

/// Patch setting the creator label of `object`, `None` when already set.
fn creator_patch(object: &DynamicObject, creator: &str) -> Option<Patch> {
    let operation = match object.metadata.labels.as_ref() {
        Some(labels) if labels.get(CREATOR_USER_LABEL).map(String::as_str) == Some(creator) => {
            return None;
        }
        Some(_) => AddOperation {
            path: format!("/metadata/labels/{}", escape_json_pointer(CREATOR_USER_LABEL)),
            value: serde_json::Value::String(creator.to_string()),
        },
        None => AddOperation {
            path: "/metadata/labels".to_string(),
            value: serde_json::Value::Object(serde_json::Map::from_iter([(
                CREATOR_USER_LABEL.to_string(),
                serde_json::Value::String(creator.to_string()),
            )])),
        },
    };
    Some(Patch(vec![PatchOperation::Add(operation)]))
}

fn escape_json_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}
