//! Admission response builders and object decoding shared by the webhooks.

use api_types::ShadowPod;
use kube::core::admission::AdmissionRequest;
use kube::core::admission::AdmissionResponse;
use kube::core::DynamicObject;
use kube::Resource;

pub(crate) fn allowed<T: Resource>(req: &AdmissionRequest<T>) -> AdmissionResponse {
    AdmissionResponse::from(req)
}

/// Reject the request as forbidden.
pub(crate) fn denied<T: Resource>(req: &AdmissionRequest<T>, message: impl ToString) -> AdmissionResponse {
    with_status(AdmissionResponse::from(req).deny(message), 403, "Forbidden")
}

/// Reject the request because it could not be evaluated.
pub(crate) fn errored<T: Resource>(
    req: &AdmissionRequest<T>,
    code: u16,
    message: impl ToString,
) -> AdmissionResponse {
    let reason = match code {
        400 => "BadRequest",
        503 => "ServiceUnavailable",
        _ => "InternalError",
    };
    with_status(AdmissionResponse::from(req).deny(message), code, reason)
}

fn with_status(mut response: AdmissionResponse, code: u16, reason: &str) -> AdmissionResponse {
    response.result.code = code;
    response.result.reason = reason.to_string();
    response
}

/// Decode the ShadowPod carried by an admission request.
///
/// The object namespace falls back to the request namespace, which is the
/// only place it is set when the client omitted it.
pub(crate) fn decode_shadow_pod(
    object: Option<&DynamicObject>,
    namespace: Option<&str>,
) -> Result<ShadowPod, String> {
    let object = object.ok_or_else(|| "the request does not carry an object".to_string())?;
    let value = serde_json::to_value(object).map_err(|e| format!("cannot encode object: {e}"))?;
    let mut shadow_pod: ShadowPod =
        serde_json::from_value(value).map_err(|e| format!("the object is not a valid ShadowPod: {e}"))?;
    if shadow_pod.metadata.namespace.is_none() {
        shadow_pod.metadata.namespace = namespace.map(str::to_string);
    }
    Ok(shadow_pod)
}
