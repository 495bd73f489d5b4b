//! Admission requests for the webhook tests.

use api_types::ShadowPod;
use kube::core::admission::AdmissionRequest;
use kube::core::admission::AdmissionReview;
use kube::core::DynamicObject;
use kube::ResourceExt;

pub fn admission_review_json(
    operation: &str,
    object: Option<&ShadowPod>,
    old_object: Option<&ShadowPod>,
    dry_run: bool,
) -> serde_json::Value {
    let subject = object.or(old_object);
    serde_json::json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
            "kind": {"group": "offloading.liqo.io", "version": "v1beta1", "kind": "ShadowPod"},
            "resource": {"group": "offloading.liqo.io", "version": "v1beta1", "resource": "shadowpods"},
            "name": subject.map(|sp| sp.name_any()).unwrap_or_default(),
            "namespace": subject.and_then(|sp| sp.namespace()),
            "operation": operation,
            "userInfo": {"username": "alice", "groups": ["system:authenticated"]},
            "object": object,
            "oldObject": old_object,
            "dryRun": dry_run,
        }
    })
}

pub fn admission_request(
    operation: &str,
    object: Option<&ShadowPod>,
    old_object: Option<&ShadowPod>,
    dry_run: bool,
) -> AdmissionRequest<DynamicObject> {
    let review: AdmissionReview<DynamicObject> =
        serde_json::from_value(admission_review_json(operation, object, old_object, dry_run))
            .expect("valid admission review");
    review.try_into().expect("review carries a request")
}
