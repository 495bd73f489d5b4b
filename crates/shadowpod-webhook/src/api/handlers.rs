use std::sync::Arc;

use kube::core::admission::AdmissionRequest;
use kube::core::admission::AdmissionResponse;
use kube::core::admission::AdmissionReview;
use kube::core::admission::ConvertAdmissionReviewError;
use kube::core::DynamicObject;
use poem::handler;
use poem::http::StatusCode;
use poem::web::Data;
use poem::web::Json;
use poem::Response;
use tracing::warn;

use super::mutator::ShadowPodMutator;
use super::validator::ShadowPodValidator;

type Review = Json<AdmissionReview<DynamicObject>>;

fn into_request(review: AdmissionReview<DynamicObject>) -> Result<AdmissionRequest<DynamicObject>, Review> {
    review.try_into().map_err(|e: ConvertAdmissionReviewError| {
        warn!("Invalid admission review: {e}");
        Json(AdmissionResponse::invalid(e.to_string()).into_review())
    })
}

/// Validating webhook for ShadowPod create, update and delete
#[handler]
pub async fn validate_shadow_pod(
    Json(review): Review,
    validator: Data<&Arc<ShadowPodValidator>>,
) -> Review {
    let req = match into_request(review) {
        Ok(req) => req,
        Err(response) => return response,
    };
    Json(validator.handle(&req).await.into_review())
}

/// Mutating webhook for ShadowPod create and update
#[handler]
pub async fn mutate_shadow_pod(
    Json(review): Review,
    mutator: Data<&Arc<ShadowPodMutator>>,
) -> Review {
    let req = match into_request(review) {
        Ok(req) => req,
        Err(response) => return response,
    };
    Json(mutator.handle(&req).into_review())
}

#[handler]
pub fn healthz() -> &'static str {
    "ok"
}

/// Ready once the quota cache can serve admissions
#[handler]
pub fn readyz(validator: Data<&Arc<ShadowPodValidator>>) -> Response {
    if validator.is_ready() {
        Response::builder().status(StatusCode::OK).body("ok")
    } else {
        Response::builder()
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .body("quota cache initialization in progress")
    }
}
