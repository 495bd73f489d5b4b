//! Pod resource footprint computation.

use std::collections::BTreeMap;

use api_types::LimitsEnforcement;
use error_stack::Report;
use k8s_openapi::api::core::v1::Container;
use k8s_openapi::api::core::v1::PodSpec;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use super::errors::QuotaError;
use super::resources::MilliQuantity;
use super::resources::Resources;

const CPU: &str = "cpu";
const MEMORY: &str = "memory";

/// Compute the resources a pod needs to run.
///
/// Regular containers run concurrently, so their quantities are summed. Init
/// containers run one at a time, so only the largest of them matters. The
/// footprint of each resource is the maximum of the two.
///
/// For each container the request of a resource is used, falling back to its
/// limit when no request is declared.
///
/// # Errors
///
/// - [`QuotaError::Validation`] if the pod has no container at all, if a
///   container omits cpu or memory under soft or hard enforcement, if request
///   and limit differ under hard enforcement, or if a quantity is malformed,
///   negative or too large to sum
pub fn compute_footprint(
    pod_spec: &PodSpec,
    enforcement: LimitsEnforcement,
) -> Result<Resources, Report<QuotaError>> {
    let init_containers = pod_spec.init_containers.as_deref().unwrap_or_default();
    if pod_spec.containers.is_empty() && init_containers.is_empty() {
        return Err(Report::new(QuotaError::validation(
            "the pod does not define any container",
        )));
    }

    let mut regular = Resources::new();
    for container in &pod_spec.containers {
        regular.add(&container_resources(container, enforcement)?)?;
    }

    let mut init = Resources::new();
    for container in init_containers {
        init.max_with(&container_resources(container, enforcement)?);
    }

    regular.max_with(&init);
    Ok(regular)
}

fn container_resources(
    container: &Container,
    enforcement: LimitsEnforcement,
) -> Result<Resources, Report<QuotaError>> {
    let empty = BTreeMap::new();
    let requirements = container.resources.as_ref();
    let requests = requirements
        .and_then(|r| r.requests.as_ref())
        .unwrap_or(&empty);
    let limits = requirements
        .and_then(|r| r.limits.as_ref())
        .unwrap_or(&empty);

    if enforcement != LimitsEnforcement::None {
        for required in [CPU, MEMORY] {
            if !requests.contains_key(required) && !limits.contains_key(required) {
                return Err(Report::new(QuotaError::validation(format!(
                    "container {} does not declare {required}, which is mandatory with {enforcement} limits enforcement",
                    container.name
                ))));
            }
        }
    }

    let mut resources = Resources::new();
    for name in requests.keys().chain(limits.keys()) {
        if resources.contains(name) {
            continue;
        }
        let request = parse_declared(container, name, requests.get(name))?;
        let limit = parse_declared(container, name, limits.get(name))?;

        if enforcement == LimitsEnforcement::Hard && request != limit {
            return Err(Report::new(QuotaError::validation(format!(
                "container {} must set equal request and limit for {name} with Hard limits enforcement",
                container.name
            ))));
        }

        if let Some(effective) = request.or(limit) {
            resources.set(name.clone(), effective);
        }
    }

    Ok(resources)
}

fn parse_declared(
    container: &Container,
    name: &str,
    quantity: Option<&Quantity>,
) -> Result<Option<MilliQuantity>, Report<QuotaError>> {
    let Some(quantity) = quantity else {
        return Ok(None);
    };
    let parsed = MilliQuantity::parse(&quantity.0)?;
    if parsed.is_negative() {
        return Err(Report::new(QuotaError::validation(format!(
            "container {} declares a negative {name} quantity {}",
            container.name, quantity.0
        ))));
    }
    Ok(Some(parsed))
}
