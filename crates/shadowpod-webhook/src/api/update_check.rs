//! Which ShadowPod updates are accepted.
//!
//! A running pod only tolerates a handful of spec changes, so the same holds
//! for the ShadowPod wrapping it: container and init container images,
//! `activeDeadlineSeconds` (set or shortened) and additional tolerations.

use k8s_openapi::api::core::v1::Container;
use k8s_openapi::api::core::v1::PodSpec;

/// Check that `new` only differs from `old` in the fields a live pod allows
/// to change. The error describes the offending change.
pub fn check_benign_update(old: &PodSpec, new: &PodSpec) -> Result<(), String> {
    match (old.active_deadline_seconds, new.active_deadline_seconds) {
        (_, None) if old.active_deadline_seconds.is_some() => {
            return Err("activeDeadlineSeconds cannot be removed".to_string());
        }
        (Some(before), Some(after)) if after > before => {
            return Err(format!(
                "activeDeadlineSeconds can only be shortened, from {before} to {after} requested"
            ));
        }
        _ => {}
    }

    let old_tolerations = old.tolerations.as_deref().unwrap_or_default();
    let new_tolerations = new.tolerations.as_deref().unwrap_or_default();
    if !old_tolerations.iter().all(|t| new_tolerations.contains(t)) {
        return Err("existing tolerations cannot be modified or removed".to_string());
    }

    let mut expected = old.clone();
    expected.active_deadline_seconds = new.active_deadline_seconds;
    expected.tolerations = new.tolerations.clone();
    adopt_images(&mut expected.containers, &new.containers);
    if let (Some(expected), Some(new)) = (expected.init_containers.as_mut(), new.init_containers.as_ref()) {
        adopt_images(expected, new);
    }

    if expected != *new {
        return Err(
            "only container images, activeDeadlineSeconds and additional tolerations can be updated"
                .to_string(),
        );
    }
    Ok(())
}

fn adopt_images(expected: &mut [Container], new: &[Container]) {
    if expected.len() != new.len() {
        return;
    }
    for (expected, new) in expected.iter_mut().zip(new) {
        if expected.name == new.name {
            expected.image.clone_from(&new.image);
        }
    }
}
