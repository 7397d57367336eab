use k8s_openapi::api::core::v1::Pod;

use crate::sidecar::{SIDECAR_CONTAINER_NAME, SIDECAR_VOLUME_MOUNT_PATH, SIDECAR_VOLUME_NAME};

/// Checks whether the webhook's sidecar mutation was actually applied to a
/// realized pod.
///
/// Holds when both:
/// 1. a container named [`SIDECAR_CONTAINER_NAME`] exists, its image
///    repository (text before the first `:`, tag ignored) equals
///    `expected_image`, and it mounts [`SIDECAR_VOLUME_NAME`] at
///    [`SIDECAR_VOLUME_MOUNT_PATH`];
/// 2. the pod carries an emptyDir volume named [`SIDECAR_VOLUME_NAME`].
///
/// Only the first container matching the sidecar name is inspected; pods
/// with duplicate sidecar names are not rejected here. Callers rely on that,
/// keep it.
///
/// A `false` is a contract violation signal for the caller, not an error.
pub fn pod_has_sidecar(expected_image: &str, pod: &Pod) -> bool {
    let Some(spec) = pod.spec.as_ref() else {
        return false;
    };

    let container_injected = spec
        .containers
        .iter()
        .find(|container| container.name == SIDECAR_CONTAINER_NAME)
        .is_some_and(|container| {
            let repository = container
                .image
                .as_deref()
                .map(|image| image.split(':').next().unwrap_or(image))
                .unwrap_or_default();

            repository == expected_image
                && container
                    .volume_mounts
                    .iter()
                    .flatten()
                    .any(|mount| {
                        mount.name == SIDECAR_VOLUME_NAME
                            && mount.mount_path == SIDECAR_VOLUME_MOUNT_PATH
                    })
        });

    let volume_injected = spec.volumes.iter().flatten().any(|volume| {
        volume.name == SIDECAR_VOLUME_NAME && volume.empty_dir.is_some()
    });

    container_injected && volume_injected
}
