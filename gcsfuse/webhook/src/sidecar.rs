use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::{
        Container, EmptyDirVolumeSource, ResourceRequirements, SecurityContext, Volume,
        VolumeMount,
    },
    apimachinery::pkg::api::resource::Quantity,
};

/// Name of the injected sidecar container.
pub const SIDECAR_CONTAINER_NAME: &str = "gke-gcsfuse-sidecar";

/// Name of the emptyDir volume shared between the sidecar and the CSI node
/// plugin.
pub const SIDECAR_VOLUME_NAME: &str = "gke-gcsfuse-tmp";

/// Where [`SIDECAR_VOLUME_NAME`] is mounted inside the sidecar container.
pub const SIDECAR_VOLUME_MOUNT_PATH: &str = "/tmp";

/// Per-cluster configuration for the injected sidecar, resolved by the
/// webhook from its own flags before each mutation.
///
/// Fields are passed through verbatim, validation is the webhook's job.
#[derive(Debug, Clone)]
pub struct SidecarConfig {
    pub container_image: String,
    pub image_version: String,
    pub image_pull_policy: String,
    pub cpu_limit: Quantity,
    pub memory_limit: Quantity,
    pub ephemeral_storage_limit: Quantity,
}

/// Builds the sidecar [`Container`] the webhook injects into the pod.
///
/// The sidecar runs as root so it can read the credential files the node
/// plugin drops into the shared volume, but privilege escalation stays off.
/// Limits always equal requests so the sidecar never lands in a burstable
/// QoS class.
pub fn sidecar_container(config: &SidecarConfig) -> Container {
    let resources = BTreeMap::from([
        ("cpu".to_string(), config.cpu_limit.clone()),
        ("memory".to_string(), config.memory_limit.clone()),
        (
            "ephemeral-storage".to_string(),
            config.ephemeral_storage_limit.clone(),
        ),
    ]);

    Container {
        name: SIDECAR_CONTAINER_NAME.to_string(),
        image: Some(format!(
            "{}:{}",
            config.container_image, config.image_version
        )),
        image_pull_policy: Some(config.image_pull_policy.clone()),
        security_context: Some(SecurityContext {
            allow_privilege_escalation: Some(false),
            run_as_user: Some(0),
            run_as_group: Some(0),
            ..Default::default()
        }),
        args: Some(vec!["--v=5".to_string()]),
        resources: Some(ResourceRequirements {
            limits: Some(resources.clone()),
            requests: Some(resources),
            ..Default::default()
        }),
        volume_mounts: Some(vec![VolumeMount {
            name: SIDECAR_VOLUME_NAME.to_string(),
            mount_path: SIDECAR_VOLUME_MOUNT_PATH.to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

/// Builds the pod-level emptyDir [`Volume`] backing the sidecar's scratch
/// space.
pub fn sidecar_volume() -> Volume {
    Volume {
        name: SIDECAR_VOLUME_NAME.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_config() -> SidecarConfig {
        SidecarConfig {
            container_image: "gcr.io/gcs-fuse-csi-driver/gcs-fuse-csi-driver-sidecar-mounter"
                .to_string(),
            image_version: "v0.3.2".to_string(),
            image_pull_policy: "IfNotPresent".to_string(),
            cpu_limit: Quantity("250m".to_string()),
            memory_limit: Quantity("256Mi".to_string()),
            ephemeral_storage_limit: Quantity("5Gi".to_string()),
        }
    }

    #[test]
    fn container_limits_equal_requests() {
        let container = sidecar_container(&test_config());

        let resources = container.resources.expect("resources should be set");
        let limits = resources.limits.expect("limits should be set");
        let requests = resources.requests.expect("requests should be set");

        assert_eq!(limits, requests);
        for resource in ["cpu", "memory", "ephemeral-storage"] {
            assert!(limits.contains_key(resource), "missing limit {resource}");
        }
    }

    #[test]
    fn container_has_single_fixed_volume_mount() {
        let container = sidecar_container(&test_config());

        let mounts = container.volume_mounts.expect("mounts should be set");
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].name, SIDECAR_VOLUME_NAME);
        assert_eq!(mounts[0].mount_path, SIDECAR_VOLUME_MOUNT_PATH);
    }

    #[test]
    fn container_image_and_security_context() {
        let container = sidecar_container(&test_config());

        assert_eq!(container.name, SIDECAR_CONTAINER_NAME);
        assert_eq!(
            container.image.as_deref(),
            Some("gcr.io/gcs-fuse-csi-driver/gcs-fuse-csi-driver-sidecar-mounter:v0.3.2")
        );

        let security = container
            .security_context
            .expect("security context should be set");
        assert_eq!(security.allow_privilege_escalation, Some(false));
        assert_eq!(security.run_as_user, Some(0));
        assert_eq!(security.run_as_group, Some(0));
    }

    #[test]
    fn volume_is_idempotent_empty_dir() {
        let volume = sidecar_volume();

        assert_eq!(volume.name, SIDECAR_VOLUME_NAME);
        assert!(volume.empty_dir.is_some());
        assert_eq!(volume, sidecar_volume());
    }
}
