//! Sidecar injection contract for the gcsfuse CSI driver.
//!
//! The mutating admission webhook injects a gcsfuse sidecar container and a
//! scratch volume into every pod that mounts a Cloud Storage backed volume.
//! This crate holds the canonical specification of that container/volume pair
//! ([`sidecar`]) and the check that injection actually happened
//! ([`validator`]), shared between the webhook and the CSI node plugin.

pub mod sidecar;
pub mod validator;

pub use sidecar::{
    sidecar_container, sidecar_volume, SidecarConfig, SIDECAR_CONTAINER_NAME, SIDECAR_VOLUME_NAME,
    SIDECAR_VOLUME_MOUNT_PATH,
};
pub use validator::pod_has_sidecar;
