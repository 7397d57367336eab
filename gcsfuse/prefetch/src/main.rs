//! Long-lived helper process running inside the gcsfuse sidecar container.
//!
//! On start it decides, from the instance's machine type and an operator
//! override, whether to warm the kernel's dentry/attribute caches for every
//! Cloud Storage volume mounted under the mount root, then parks until the
//! orchestrator terminates the pod.

mod cli;
mod entrypoint;
mod error;
mod machine;
mod policy;
mod warmup;

fn main() -> crate::error::PrefetchResult<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(crate::entrypoint::main())
}
