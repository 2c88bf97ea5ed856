//! Container provisioning: create the destination container, tolerating "already exists".

use tracing::{error, info};

use crate::contract::{BlobBackend, ContainerHandle, CreateContainerResponse};
use crate::error::ProvisioningError;

/// Whether the container was created by this run or was already there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStatus {
    Created,
    AlreadyExisted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub handle: ContainerHandle,
    pub status: ProvisionStatus,
}

/// Ensures container `name` exists.
///
/// `Created` and `AlreadyExists` both yield a handle; every other backend answer is
/// fatal for the run.
pub async fn ensure_container<B>(backend: &B, name: &str) -> Result<Provisioned, ProvisioningError>
where
    B: BlobBackend + ?Sized,
{
    println!("Creating a container at {name}");
    info!(container = name, "[PROVISION] Creating container");

    let status = match backend.create_container(name).await {
        CreateContainerResponse::Created => {
            info!(container = name, "[PROVISION] Container created");
            ProvisionStatus::Created
        }
        CreateContainerResponse::AlreadyExists => {
            info!(container = name, "[PROVISION] Container already exists, reusing it");
            ProvisionStatus::AlreadyExisted
        }
        CreateContainerResponse::Failed(source) => {
            error!(container = name, error = %source, "[PROVISION][ERROR] Container creation failed");
            return Err(ProvisioningError {
                container: name.to_string(),
                source,
            });
        }
    };

    Ok(Provisioned {
        handle: ContainerHandle::new(name),
        status,
    })
}
