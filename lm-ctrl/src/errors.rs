use std::ops::Deref;

use lm_core::errors::*;

// anyhow::Error doesn't implement std::error::Error, but kube-runtime's reconcile functions need
// one; wrap it, and deref back to the anyhow error wherever we need to inspect it.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct AnyhowError(#[from] anyhow::Error);

impl Deref for AnyhowError {
    type Target = anyhow::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Everything that can go wrong while picking a ModuleTemplate for a module
err_impl! {LookupError,
    #[error("no unique template could be identified: {0}")]
    TemplateNotFound(String),

    #[error("module is not yet available in the catalog: {0}")]
    NotInCatalog(String),

    #[error("module template not allowed: {0}")]
    TemplateNotAllowed(String),

    #[error("module template update not allowed: {0}")]
    TemplateUpdateNotAllowed(String),

    #[error("template marked as mandatory: {0}")]
    MandatoryTemplate(String),

    #[error("no version assigned to channel: {0}")]
    MissingChannelVersion(String),

    #[error("invalid module in spec: {0}")]
    InvalidModuleInSpec(String),

    #[error("invalid module in status: {0}")]
    InvalidModuleInStatus(String),

    #[error("waiting for maintenance window: {0}")]
    WaitingForMaintenanceWindow(String),

    #[error("could not determine maintenance window: {0}")]
    MaintenanceWindowUnknown(String),

    #[error("failed to get descriptor: {0}")]
    Descriptor(String),
}

err_impl! {KymaControllerError,
    #[error("kubeconfig secret not usable: {0}")]
    InvalidKubeconfigSecret(String),

    #[error("manifest has no usable default resource: {0}")]
    MalformedDefaultResource(String),
}

pub fn lookup_error(err: &anyhow::Error) -> Option<&LookupError> {
    err.downcast_ref::<LookupError>()
}

pub fn is_invalid_kubeconfig(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<KymaControllerError>(), Some(KymaControllerError::InvalidKubeconfigSecret(_)))
}
