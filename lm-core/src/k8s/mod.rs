mod apiset;
mod gvk;
mod kyma;
mod util;

pub use apiset::*;
pub use gvk::*;
pub use kyma::*;
pub use util::*;

use crate::errors::*;

err_impl! {KubernetesError,
    #[error("object has no type information: {0}")]
    MissingTypeMeta(String),

    #[error("object has no uid: {0}")]
    MissingUid(String),

    #[error("malformed apiVersion: {0}")]
    MalformedApiVersion(String),
}

pub trait KubeResourceExt {
    fn namespaced_name(&self) -> String;
    fn has_finalizer(&self, finalizer: &str) -> bool;
    fn is_being_deleted(&self) -> bool;
    fn label_is_true(&self, key: &str) -> bool;
}

#[cfg(test)]
pub mod tests;
