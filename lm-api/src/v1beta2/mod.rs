mod kyma;
mod manifest;
mod module_release_meta;
mod module_template;
mod shared;
mod watcher;

pub use kyma::*;
pub use manifest::*;
pub use module_release_meta::*;
pub use module_template::*;
use schemars::{
    Schema,
    SchemaGenerator,
    json_schema,
};
pub use shared::*;
pub use watcher::*;

// Module default CRs and component descriptors are third-party documents; we keep them as raw JSON
// and let the apiserver store whatever fields they carry.
pub(crate) fn opaque_document(_: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "object",
        "nullable": true,
        "x-kubernetes-preserve-unknown-fields": true,
    })
}

#[cfg(test)]
mod tests;
