use std::collections::BTreeMap;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use lm_core::cache::CrdCache;
use lm_core::errors::*;
use lm_core::k8s::sanitize_for_copy;
use lm_core::prelude::*;
use tracing::*;

// The CRDs a runtime cluster needs so that users can see their Kyma and browse the catalog
pub const SYNCED_CRDS: [(&str, &str); 3] = [
    ("kymas.operator.kyma-project.io", "kyma"),
    ("moduletemplates.operator.kyma-project.io", "moduletemplate"),
    ("modulereleasemetas.operator.kyma-project.io", "modulereleasemeta"),
];

pub fn kcp_generation_annotation(kind: &str) -> String {
    format!("{kind}-{KCP_CRD_GENERATION_SUFFIX}")
}

pub fn skr_generation_annotation(kind: &str) -> String {
    format!("{kind}-{SKR_CRD_GENERATION_SUFFIX}")
}

async fn kcp_crd(kcp: &ControlPlaneClient, cache: &CrdCache, name: &str) -> anyhow::Result<CustomResourceDefinition> {
    if let Some(crd) = cache.get(name) {
        return Ok(crd);
    }
    let Some(crd) = kcp.get_typed::<CustomResourceDefinition>(None, name).await? else {
        bail!("CRD {name} not found in control plane");
    };
    cache.insert(name, crd.clone());
    Ok(crd)
}

fn generation_of(crd: &CustomResourceDefinition) -> String {
    crd.metadata.generation.unwrap_or_default().to_string()
}

// Brings the runtime cluster's copies of our CRDs up to date.  The generations last synced are
// recorded as annotations on the control-plane Kyma, so a CRD is only re-applied when the control
// plane's CRD changed or somebody touched (or deleted) the runtime copy.  Returns the annotations
// that need to change on the control-plane Kyma.
pub async fn sync_crds(
    kcp: &ControlPlaneClient,
    remote: &RemoteClient,
    kyma: &Kyma,
    cache: &CrdCache,
) -> anyhow::Result<BTreeMap<String, String>> {
    let mut updates = BTreeMap::new();
    let annotations = kyma.annotations();

    for (name, kind) in SYNCED_CRDS {
        let kcp_crd = kcp_crd(kcp, cache, name).await?;
        let remote_crd = remote.get_typed::<CustomResourceDefinition>(None, name).await?;

        let kcp_key = kcp_generation_annotation(kind);
        let skr_key = skr_generation_annotation(kind);
        let kcp_gen = generation_of(&kcp_crd);

        let up_to_date = remote_crd.as_ref().is_some_and(|rc| {
            annotations.get(&kcp_key) == Some(&kcp_gen) && annotations.get(&skr_key) == Some(&generation_of(rc))
        });
        if up_to_date {
            continue;
        }

        info!("syncing CRD {name} to runtime of {}", kyma.namespaced_name());
        let mut copy = kcp_crd.clone();
        sanitize_for_copy(&mut copy.metadata);
        copy.status = None;
        let applied = match remote.apply_typed(&copy, FIELD_MANAGER).await {
            Ok(applied) => applied,
            Err(err) => {
                cache.invalidate(name);
                return Err(err);
            },
        };

        updates.insert(kcp_key, kcp_gen);
        updates.insert(skr_key, generation_of(&applied));
    }
    Ok(updates)
}
