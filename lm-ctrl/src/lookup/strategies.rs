use lm_api::v1beta2::ModuleTemplate;
use lm_core::prelude::*;
use tracing::*;

use super::{
    Catalog,
    ModuleInfo,
};
use crate::errors::LookupError;

pub enum Resolution {
    NotApplicable,
    Found(ModuleTemplate),
}

// One way of finding the template for a module.  Strategies are tried in order; the first one that
// doesn't say NotApplicable decides the outcome.
pub trait TemplateStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn try_resolve(&self, module: &ModuleInfo, desired_channel: &str, catalog: &Catalog) -> anyhow::Result<Resolution>;
}

fn candidate_names(templates: &[&ModuleTemplate]) -> String {
    templates.iter().map(|t| t.name_any()).collect::<Vec<_>>().join(", ")
}

fn exactly_one(module: &str, what: &str, candidates: Vec<&ModuleTemplate>) -> anyhow::Result<Resolution> {
    match candidates.as_slice() {
        [] => Err(LookupError::template_not_found(&format!("no template for module {module} in {what}"))),
        [template] => Ok(Resolution::Found((*template).clone())),
        _ => Err(LookupError::template_not_found(&format!(
            "more than one template for module {module} in {what}: {}",
            candidate_names(&candidates)
        ))),
    }
}

pub struct ByVersion;

impl TemplateStrategy for ByVersion {
    fn name(&self) -> &'static str {
        "by-version"
    }

    fn try_resolve(&self, module: &ModuleInfo, _: &str, catalog: &Catalog) -> anyhow::Result<Resolution> {
        if !module.is_installed_by_version() {
            return Ok(Resolution::NotApplicable);
        }

        let version = module.module.version.as_deref().unwrap_or_default();
        let candidates = catalog
            .templates_for(module.name())
            .filter(|t| t.spec.channel.is_empty() || t.spec.channel.eq_ignore_ascii_case(NONE_CHANNEL))
            .filter(|t| t.spec.version == version)
            .collect();
        exactly_one(module.name(), &format!("version {version}"), candidates)
    }
}

pub struct ByReleaseMeta;

impl TemplateStrategy for ByReleaseMeta {
    fn name(&self) -> &'static str {
        "by-release-meta"
    }

    fn try_resolve(&self, module: &ModuleInfo, desired_channel: &str, catalog: &Catalog) -> anyhow::Result<Resolution> {
        let Some(meta) = catalog.release_meta(module.name()) else {
            return Ok(Resolution::NotApplicable);
        };

        let Some(version) = meta.spec.version_for_channel(desired_channel) else {
            return Err(LookupError::missing_channel_version(&format!(
                "module {} has no version in channel {desired_channel}",
                module.name()
            )));
        };

        let template_name = format!("{}-{version}", module.name());
        match catalog.template_named(&template_name) {
            Some(t) => Ok(Resolution::Found(t.clone())),
            None => Err(LookupError::template_not_found(&format!(
                "template {template_name} for module {} in channel {desired_channel}",
                module.name()
            ))),
        }
    }
}

// Legacy templates carry their channel in the spec
pub struct ByChannel;

impl TemplateStrategy for ByChannel {
    fn name(&self) -> &'static str {
        "by-channel"
    }

    fn try_resolve(&self, module: &ModuleInfo, desired_channel: &str, catalog: &Catalog) -> anyhow::Result<Resolution> {
        if desired_channel.is_empty() {
            return Err(LookupError::template_not_found(&format!(
                "module {}: specifying no channel is not allowed",
                module.name()
            )));
        }

        let all: Vec<_> = catalog.templates_for(module.name()).collect();
        if all.is_empty() {
            return Err(LookupError::not_in_catalog(module.name()));
        }

        let candidates: Vec<_> = all.into_iter().filter(|t| t.spec.channel == desired_channel).collect();
        let res = exactly_one(module.name(), &format!("channel {desired_channel}"), candidates);
        if let Ok(Resolution::Found(t)) = &res {
            debug!("using legacy template {} for module {}", t.name_any(), module.name());
        }
        res
    }
}

pub fn default_chain() -> Vec<Box<dyn TemplateStrategy>> {
    vec![Box::new(ByVersion), Box::new(ByReleaseMeta), Box::new(ByChannel)]
}
