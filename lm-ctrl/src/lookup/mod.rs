mod discovery;
mod skew;
mod strategies;

use std::sync::Arc;

use lm_api::v1beta2::ModuleStatus;
use lm_core::cache::{
    Descriptor,
    DescriptorProvider,
};
use lm_core::prelude::*;
use semver::Version;
use tracing::*;

pub use self::discovery::*;
pub use self::skew::*;
pub use self::strategies::*;
use crate::errors::LookupError;
use crate::maintenance::MaintenanceWindow;

// A snapshot of every template and release meta in the Kyma's namespace, listed once per reconcile
// so that every module resolves against the same view of the world
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub templates: Vec<ModuleTemplate>,
    pub metas: Vec<ModuleReleaseMeta>,
}

impl Catalog {
    pub async fn fetch(kcp: &ControlPlaneClient, namespace: &str) -> anyhow::Result<Catalog> {
        let templates = kcp.list_typed::<ModuleTemplate>(Some(namespace), None).await?;
        let metas = kcp.list_typed::<ModuleReleaseMeta>(Some(namespace), None).await?;
        Ok(Catalog { templates, metas })
    }

    pub fn release_meta(&self, module: &str) -> Option<&ModuleReleaseMeta> {
        self.metas.iter().find(|m| m.spec.module_name == module || m.name_any() == module)
    }

    pub fn template_named(&self, name: &str) -> Option<&ModuleTemplate> {
        self.templates.iter().find(|t| t.name_any() == name)
    }

    pub fn templates_for<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a ModuleTemplate> + 'a {
        self.templates.iter().filter(move |t| template_module_name(t) == module)
    }

    pub fn mandatory_templates(&self) -> impl Iterator<Item = &ModuleTemplate> {
        self.templates.iter().filter(|t| is_mandatory(t))
    }
}

pub fn template_module_name(template: &ModuleTemplate) -> &str {
    if !template.spec.module_name.is_empty() {
        return &template.spec.module_name;
    }
    template.labels().get(MODULE_NAME_LABEL).map(String::as_str).unwrap_or_default()
}

pub fn is_mandatory(template: &ModuleTemplate) -> bool {
    template.spec.mandatory || template.label_is_true(MANDATORY_MODULE_LABEL)
}

// Beta and internal modules are only offered to Kymas that opted in; the release meta is the
// authority when there is one, otherwise the (legacy) template labels are
pub fn is_visible(template: &ModuleTemplate, meta: Option<&ModuleReleaseMeta>, kyma: &Kyma) -> bool {
    let (beta, internal) = match meta {
        Some(m) => (m.spec.beta, m.spec.internal),
        None => (template.label_is_true(BETA_LABEL), template.label_is_true(INTERNAL_LABEL)),
    };
    (!beta || kyma.is_beta()) && (!internal || kyma.is_internal())
}

#[derive(Clone, Debug)]
pub struct ResolvedTemplate {
    pub template: ModuleTemplate,
    pub descriptor: Arc<Descriptor>,
    pub release_meta: Option<ModuleReleaseMeta>,
}

impl ResolvedTemplate {
    // The descriptor is what actually gets installed, so its version wins over the template's
    pub fn version(&self) -> &str {
        if self.descriptor.version.is_empty() { &self.template.spec.version } else { &self.descriptor.version }
    }
}

pub struct TemplateInfo {
    pub desired_channel: String,
    pub outcome: anyhow::Result<ResolvedTemplate>,
}

pub struct TemplateLookup {
    strategies: Vec<Box<dyn TemplateStrategy>>,
    descriptors: Arc<dyn DescriptorProvider>,
    maintenance: Arc<dyn MaintenanceWindow>,
}

impl TemplateLookup {
    pub fn new(descriptors: Arc<dyn DescriptorProvider>, maintenance: Arc<dyn MaintenanceWindow>) -> TemplateLookup {
        TemplateLookup { strategies: default_chain(), descriptors, maintenance }
    }

    pub fn resolve(&self, module: &ModuleInfo, kyma: &Kyma, catalog: &Catalog) -> TemplateInfo {
        let desired_channel = if module.is_installed_by_version() {
            NONE_CHANNEL.into()
        } else {
            kyma.desired_channel(module.module.channel.as_deref())
        };
        let outcome = self.resolve_with_channel(module, &desired_channel, kyma, catalog);
        if let Err(err) = &outcome {
            debug!("could not resolve template for module {}: {err}", module.name());
        }
        TemplateInfo { desired_channel, outcome }
    }

    fn resolve_with_channel(
        &self,
        module: &ModuleInfo,
        desired_channel: &str,
        kyma: &Kyma,
        catalog: &Catalog,
    ) -> anyhow::Result<ResolvedTemplate> {
        module.validate()?;

        let template = self.run_chain(module, desired_channel, catalog)?;
        let release_meta = catalog.release_meta(module.name()).cloned();

        if !is_visible(&template, release_meta.as_ref(), kyma) {
            return Err(LookupError::template_not_allowed(&format!(
                "module {} is not available for this runtime (beta or internal)",
                module.name()
            )));
        }
        if is_mandatory(&template) {
            return Err(LookupError::mandatory_template(&template.name_any()));
        }

        self.check_maintenance(&template, kyma)?;

        let descriptor = self
            .descriptors
            .get_descriptor(&template)
            .map_err(|e| LookupError::descriptor(&format!("{}: {e}", template.name_any())))?;

        let resolved = ResolvedTemplate { template, descriptor, release_meta };
        if let Some(status) = status_for(kyma, module.name()) {
            check_channel_skew(resolved.version(), desired_channel, status)?;
        }
        Ok(resolved)
    }

    fn run_chain(&self, module: &ModuleInfo, desired_channel: &str, catalog: &Catalog) -> anyhow::Result<ModuleTemplate> {
        for strategy in &self.strategies {
            match strategy.try_resolve(module, desired_channel, catalog)? {
                Resolution::NotApplicable => continue,
                Resolution::Found(template) => {
                    debug!("strategy {} picked template {} for {}", strategy.name(), template.name_any(), module.name());
                    return Ok(template);
                },
            }
        }
        Err(LookupError::not_in_catalog(module.name()))
    }

    fn check_maintenance(&self, template: &ModuleTemplate, kyma: &Kyma) -> EmptyResult {
        if !self.maintenance.is_required(template, kyma) {
            return Ok(());
        }
        match self.maintenance.is_active(kyma) {
            Ok(true) => Ok(()),
            Ok(false) => Err(LookupError::waiting_for_maintenance_window(&template.name_any())),
            Err(err) => Err(LookupError::maintenance_window_unknown(&err.to_string())),
        }
    }

    // Mandatory modules are installed everywhere, at the highest version on offer
    pub fn resolve_mandatory(&self, catalog: &Catalog) -> Vec<(String, anyhow::Result<ResolvedTemplate>)> {
        let mut latest: Vec<&ModuleTemplate> = vec![];
        for template in catalog.mandatory_templates() {
            let name = template_module_name(template);
            match latest.iter_mut().find(|t| template_module_name(t) == name) {
                Some(existing) if parsed_version(template) > parsed_version(existing) => *existing = template,
                Some(_) => (),
                None => latest.push(template),
            }
        }

        latest
            .into_iter()
            .map(|template| {
                let outcome = self
                    .descriptors
                    .get_descriptor(template)
                    .map(|descriptor| ResolvedTemplate { template: template.clone(), descriptor, release_meta: None })
                    .map_err(|e| LookupError::descriptor(&format!("{}: {e}", template.name_any())));
                (template_module_name(template).to_string(), outcome)
            })
            .collect()
    }
}

fn parsed_version(template: &ModuleTemplate) -> Option<Version> {
    Version::parse(template.spec.version.trim_start_matches('v')).ok()
}

pub fn status_for<'a>(kyma: &'a Kyma, module: &str) -> Option<&'a ModuleStatus> {
    kyma.status.as_ref()?.modules.iter().find(|m| m.name == module)
}

#[cfg(test)]
mod tests;
