use std::collections::HashSet;

use lm_api::v1beta2::{
    Kyma,
    Module,
    ModuleStatus,
};
use lm_core::prelude::*;

use crate::errors::LookupError;

// A module the Kyma refers to, either because it's enabled in the spec or because it's still
// reported in the status after being removed from the spec
#[derive(Debug)]
pub struct ModuleInfo {
    pub module: Module,
    pub enabled: bool,
    pub missing_template_ref: bool,
}

impl ModuleInfo {
    fn enabled(module: &Module) -> ModuleInfo {
        ModuleInfo { module: module.clone(), enabled: true, missing_template_ref: false }
    }

    fn disabled(status: &ModuleStatus) -> ModuleInfo {
        let mut module = Module::new(&status.name);
        module.channel.clone_from(&status.channel);
        module.version.clone_from(&status.version);
        ModuleInfo { module, enabled: false, missing_template_ref: status.template.is_none() }
    }

    pub fn validate(&self) -> EmptyResult {
        if self.enabled {
            return validate_spec_module(&self.module);
        }
        if self.missing_template_ref {
            return Err(LookupError::invalid_module_in_status(&format!(
                "{}: ModuleTemplate reference is missing",
                self.module.name
            )));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.module.name
    }

    pub fn is_unmanaged(&self) -> bool {
        self.enabled && !self.module.managed
    }

    // Pinned to a version in the spec, or (once disabled) recorded in the status with the "none"
    // channel that version-pinned installs get
    pub fn is_installed_by_version(&self) -> bool {
        let channel = self.module.channel.as_deref().unwrap_or_default();
        let has_version = self.module.version.as_deref().is_some_and(|v| !v.is_empty());
        (self.enabled && has_version && channel.is_empty())
            || (!self.enabled && channel.eq_ignore_ascii_case(NONE_CHANNEL) && has_version)
    }
}

fn validate_spec_module(module: &Module) -> EmptyResult {
    let channel = module.channel.as_deref().unwrap_or_default();
    if channel.eq_ignore_ascii_case(NONE_CHANNEL) {
        return Err(LookupError::invalid_module_in_spec(&format!(
            "{}: channel \"none\" is not allowed",
            module.name
        )));
    }
    if module.version.as_deref().is_some_and(|v| !v.is_empty()) && !channel.is_empty() {
        return Err(LookupError::invalid_module_in_spec(&format!(
            "{}: version and channel are mutually exclusive",
            module.name
        )));
    }
    Ok(())
}

pub fn discover_modules(kyma: &Kyma) -> Vec<ModuleInfo> {
    let mut seen = HashSet::new();
    let mut infos: Vec<_> = kyma
        .spec
        .modules
        .iter()
        .filter(|m| seen.insert(m.name.clone()))
        .map(ModuleInfo::enabled)
        .collect();

    if let Some(status) = kyma.status.as_ref() {
        infos.extend(
            status
                .modules
                .iter()
                .filter(|s| seen.insert(s.name.clone()))
                .map(ModuleInfo::disabled),
        );
    }
    infos
}
