use lm_api::v1beta2::ModuleStatus;
use semver::Version;
use tracing::*;

use crate::errors::LookupError;

// Accepts the loose forms module authors publish ("v1.2", "1", "1.2.0-rc.1") by padding the missing
// minor and patch numbers before parsing
fn core_version(v: &str) -> Option<Version> {
    let v = v.trim();
    let v = v.strip_prefix(['v', 'V']).unwrap_or(v);
    let core_end = v.find(['-', '+']).unwrap_or(v.len());
    let (core, suffix) = v.split_at(core_end);
    let padding = match core.matches('.').count() {
        0 => ".0.0",
        1 => ".0",
        _ => "",
    };
    Version::parse(&format!("{core}{padding}{suffix}"))
        .ok()
        .map(|v| Version::new(v.major, v.minor, v.patch))
}

// Once a module has been installed at some version, switching to a channel that resolves to an
// older version is refused; pre-release and build metadata are ignored for the comparison.
pub fn check_channel_skew(new_version: &str, desired_channel: &str, status: &ModuleStatus) -> anyhow::Result<()> {
    if status.template.is_none() {
        return Ok(());
    }

    let Some(new) = core_version(new_version) else {
        return Err(LookupError::template_update_not_allowed(
            "could not handle channel skew as descriptor from template contains invalid version",
        ));
    };
    let Some(installed) = core_version(status.version.as_deref().unwrap_or_default()) else {
        return Err(LookupError::template_update_not_allowed(
            "could not handle channel skew as module status contains invalid version",
        ));
    };

    if new < installed {
        let msg = format!(
            "ignore channel skew (from {} to {desired_channel}), as a higher version ({installed}) of the module was previously installed",
            status.channel.as_deref().unwrap_or_default(),
        );
        info!("{}: {msg}", status.name);
        return Err(LookupError::template_update_not_allowed(&msg));
    }
    Ok(())
}
