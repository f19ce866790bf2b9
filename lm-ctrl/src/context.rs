use std::sync::Arc;
use std::time::Duration;

use clockabilly::Clockable;
use lm_core::cache::CrdCache;
use lm_core::prelude::*;

use crate::Options;
use crate::lookup::TemplateLookup;
use crate::manifest::SynthesisOptions;
use crate::purge::CrdMatcher;
use crate::remote::RemoteClientFactory;

#[derive(Clone, Debug)]
pub struct RequeueIntervals {
    pub success: Duration,
    pub busy: Duration,
    pub warning: Duration,
    pub error: Duration,
}

impl Default for RequeueIntervals {
    fn default() -> Self {
        RequeueIntervals {
            success: Duration::from_secs(REQUEUE_SUCCESS_SECONDS),
            busy: Duration::from_secs(REQUEUE_BUSY_SECONDS),
            warning: Duration::from_secs(REQUEUE_WARNING_SECONDS),
            error: Duration::from_secs(REQUEUE_ERROR_SECONDS),
        }
    }
}

impl RequeueIntervals {
    pub fn for_state(&self, state: State) -> Duration {
        match state {
            State::Ready | State::Unmanaged => self.success,
            State::Processing | State::Deleting => self.busy,
            State::Warning => self.warning,
            State::Error => self.error,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ReconcileOptions {
    pub kcp_mode: bool,
    pub remote_sync_namespace: String,
    pub requeue: RequeueIntervals,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        ReconcileOptions {
            kcp_mode: false,
            remote_sync_namespace: DEFAULT_REMOTE_SYNC_NAMESPACE.into(),
            requeue: Default::default(),
        }
    }
}

impl From<&Options> for ReconcileOptions {
    fn from(opts: &Options) -> Self {
        ReconcileOptions {
            kcp_mode: opts.kcp_mode,
            remote_sync_namespace: opts.remote_sync_namespace.clone(),
            requeue: RequeueIntervals {
                success: *opts.kyma_requeue_success_interval,
                busy: *opts.kyma_requeue_busy_interval,
                warning: *opts.kyma_requeue_warning_interval,
                error: *opts.kyma_requeue_error_interval,
            },
        }
    }
}

// Everything the Kyma reconciler needs, built once at startup and shared by every reconcile
pub struct KymaContext {
    pub kcp: ControlPlaneClient,
    pub remotes: Arc<dyn RemoteClientFactory>,
    pub lookup: TemplateLookup,
    pub crd_cache: Arc<CrdCache>,
    pub clock: Arc<dyn Clockable + Send + Sync>,
    pub opts: ReconcileOptions,
}

impl KymaContext {
    pub fn synthesis_options(&self, kyma: &Kyma) -> SynthesisOptions {
        SynthesisOptions {
            remote: self.remote_sync_enabled(kyma),
            remote_sync_namespace: self.opts.remote_sync_namespace.clone(),
        }
    }

    pub fn remote_sync_enabled(&self, kyma: &Kyma) -> bool {
        self.opts.kcp_mode && !kyma.sync_disabled()
    }
}

pub struct PurgeContext {
    pub kcp: ControlPlaneClient,
    pub remotes: Arc<dyn RemoteClientFactory>,
    pub clock: Arc<dyn Clockable + Send + Sync>,
    pub timeout: Duration,
    pub error_requeue: Duration,
    // CRDs whose CRs keep their finalizers
    pub skip_crds: CrdMatcher,
}
