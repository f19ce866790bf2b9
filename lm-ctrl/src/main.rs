mod context;
mod errors;
mod guard;
mod kyma;
mod lookup;
mod maintenance;
mod manifest;
mod metrics;
mod purge;
mod remote;
mod workqueue;

use std::sync::Arc;

use clap::Parser;
use clockabilly::{
    Clockable,
    UtcClock,
};
use futures::{
    StreamExt,
    TryStreamExt,
    future,
};
use kube::runtime::controller::{
    self,
    Controller,
};
use kube::runtime::{
    WatchStreamExt,
    watcher,
};
use lm_core::cache::{
    CachedDescriptorProvider,
    CrdCache,
};
use lm_core::client::KubeClusterClient;
use lm_core::logging;
use lm_core::metrics::MemoryRecorder;
use lm_core::prelude::*;
use tracing::*;

use crate::context::{
    KymaContext,
    PurgeContext,
    ReconcileOptions,
};
use crate::lookup::TemplateLookup;
use crate::maintenance::{
    MaintenancePolicy,
    PolicyMaintenanceWindow,
};
use crate::purge::{
    CrdMatcher,
    handle_purge,
    purge_key,
};
use crate::remote::{
    KubeconfigClientCache,
    KubeconfigConnector,
    LocalClientFactory,
    RemoteClientFactory,
};
use crate::workqueue::KeyedQueue;

#[derive(Clone, Debug, Parser)]
pub struct Options {
    // Runtimes live in their own clusters and are reached through the kubeconfig secret
    #[arg(long)]
    kcp_mode: bool,

    #[arg(long, default_value = DEFAULT_REMOTE_SYNC_NAMESPACE)]
    remote_sync_namespace: String,

    #[arg(long, default_value = "30s")]
    kyma_requeue_success_interval: humantime::Duration,

    #[arg(long, default_value = "5s")]
    kyma_requeue_busy_interval: humantime::Duration,

    #[arg(long, default_value = "30s")]
    kyma_requeue_warning_interval: humantime::Duration,

    #[arg(long, default_value = "2s")]
    kyma_requeue_error_interval: humantime::Duration,

    // Force-removes finalizers in the runtime of a Kyma stuck in deletion; off unless asked for
    #[arg(long)]
    enable_purge_finalizer: bool,

    // 0s purges as soon as the Kyma is deleted
    #[arg(long, default_value = "5m")]
    purge_finalizer_timeout: humantime::Duration,

    // kind.group entries; kind is a plural, singular or kind name, or "*" for the whole group
    #[arg(long, value_delimiter = ',')]
    skip_finalizer_removal_for_crds: Vec<String>,

    #[arg(long, default_value_t = 1)]
    max_concurrent_reconciles: u16,

    // Without a policy every maintenance window counts as open
    #[arg(long)]
    maintenance_policy_file: Option<String>,

    #[arg(short, long, default_value = "info")]
    verbosity: String,
}

fn build_remotes(opts: &Options, kcp: &ControlPlaneClient) -> Arc<dyn RemoteClientFactory> {
    if opts.kcp_mode {
        Arc::new(KubeconfigClientCache::new(kcp.clone(), Arc::new(KubeconfigConnector)))
    } else {
        Arc::new(LocalClientFactory::new(kcp))
    }
}

async fn run_purge(client: kube::Client, ctx: Arc<PurgeContext>, workers: usize) {
    let queue = KeyedQueue::new();
    let kymas = kube::Api::<Kyma>::all(client);
    let feeder = {
        let queue = queue.clone();
        watcher(kymas, Default::default())
            .default_backoff()
            .applied_objects()
            .try_for_each(move |kyma| {
                queue.add(purge_key(&kyma));
                future::ready(Ok(()))
            })
    };

    let handler = move |key| handle_purge(ctx.clone(), key);
    tokio::select! {
        res = feeder => {
            if let Err(err) = res {
                error!("purge watch stream ended: {err}");
            }
        },
        _ = queue.run(workers, handler) => (),
    }
    queue.shut_down();
}

#[instrument(ret, err)]
async fn run(opts: Options) -> EmptyResult {
    let client = kube::Client::try_default().await?;
    let kcp = ControlPlaneClient::new(Arc::new(KubeClusterClient::new(client.clone())));
    let clock: Arc<dyn Clockable + Send + Sync> = Arc::new(UtcClock);
    MemoryRecorder::new().install()?;

    let policy = match &opts.maintenance_policy_file {
        Some(path) => Some(MaintenancePolicy::from_file(path)?),
        None => None,
    };
    let maintenance = Arc::new(PolicyMaintenanceWindow::new(policy, clock.clone()));
    let remotes = build_remotes(&opts, &kcp);

    let kyma_ctx = Arc::new(KymaContext {
        kcp: kcp.clone(),
        remotes: remotes.clone(),
        lookup: TemplateLookup::new(Arc::new(CachedDescriptorProvider::new()), maintenance),
        crd_cache: Arc::new(CrdCache::new()),
        clock: clock.clone(),
        opts: ReconcileOptions::from(&opts),
    });
    let purge_ctx = Arc::new(PurgeContext {
        kcp,
        remotes,
        clock,
        timeout: *opts.purge_finalizer_timeout,
        error_requeue: *opts.kyma_requeue_error_interval,
        skip_crds: CrdMatcher::new(&opts.skip_finalizer_removal_for_crds),
    });

    let kyma_api = kube::Api::<Kyma>::all(client.clone());
    let manifest_api = kube::Api::<Manifest>::all(client.clone());
    let config = controller::Config::default().concurrency(opts.max_concurrent_reconciles);
    let ctrl = Controller::new(kyma_api, Default::default())
        .owns(manifest_api, Default::default())
        .with_config(config)
        .run(kyma::reconcile, kyma::error_policy, kyma_ctx)
        .for_each(|res| {
            if let Err(err) = res {
                debug!("kyma controller event: {err}");
            }
            future::ready(())
        });

    info!(
        "starting lifecycle-manager (kcp mode: {}, purge: {})",
        opts.kcp_mode, opts.enable_purge_finalizer
    );
    if opts.enable_purge_finalizer {
        tokio::join!(ctrl, run_purge(client, purge_ctx, opts.max_concurrent_reconciles.into()));
    } else {
        ctrl.await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> EmptyResult {
    let args = Options::parse();
    logging::setup(&args.verbosity)?;
    run(args).await
}

#[cfg(test)]
mod tests;
