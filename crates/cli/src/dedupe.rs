use crate::{print_stdout, ClusterArgs, DedupeArgs};
use anyhow::{bail, Context, Result};
use rbdedup_engine::{
    render_report, DuplicateSet, FailureMode, IndexBuilder, NoisePolicy, RemovalPlan, Remover,
};
use rbdedup_protocol::{serialize_json_pretty, OutputMode};
use rbdedup_source::{
    connect, BindingSupplier, ClusterConfig, ClusterSupplier, DecodePolicy, FileSupplier,
    KubeDeleter,
};
use std::time::Duration;
use tokio::sync::watch;

pub(crate) async fn run(args: DedupeArgs, cluster: ClusterArgs) -> Result<()> {
    let policy = noise_policy(&args)?;
    let decode = if args.strict {
        DecodePolicy::Strict
    } else {
        DecodePolicy::Lenient
    };
    let cluster_config = ClusterConfig {
        kubeconfig: cluster.kubeconfig.clone(),
        context: cluster.context.clone(),
        timeout: Duration::from_secs(args.timeout_secs),
        insecure_skip_tls_verify: args.insecure_skip_tls_verify,
    };

    let file_mode = args.input_file_rbs.is_some() || args.input_file_crbs.is_some();
    let mut dry_run = args.dry_run;
    if file_mode && !dry_run && cluster.kubeconfig.is_none() {
        log::info!("input files given without --kubeconfig; nothing to delete through, running dry");
        dry_run = true;
    }

    let client = if dry_run && file_mode {
        None
    } else {
        Some(
            connect(&cluster_config)
                .await
                .context("Failed to connect to the cluster")?,
        )
    };

    let supplier: Box<dyn BindingSupplier> = match (&client, file_mode) {
        (Some(client), false) => Box::new(
            ClusterSupplier::new(client.clone())
                .with_page_size(args.page_size)
                .with_policy(decode),
        ),
        _ => {
            let mut files = FileSupplier::new().with_policy(decode);
            if let Some(path) = &args.input_file_rbs {
                files = files.with_rolebindings(path);
            }
            if let Some(path) = &args.input_file_crbs {
                files = files.with_clusterrolebindings(path);
            }
            Box::new(files)
        }
    };

    log::debug!("reading bindings from {}", supplier.describe());
    let (collections, failures) = supplier.supply().await.split();
    for (kind, err) in &failures {
        log::error!("could not read {kind}: {err}");
    }

    let mut builder = IndexBuilder::new(policy);
    for collection in &collections {
        builder.ingest_all(&collection.bindings);
    }
    let inventory = builder.finalize();
    let stats = inventory.stats();
    log::info!(
        "indexed {} binding(s), {} noise key(s) ignored",
        stats.bindings,
        stats.noise_keys
    );
    let duplicates = inventory.select_duplicates();

    let mode: OutputMode = args.output.into();
    log::debug!("rendering {} report", mode.as_str());
    if let Some(report) = render_report(&inventory, &duplicates, mode) {
        print_stdout(&serialize_json_pretty(&report)?)?;
    }

    if let Some((kind, err)) = failures.into_iter().next() {
        return Err(anyhow::Error::new(err)).context(format!(
            "Failed to read {kind}; no bindings were removed"
        ));
    }

    if dry_run {
        let plan = RemovalPlan::for_set(&duplicates);
        log::info!("dry run: {} binding(s) would be removed", plan.deletions());
        return Ok(());
    }

    let client = client.context("no cluster client for removal")?;
    let mode = if args.keep_going {
        FailureMode::BestEffort
    } else {
        FailureMode::FailFast
    };
    remove(KubeDeleter::new(client), mode, &duplicates).await
}

fn noise_policy(args: &DedupeArgs) -> Result<NoisePolicy> {
    let mut policy = if args.no_default_noise {
        NoisePolicy::empty()
    } else {
        NoisePolicy::default()
    };
    if let Some(path) = &args.noise_config {
        policy = NoisePolicy::from_file(path, policy)
            .with_context(|| format!("Failed to load noise config {}", path.display()))?;
    }
    policy.extend(args.noise_patterns.iter().cloned());
    policy.validate().context("Invalid --noise-pattern")?;
    Ok(policy)
}

async fn remove(deleter: KubeDeleter, mode: FailureMode, duplicates: &DuplicateSet) -> Result<()> {
    if duplicates.is_empty() {
        return Ok(());
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupted; finishing the current delete and stopping");
            let _ = cancel_tx.send(true);
        }
    });

    let remover = Remover::new(deleter, mode).with_cancellation(cancel_rx);
    let report = remover.remove_all(duplicates).await;
    interrupt.abort();

    let cancelled = report.cancelled();
    let deleted = report
        .into_result()
        .context("Failed to remove duplicate bindings")?;
    if cancelled > 0 {
        bail!("removal interrupted: {deleted} deleted, {cancelled} not attempted");
    }
    log::info!("removed {deleted} duplicate binding(s)");
    Ok(())
}
