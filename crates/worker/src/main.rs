use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xengine_core::matcher::DescriptorMatcher;
use xengine_worker::config::WorkerConfig;
use xengine_worker::pool::JobPool;

/// Resolve the runtime bundle for one execution directory.
///
/// Usage: `xengine-worker <execution-dir> [descriptor-id]`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xengine_worker=info,xengine_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env().context("Failed to load configuration")?;

    let mut args = std::env::args().skip(1);
    let execution_dir = args
        .next()
        .map(PathBuf::from)
        .context("usage: xengine-worker <execution-dir> [descriptor-id]")?;
    let requested_id = args.next();

    tracing::info!(
        archive_folder = ?config.engine.archive_folder,
        default_archive = %config.engine.default_archive.display(),
        dependency_matching = config.engine.dependency_matching,
        max_concurrent_jobs = config.max_concurrent_jobs,
        "Worker starting",
    );

    let matcher = Arc::new(DescriptorMatcher::from_config(&config.engine));
    let pool = JobPool::new(config.max_concurrent_jobs);

    let bundle = {
        let matcher = Arc::clone(&matcher);
        let dir = execution_dir.clone();
        pool.run(move || matcher.select_bundle(&dir, 0, requested_id.as_deref()))
            .await??
    };

    tracing::info!(
        execution_dir = %execution_dir.display(),
        descriptor_id = %bundle.descriptor.id,
        descriptor = bundle.descriptor.display_name(),
        default = bundle.is_default(),
        "Selected runtime bundle",
    );
    println!("{}", bundle.path.display());

    Ok(())
}
