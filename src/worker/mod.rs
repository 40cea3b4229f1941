//! Long-lived worker pool.
//!
//! Each worker is an OS thread driving its own current-thread tokio runtime
//! and its own [`WorkerRegistry`]. Workers share the listening socket and
//! the rate limiter, so a quota holds across the whole group. A registry is
//! built once when its worker starts and is read-only afterwards.

use std::future::Future;
use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, anyhow};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crate::dispatch::Dispatcher;
use crate::ratelimit::{MemoryRateLimiter, RateLimiter};
use crate::registry::{WorkerRegistry, WorkerRegistryBuilder};
use crate::server::{serve, shutdown_signal};

type BuilderFactory = dyn Fn() -> WorkerRegistryBuilder + Send + Sync;

/// Runs N workers over one listener.
///
/// # Example
/// ```ignore
/// let listener = std::net::TcpListener::bind("0.0.0.0:8080")?;
/// WorkerGroup::new(|| {
///     WorkerRegistry::builder()
///         .with_settings(Settings::from_config(&ConfigService::new()))
///         .with_controller::<UserController>()
/// })
/// .run(listener)?;
/// ```
pub struct WorkerGroup {
    factory: Arc<BuilderFactory>,
    rate_limiter: Arc<dyn RateLimiter>,
    worker_count: usize,
}

impl WorkerGroup {
    /// `factory` is called once per worker; the worker count defaults to the
    /// `worker_count` of the settings it returns.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> WorkerRegistryBuilder + Send + Sync + 'static,
    {
        let worker_count = factory().settings().worker_count.max(1);
        Self {
            factory: Arc::new(factory),
            rate_limiter: Arc::new(MemoryRateLimiter::new()),
            worker_count,
        }
    }

    /// Limiter shared by every worker whose builder does not set its own.
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.max(1);
        self
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Builds the registry worker `worker_id` serves from.
    pub fn build_registry(&self, worker_id: usize) -> crate::Result<Arc<WorkerRegistry>> {
        let builder = (self.factory)().with_default_rate_limiter(self.rate_limiter.clone());
        build_worker_registry(builder, worker_id)
    }

    /// Serves until Ctrl+C or SIGTERM.
    pub fn run(self, listener: StdTcpListener) -> anyhow::Result<()> {
        self.run_until(listener, shutdown_signal())
    }

    /// Serves until `shutdown` completes, then waits for every worker to
    /// drain its connections.
    pub fn run_until<F>(self, listener: StdTcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        listener
            .set_nonblocking(true)
            .context("failed to make listener non-blocking")?;
        let (stop_tx, stop_rx) = watch::channel(false);
        let worker_count = self.worker_count;
        let group = Arc::new(self);

        let mut handles: Vec<JoinHandle<anyhow::Result<()>>> = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let listener = listener.try_clone().context("failed to share listener")?;
            let group = group.clone();
            let stop_rx = stop_rx.clone();
            let handle = thread::Builder::new()
                .name(format!("switchyard-worker-{worker_id}"))
                .spawn(move || run_worker(worker_id, listener, group, stop_rx))
                .with_context(|| format!("failed to spawn worker {worker_id}"))?;
            handles.push(handle);
        }
        info!(workers = worker_count, "Worker group started");

        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to build supervisor runtime")?
            .block_on(shutdown);

        info!("Stopping workers");
        let _ = stop_tx.send(true);

        let mut failed = 0;
        for (worker_id, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(worker = worker_id, error = ?e, "Worker exited with error");
                    failed += 1;
                }
                Err(_) => {
                    error!(worker = worker_id, "Worker panicked");
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            return Err(anyhow!("{failed} worker(s) failed"));
        }
        info!("Worker group stopped");
        Ok(())
    }
}

/// Builds the registry for one worker, loading the cached route table
/// named in its settings.
pub fn build_worker_registry(
    builder: WorkerRegistryBuilder,
    worker_id: usize,
) -> crate::Result<Arc<WorkerRegistry>> {
    let builder = builder.with_worker_id(worker_id);
    let builder = match builder.settings().cache_file_path.clone() {
        Some(path) => builder.with_cached_routes(&path),
        None => builder,
    };
    builder.build()
}

fn run_worker(
    worker_id: usize,
    listener: StdTcpListener,
    group: Arc<WorkerGroup>,
    mut stop_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .with_context(|| format!("failed to build runtime for worker {worker_id}"))?;

    runtime.block_on(async move {
        let registry = group
            .build_registry(worker_id)
            .with_context(|| format!("failed to build registry for worker {worker_id}"))?;
        let ready = registry.warm_controllers();
        info!(worker = worker_id, controllers = ready, "Worker ready");

        let listener = TcpListener::from_std(listener)?;
        let stop = async move {
            let _ = stop_rx.wait_for(|stop| *stop).await;
        };
        serve(listener, Dispatcher::new(registry), stop).await?;
        Ok(())
    })
}
