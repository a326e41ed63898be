use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

use dr_core::{Error, Result};
use dr_engine::{EditModel, ModelLoader};

/// The one memory-resident model instance, shared with the worker that is
/// currently invoking it.
pub type ModelHandle = Arc<Mutex<Box<dyn EditModel>>>;

/// Read-only snapshot for status reporting.
#[derive(Debug, Clone, Copy)]
pub struct ResidencyStatus {
    pub loaded: bool,
    pub idle: Duration,
    /// Remaining idle window; `None` when unloaded.
    pub until_unload: Option<Duration>,
}

struct Inner {
    model: Option<ModelHandle>,
    last_access: Instant,
}

/// Lifecycle manager for the single compute resource: lazy load on demand,
/// idle-timeout unload, manual unload.
///
/// One mutex guards both the handle and the access timestamp. Loading and
/// releasing are rare and slow, so a single coarse lock is the point:
/// acquisition can never race with an idle check deciding to unload. The
/// idle check itself is a dedicated ticking thread sharing that lock, not
/// a chain of re-armed one-shot timers.
pub struct ModelResidency {
    loader: Arc<dyn ModelLoader>,
    idle_timeout: Duration,
    inner: Mutex<Inner>,
}

impl ModelResidency {
    pub fn new(loader: Arc<dyn ModelLoader>, idle_timeout: Duration) -> Arc<Self> {
        let residency = Arc::new(Self {
            loader,
            idle_timeout,
            inner: Mutex::new(Inner {
                model: None,
                last_access: Instant::now(),
            }),
        });

        let tick = (idle_timeout / 4).clamp(Duration::from_millis(10), Duration::from_secs(1));
        Self::spawn_idle_checker(Arc::downgrade(&residency), tick);

        residency
    }

    /// Stamp an access and return the resident handle, performing the
    /// (blocking, potentially multi-minute) load first if needed.
    ///
    /// A failed load surfaces to the caller and leaves the state unloaded;
    /// the next call simply retries.
    pub fn acquire(&self) -> Result<ModelHandle> {
        let mut inner = self.inner.lock().unwrap();
        inner.last_access = Instant::now();

        if inner.model.is_none() {
            tracing::info!(
                model = self.loader.name(),
                idle_timeout_secs = self.idle_timeout.as_secs(),
                "loading model"
            );
            let model = self.loader.load().map_err(|e| match e {
                Error::ModelLoad(_) => e,
                other => Error::ModelLoad(other.to_string()),
            })?;
            inner.model = Some(Arc::new(Mutex::new(model)));
        }

        Ok(inner.model.as_ref().unwrap().clone())
    }

    /// Record an access without loading. Called after an invocation
    /// completes so a long-running job counts against the idle window from
    /// its end, not its start.
    pub fn touch(&self) {
        self.inner.lock().unwrap().last_access = Instant::now();
    }

    /// Release immediately regardless of the idle window. Returns whether
    /// a model was resident; idempotent.
    pub fn unload(&self) -> bool {
        let previously_loaded = self.inner.lock().unwrap().model.take().is_some();
        if previously_loaded {
            tracing::info!("model unloaded on request");
        }
        previously_loaded
    }

    pub fn status(&self) -> ResidencyStatus {
        let inner = self.inner.lock().unwrap();
        let idle = inner.last_access.elapsed();
        let loaded = inner.model.is_some();
        ResidencyStatus {
            loaded,
            idle,
            until_unload: loaded.then(|| self.idle_timeout.saturating_sub(idle)),
        }
    }

    /// Timer body: unload once the idle window has fully elapsed.
    fn check_idle(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.model.is_some() && inner.last_access.elapsed() >= self.idle_timeout {
            inner.model = None;
            tracing::info!(
                idle_timeout_secs = self.idle_timeout.as_secs(),
                "model unloaded after idle timeout"
            );
        }
    }

    fn spawn_idle_checker(this: Weak<Self>, tick: Duration) {
        thread::Builder::new()
            .name("model-idle-check".into())
            .spawn(move || {
                loop {
                    thread::sleep(tick);
                    // Stop ticking once the controller is gone.
                    let Some(residency) = this.upgrade() else { break };
                    residency.check_idle();
                }
            })
            .expect("failed to spawn idle-check thread");
    }
}
