use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use dr_core::progress::step_percent;
use dr_core::{Error, JobUpdate, Result};
use dr_engine::{EditRequest, prep};
use image::{DynamicImage, RgbImage};

use crate::registry::JobStore;
use crate::residency::ModelResidency;
use crate::storage::ResultStore;

/// One admitted job's inputs, handed from admission to the pool. Source
/// images travel here rather than in the registry record.
pub struct WorkItem {
    pub job_id: String,
    pub images: Vec<DynamicImage>,
    pub prompt: String,
    pub negative_prompt: String,
    pub steps: u32,
    pub guidance_scale: f32,
    pub seed: Option<u64>,
}

enum QueueSender {
    Unbounded(Sender<WorkItem>),
    Bounded(SyncSender<WorkItem>),
}

#[derive(Clone)]
struct WorkerContext {
    jobs: Arc<JobStore>,
    residency: Arc<ModelResidency>,
    results: Arc<ResultStore>,
}

/// Fixed-size pool of OS threads draining a single admission queue.
///
/// Pool size defaults to 1 so at most one invocation drives the model at a
/// time; that also makes completion order match submission order. Dropping
/// the pool closes the queue and joins the workers after they finish their
/// current item.
pub struct WorkerPool {
    tx: Option<QueueSender>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(
        workers: usize,
        queue_depth: Option<usize>,
        jobs: Arc<JobStore>,
        residency: Arc<ModelResidency>,
        results: Arc<ResultStore>,
    ) -> Self {
        let (tx, rx) = match queue_depth {
            Some(depth) => {
                let (tx, rx) = mpsc::sync_channel(depth);
                (QueueSender::Bounded(tx), rx)
            }
            None => {
                let (tx, rx) = mpsc::channel();
                (QueueSender::Unbounded(tx), rx)
            }
        };

        let rx = Arc::new(Mutex::new(rx));
        let ctx = WorkerContext {
            jobs,
            residency,
            results,
        };

        let handles = (0..workers.max(1))
            .map(|i| {
                let ctx = ctx.clone();
                let rx = rx.clone();
                thread::Builder::new()
                    .name(format!("edit-worker-{i}"))
                    .spawn(move || run(ctx, rx))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self {
            tx: Some(tx),
            handles,
        }
    }

    /// Enqueue without blocking. A bounded queue at capacity rejects with
    /// [`Error::QueueFull`].
    pub fn submit(&self, item: WorkItem) -> Result<()> {
        match self.tx.as_ref() {
            Some(QueueSender::Unbounded(tx)) => tx
                .send(item)
                .map_err(|_| Error::Execution("worker pool is shut down".into())),
            Some(QueueSender::Bounded(tx)) => tx.try_send(item).map_err(|e| match e {
                TrySendError::Full(_) => Error::QueueFull,
                TrySendError::Disconnected(_) => {
                    Error::Execution("worker pool is shut down".into())
                }
            }),
            None => Err(Error::Execution("worker pool is shut down".into())),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel makes every worker's recv() fail and exit.
        self.tx.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn run(ctx: WorkerContext, rx: Arc<Mutex<Receiver<WorkItem>>>) {
    loop {
        // recv() blocks with the receiver lock held, so idle workers wait
        // their turn on the lock; each wakes with exactly one item.
        let item = { rx.lock().unwrap().recv() };
        let Ok(item) = item else { break };

        let job_id = item.job_id.clone();
        if let Err(e) = process(&ctx, item) {
            // All per-job failures stop at this boundary: record them on
            // the job, keep the worker alive for the next item.
            tracing::error!(job_id = %job_id, error = %e, "job failed");
            let _ = ctx.jobs.update(&job_id, JobUpdate::failed(e.to_string()));
        }
    }
}

fn process(ctx: &WorkerContext, item: WorkItem) -> Result<()> {
    ctx.jobs.update(&item.job_id, JobUpdate::running())?;

    let handle = ctx.residency.acquire()?;

    let images: Vec<RgbImage> = item.images.iter().map(prep::normalize).collect();
    let request = EditRequest {
        images: &images,
        prompt: &item.prompt,
        negative_prompt: &item.negative_prompt,
        steps: item.steps,
        guidance_scale: item.guidance_scale,
        seed: item.seed,
    };

    let jobs = &ctx.jobs;
    let job_id = item.job_id.as_str();
    let steps = item.steps;
    let mut on_step = |step: usize| {
        let _ = jobs.update(job_id, JobUpdate::progress(step_percent(step, steps)));
    };

    let artifact = {
        let mut model = handle.lock().unwrap();
        model.invoke(&request, &mut on_step)?
    };
    // The invocation itself counts as an access for the idle window.
    ctx.residency.touch();

    let reference = ctx.results.save(&item.job_id, &artifact)?;
    ctx.jobs.update(&item.job_id, JobUpdate::succeeded(reference))?;
    tracing::info!(job_id = %item.job_id, "job succeeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_core::{Job, JobParams, JobStatus};
    use dr_engine::ModelLoader;
    use dr_engine::synthetic::SyntheticLoader;
    use std::time::Duration;
    use uuid::Uuid;

    struct BrokenLoader;

    impl ModelLoader for BrokenLoader {
        fn load(&self) -> Result<Box<dyn dr_engine::EditModel>> {
            Err(Error::ModelLoad("no weights on disk".into()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn fixture(loader: Arc<dyn ModelLoader>) -> (Arc<JobStore>, Arc<ModelResidency>, WorkerPool) {
        let jobs = Arc::new(JobStore::new());
        let residency = ModelResidency::new(loader, Duration::from_secs(60));
        let dir = std::env::temp_dir().join(format!("darkroom-test-{}", Uuid::new_v4().simple()));
        let results = Arc::new(ResultStore::new(dir).unwrap());
        let pool = WorkerPool::new(1, None, jobs.clone(), residency.clone(), results);
        (jobs, residency, pool)
    }

    fn queued_item(jobs: &JobStore) -> WorkItem {
        let job = Job::new(JobParams {
            prompt: "enhance".into(),
            negative_prompt: " ".into(),
            steps: 5,
            guidance_scale: 4.0,
            seed: Some(1),
            image_count: 1,
        });
        let item = WorkItem {
            job_id: job.id.clone(),
            images: vec![DynamicImage::new_rgb8(8, 8)],
            prompt: job.params.prompt.clone(),
            negative_prompt: job.params.negative_prompt.clone(),
            steps: job.params.steps,
            guidance_scale: job.params.guidance_scale,
            seed: job.params.seed,
        };
        jobs.create(job).unwrap();
        item
    }

    fn wait_terminal(jobs: &JobStore, id: &str) -> Job {
        for _ in 0..200 {
            let job = jobs.get(id).unwrap();
            if job.status.is_terminal() {
                return job;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("job {id} never reached a terminal state");
    }

    #[test]
    fn processes_item_to_success() {
        let (jobs, residency, pool) = fixture(Arc::new(SyntheticLoader::new()));
        let item = queued_item(&jobs);
        let id = item.job_id.clone();

        pool.submit(item).unwrap();
        let job = wait_terminal(&jobs, &id);

        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.progress, 100.0);
        assert_eq!(job.result, Some(format!("{id}.png")));
        assert!(residency.status().loaded);
    }

    #[test]
    fn load_failure_marks_job_failed_without_killing_worker() {
        let (jobs, residency, pool) = fixture(Arc::new(BrokenLoader));
        let first = queued_item(&jobs);
        let second = queued_item(&jobs);
        let (id1, id2) = (first.job_id.clone(), second.job_id.clone());

        pool.submit(first).unwrap();
        pool.submit(second).unwrap();

        for id in [&id1, &id2] {
            let job = wait_terminal(&jobs, id);
            assert_eq!(job.status, JobStatus::Failed);
            assert!(job.error.as_deref().unwrap().contains("model load failed"));
        }
        assert!(!residency.status().loaded);
    }
}
