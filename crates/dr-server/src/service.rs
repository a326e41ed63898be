use std::sync::Arc;
use std::time::Duration;

use dr_core::{Error, Job, JobParams, JobUpdate, Result};
use dr_engine::{ModelLoader, prep};
use image::DynamicImage;

use crate::config::Config;
use crate::registry::JobStore;
use crate::residency::{ModelResidency, ResidencyStatus};
use crate::storage::ResultStore;
use crate::worker::{WorkItem, WorkerPool};

const DEFAULT_STEPS: u32 = 50;
const DEFAULT_GUIDANCE_SCALE: f32 = 4.0;
const DEFAULT_NEGATIVE_PROMPT: &str = " ";
const MAX_IMAGES: usize = 3;

const IMAGE_DECODE_ERRORS: [&str; MAX_IMAGES] =
    ["Invalid image", "Invalid second image", "Invalid third image"];

/// A submission as it arrives from the transport layer: raw upload bytes
/// plus optional parameters, defaults not yet applied.
#[derive(Debug, Default)]
pub struct SubmitRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub steps: Option<u32>,
    pub guidance_scale: Option<f32>,
    pub seed: Option<u64>,
    /// Encoded source images by upload slot (`file`, `file2`, `file3`).
    /// The first slot is mandatory; later slots may be filled with gaps.
    pub images: [Option<Vec<u8>>; MAX_IMAGES],
}

/// Process-wide service object wiring registry, residency, artifact store
/// and worker pool together. Constructed once at startup and shared by
/// reference with every request handler.
pub struct Studio {
    jobs: Arc<JobStore>,
    residency: Arc<ModelResidency>,
    results: Arc<ResultStore>,
    pool: WorkerPool,
    model_name: String,
    idle_timeout: Duration,
}

impl Studio {
    pub fn new(config: &Config, loader: Arc<dyn ModelLoader>) -> Result<Self> {
        let model_name = loader.name().to_string();
        let jobs = Arc::new(JobStore::new());
        let results = Arc::new(ResultStore::new(config.results_dir.clone())?);
        let residency = ModelResidency::new(loader, config.idle_timeout);

        if config.preload_model {
            // Eager first load; the handle is dropped right away and the
            // idle window starts counting from here.
            residency.acquire()?;
        }

        let pool = WorkerPool::new(
            config.workers,
            config.queue_depth,
            jobs.clone(),
            residency.clone(),
            results.clone(),
        );

        Ok(Self {
            jobs,
            residency,
            results,
            pool,
            model_name,
            idle_timeout: config.idle_timeout,
        })
    }

    /// Validate, create the Queued record, and enqueue. Returns the created
    /// snapshot synchronously; never blocks on the model.
    pub fn submit(&self, request: SubmitRequest) -> Result<Job> {
        if request.prompt.trim().is_empty() {
            return Err(Error::InvalidInput("prompt must not be empty".into()));
        }
        if request.images[0].is_none() {
            return Err(Error::InvalidInput("at least one image is required".into()));
        }

        let steps = request.steps.unwrap_or(DEFAULT_STEPS);
        if steps == 0 {
            return Err(Error::InvalidInput(
                "num_inference_steps must be a positive integer".into(),
            ));
        }
        let guidance_scale = request.guidance_scale.unwrap_or(DEFAULT_GUIDANCE_SCALE);
        if !(guidance_scale > 0.0) {
            return Err(Error::InvalidInput("true_cfg_scale must be positive".into()));
        }

        // Decode errors name the upload slot the bytes came from, so a
        // submission of `file` + `file3` still reports "Invalid third image".
        let images: Vec<DynamicImage> = request
            .images
            .iter()
            .enumerate()
            .filter_map(|(slot, bytes)| bytes.as_deref().map(|b| (slot, b)))
            .map(|(slot, bytes)| {
                prep::decode(bytes)
                    .map_err(|_| Error::InvalidInput(IMAGE_DECODE_ERRORS[slot].into()))
            })
            .collect::<Result<_>>()?;

        let job = Job::new(JobParams {
            prompt: request.prompt,
            negative_prompt: request
                .negative_prompt
                .unwrap_or_else(|| DEFAULT_NEGATIVE_PROMPT.into()),
            steps,
            guidance_scale,
            seed: request.seed,
            image_count: images.len(),
        });
        self.jobs.create(job.clone())?;

        let item = WorkItem {
            job_id: job.id.clone(),
            images,
            prompt: job.params.prompt.clone(),
            negative_prompt: job.params.negative_prompt.clone(),
            steps,
            guidance_scale,
            seed: job.params.seed,
        };
        if let Err(e) = self.pool.submit(item) {
            // The record exists but no worker will ever claim it.
            let _ = self.jobs.update(&job.id, JobUpdate::failed(e.to_string()));
            return Err(e);
        }

        tracing::info!(job_id = %job.id, images = job.params.image_count, "job queued");
        Ok(job)
    }

    pub fn job(&self, id: &str) -> Result<Job> {
        self.jobs.get(id)
    }

    pub fn residency_status(&self) -> ResidencyStatus {
        self.residency.status()
    }

    pub fn force_unload(&self) -> bool {
        self.residency.unload()
    }

    pub fn artifact(&self, name: &str) -> Result<Vec<u8>> {
        self.results.read(name)
    }

    pub fn artifact_exists(&self, name: &str) -> bool {
        self.results.exists(name)
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_core::JobStatus;
    use dr_engine::synthetic::SyntheticLoader;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use uuid::Uuid;

    fn test_config() -> Config {
        Config {
            results_dir: std::env::temp_dir()
                .join(format!("darkroom-test-{}", Uuid::new_v4().simple())),
            preload_model: false,
            ..Config::default()
        }
    }

    fn studio() -> Studio {
        Studio::new(&test_config(), Arc::new(SyntheticLoader::new())).unwrap()
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([255, 0, 0]));
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn submit_returns_queued_job_with_defaults() {
        let studio = studio();
        let job = studio
            .submit(SubmitRequest {
                prompt: "enhance".into(),
                images: [Some(png_bytes(100, 100)), None, None],
                ..SubmitRequest::default()
            })
            .unwrap();

        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.params.steps, 50);
        assert_eq!(job.params.guidance_scale, 4.0);
        assert_eq!(job.params.negative_prompt, " ");
        assert_eq!(job.params.image_count, 1);
    }

    #[test]
    fn records_submitted_image_count() {
        let studio = studio();
        for count in 1..=3 {
            let mut images: [Option<Vec<u8>>; 3] = Default::default();
            for slot in images.iter_mut().take(count) {
                *slot = Some(png_bytes(10, 10));
            }
            let job = studio
                .submit(SubmitRequest {
                    prompt: "merge these".into(),
                    images,
                    ..SubmitRequest::default()
                })
                .unwrap();
            assert_eq!(job.params.image_count, count);
        }
    }

    #[test]
    fn empty_prompt_rejected_without_record() {
        let studio = studio();
        let err = studio
            .submit(SubmitRequest {
                prompt: "   ".into(),
                images: [Some(png_bytes(10, 10)), None, None],
                ..SubmitRequest::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn zero_images_rejected() {
        let studio = studio();
        let err = studio
            .submit(SubmitRequest {
                prompt: "enhance".into(),
                ..SubmitRequest::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn undecodable_image_rejected_with_ordinal_message() {
        let studio = studio();
        let err = studio
            .submit(SubmitRequest {
                prompt: "enhance".into(),
                images: [Some(png_bytes(10, 10)), Some(b"garbage".to_vec()), None],
                ..SubmitRequest::default()
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid input: Invalid second image");
    }

    #[test]
    fn decode_error_names_the_slot_even_with_a_gap() {
        // file + file3 without file2: the broken upload is still "third".
        let studio = studio();
        let err = studio
            .submit(SubmitRequest {
                prompt: "enhance".into(),
                images: [Some(png_bytes(10, 10)), None, Some(b"garbage".to_vec())],
                ..SubmitRequest::default()
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid input: Invalid third image");
    }

    #[test]
    fn invalid_parameters_rejected() {
        let studio = studio();
        let base = || SubmitRequest {
            prompt: "enhance".into(),
            images: [Some(png_bytes(10, 10)), None, None],
            ..SubmitRequest::default()
        };

        let err = studio
            .submit(SubmitRequest {
                steps: Some(0),
                ..base()
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = studio
            .submit(SubmitRequest {
                guidance_scale: Some(-1.0),
                ..base()
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn unknown_job_id_is_not_found() {
        let studio = studio();
        assert!(matches!(
            studio.job("no-such-job"),
            Err(Error::JobNotFound(_))
        ));
    }

    #[test]
    fn queue_rejection_leaves_the_record_failed() {
        // Slow load pins the single worker; one queue slot; the overflow
        // submission is rejected and its record must end up terminal, not
        // parked in Queued forever.
        let loader = Arc::new(SyntheticLoader::new().with_load_delay(Duration::from_millis(300)));
        let config = Config {
            queue_depth: Some(1),
            ..test_config()
        };
        let studio = Studio::new(&config, loader).unwrap();

        let mut accepted = Vec::new();
        let mut rejected = false;
        for _ in 0..8 {
            match studio.submit(SubmitRequest {
                prompt: "fill the queue".into(),
                steps: Some(1),
                images: [Some(png_bytes(8, 8)), None, None],
                ..SubmitRequest::default()
            }) {
                Ok(job) => accepted.push(job.id),
                Err(Error::QueueFull) => {
                    rejected = true;
                    break;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert!(rejected, "bounded queue never rejected");

        let orphan = studio
            .jobs
            .all()
            .into_iter()
            .find(|job| !accepted.contains(&job.id))
            .expect("rejected submission left a record");
        assert_eq!(orphan.status, JobStatus::Failed);
        assert_eq!(orphan.error.as_deref(), Some("admission queue is full"));
    }
}
