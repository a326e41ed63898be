//! Built-in stand-in for a real diffusion edit pipeline.
//!
//! Produces a deterministic-when-seeded edit of the first source image so
//! the whole job pipeline (progress callbacks, artifact persistence) can
//! run without GPU weights. In production you'd swap the loader for one
//! backed by an actual model runtime.

use std::thread;
use std::time::Duration;

use dr_core::{Error, Result};
use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{EditModel, EditRequest, ModelLoader};

const MODEL_NAME: &str = "darkroom/synthetic-edit";

pub struct SyntheticModel {
    step_delay: Duration,
}

impl EditModel for SyntheticModel {
    fn invoke(
        &mut self,
        request: &EditRequest<'_>,
        on_step: &mut dyn FnMut(usize),
    ) -> Result<RgbImage> {
        let first = request
            .images
            .first()
            .ok_or_else(|| Error::Execution("no input images".into()))?;

        let seed = request.seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = StdRng::seed_from_u64(seed);

        for step in 0..request.steps as usize {
            if !self.step_delay.is_zero() {
                thread::sleep(self.step_delay);
            }
            on_step(step);
        }

        let tint = tint_from_prompt(request.prompt);
        // Stronger guidance pulls the output further toward the tint.
        let weight = (request.guidance_scale / 20.0).clamp(0.1, 0.6);

        let mut out = first.clone();
        for pixel in out.pixels_mut() {
            for (channel, base) in pixel.0.iter_mut().zip(tint) {
                let mixed = *channel as f32 * (1.0 - weight) + base as f32 * weight;
                let noise: f32 = rng.random_range(-4.0..4.0);
                *channel = (mixed + noise).clamp(0.0, 255.0) as u8;
            }
        }

        Ok(out)
    }
}

/// Pick a tint hint from the prompt (very naive keyword match).
fn tint_from_prompt(prompt: &str) -> [u8; 3] {
    let prompt_lower = prompt.to_lowercase();

    if prompt_lower.contains("red") {
        [255, 100, 100]
    } else if prompt_lower.contains("blue") {
        [100, 100, 255]
    } else if prompt_lower.contains("green") {
        [100, 255, 100]
    } else if prompt_lower.contains("yellow") {
        [255, 255, 100]
    } else if prompt_lower.contains("purple") {
        [200, 100, 255]
    } else {
        // Default: neutral gray-blue
        [150, 150, 180]
    }
}

/// Loader for [`SyntheticModel`]. `load_delay` simulates the slow weight
/// acquisition of a real pipeline; `step_delay` slows iterations down so
/// in-flight progress is observable.
#[derive(Debug, Clone, Default)]
pub struct SyntheticLoader {
    load_delay: Duration,
    step_delay: Duration,
}

impl SyntheticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }
}

impl ModelLoader for SyntheticLoader {
    fn load(&self) -> Result<Box<dyn EditModel>> {
        if !self.load_delay.is_zero() {
            thread::sleep(self.load_delay);
        }
        tracing::info!(model = MODEL_NAME, "model loaded");
        Ok(Box::new(SyntheticModel {
            step_delay: self.step_delay,
        }))
    }

    fn name(&self) -> &str {
        MODEL_NAME
    }
}
