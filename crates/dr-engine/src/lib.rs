pub mod prep;
pub mod synthetic;

use dr_core::Result;
use image::RgbImage;

/// One invocation of the edit model, as seen from the worker.
#[derive(Debug)]
pub struct EditRequest<'a> {
    /// 1..=3 source images, already normalized to RGB8.
    pub images: &'a [RgbImage],
    pub prompt: &'a str,
    pub negative_prompt: &'a str,
    pub steps: u32,
    pub guidance_scale: f32,
    /// Absent means non-deterministic randomness.
    pub seed: Option<u64>,
}

/// A memory-resident edit model.
///
/// `invoke` calls `on_step` synchronously once per internal iteration with
/// a zero-based index. The callback must return promptly; it only hands the
/// index to the caller's progress sink.
pub trait EditModel: Send {
    fn invoke(
        &mut self,
        request: &EditRequest<'_>,
        on_step: &mut dyn FnMut(usize),
    ) -> Result<RgbImage>;
}

/// Factory for the (slow, resource-intensive) model acquisition.
///
/// Implementations are expected to take seconds to minutes in `load`;
/// releasing the model is dropping the returned box.
pub trait ModelLoader: Send + Sync + 'static {
    fn load(&self) -> Result<Box<dyn EditModel>>;

    /// Model identifier reported by the health endpoint.
    fn name(&self) -> &str;
}
