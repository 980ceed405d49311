use image::RgbaImage;

use crate::error::PipelineResult;
use crate::stages::Stage;

/// Execution target for stages. The orchestrator owns the handle chain;
/// a backend only promises that a handle passed to `release` is not freed
/// before `work_done` has observed every submission that reads it.
pub trait Backend {
    /// Opaque reference to one backend-resident image. Equality is identity.
    type Handle: Clone + PartialEq;

    fn name(&self) -> &'static str;

    /// Makes `image` resident. A repeated fingerprint may return the cached
    /// handle without another upload. Source handles are owned by the backend
    /// and must not be passed to `release`.
    fn upload_source(&mut self, image: &RgbaImage, fingerprint: u64) -> PipelineResult<Self::Handle>;

    fn run_stage(&mut self, stage: &Stage, input: &Self::Handle) -> PipelineResult<Self::Handle>;

    /// `original·(1 − strength) + processed·strength` on all four channels.
    fn blend(
        &mut self,
        original: &Self::Handle,
        processed: &Self::Handle,
        strength: f32,
    ) -> PipelineResult<Self::Handle>;

    /// Marks an intermediate as no longer current. It is freed by a later
    /// `reclaim` once its last use has retired.
    fn release(&mut self, handle: Self::Handle);

    /// Blocks until all submitted work has completed.
    fn work_done(&mut self) -> PipelineResult<()>;

    /// Frees released resources whose last use has retired; returns how many.
    fn reclaim(&mut self) -> usize;

    /// Error path: waits for in-flight work where possible, then frees every
    /// released resource.
    fn reclaim_all(&mut self);

    fn download(&mut self, handle: &Self::Handle) -> PipelineResult<RgbaImage>;
}
