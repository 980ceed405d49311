//! Synchronous buffer backend. Every stage produces a fresh `RgbaImage`;
//! pixels within a stage are processed in parallel with rayon.

mod effects;
mod tone;

use std::sync::Arc;

use image::RgbaImage;

use crate::backend::Backend;
use crate::cache::SourceCache;
use crate::error::PipelineResult;
use crate::stages::Stage;

pub use effects::{apply_curves, apply_grain, apply_hsl, apply_split_tone, apply_vignette, blend};
pub use tone::{apply_basic_tone, apply_sharpen};

#[derive(Debug, Clone)]
pub struct CpuImage(pub Arc<RgbaImage>);

impl CpuImage {
    fn new(image: RgbaImage) -> Self {
        Self(Arc::new(image))
    }
}

impl PartialEq for CpuImage {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

pub fn run_stage(stage: &Stage, input: &RgbaImage) -> RgbaImage {
    match stage {
        Stage::BasicTone(params) => apply_basic_tone(input, params),
        Stage::Curves(luts) => apply_curves(input, luts),
        Stage::Selective(bands) => apply_hsl(input, bands),
        Stage::SplitTone(params) => apply_split_tone(input, params),
        Stage::Sharpen(pass) => apply_sharpen(input, pass),
        Stage::Grain(params) => apply_grain(input, params),
        Stage::Vignette(params) => apply_vignette(input, params),
    }
}

#[derive(Debug, Default)]
pub struct CpuBackend {
    source: SourceCache<CpuImage>,
    pending: Vec<CpuImage>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for CpuBackend {
    type Handle = CpuImage;

    fn name(&self) -> &'static str {
        "cpu"
    }

    fn upload_source(&mut self, image: &RgbaImage, fingerprint: u64) -> PipelineResult<CpuImage> {
        if let Some(cached) = self.source.get(fingerprint) {
            return Ok(cached.clone());
        }
        let handle = CpuImage::new(image.clone());
        self.source.replace(fingerprint, handle.clone());
        Ok(handle)
    }

    fn run_stage(&mut self, stage: &Stage, input: &CpuImage) -> PipelineResult<CpuImage> {
        Ok(CpuImage::new(run_stage(stage, &input.0)))
    }

    fn blend(
        &mut self,
        original: &CpuImage,
        processed: &CpuImage,
        strength: f32,
    ) -> PipelineResult<CpuImage> {
        Ok(CpuImage::new(blend(&original.0, &processed.0, strength)))
    }

    fn release(&mut self, handle: CpuImage) {
        self.pending.push(handle);
    }

    fn work_done(&mut self) -> PipelineResult<()> {
        Ok(())
    }

    fn reclaim(&mut self) -> usize {
        let freed = self.pending.len();
        self.pending.clear();
        freed
    }

    fn reclaim_all(&mut self) {
        self.pending.clear();
    }

    fn download(&mut self, handle: &CpuImage) -> PipelineResult<RgbaImage> {
        Ok(handle.0.as_ref().clone())
    }
}
