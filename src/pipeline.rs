use std::mem;
use std::time::Instant;

use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::cache::fingerprint;
use crate::config::{BackendKind, EngineConfig};
use crate::cpu::CpuBackend;
use crate::error::{PipelineError, PipelineResult};
use crate::gpu::GpuBackend;
use crate::models::ProfileConfig;
use crate::stages::{plan, Stage};

/// Result of one pipeline invocation.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub image: RgbaImage,
    pub source_width: u32,
    pub source_height: u32,
    /// Names of the stages that ran, in order.
    pub stages: Vec<&'static str>,
}

fn validate_strength(strength: f32) -> PipelineResult<()> {
    if strength.is_finite() && (0.0..=1.0).contains(&strength) {
        Ok(())
    } else {
        Err(PipelineError::InvalidStrength(strength))
    }
}

/// Drives one backend through the stage chain. Holds the backend (and with
/// it the source cache) across invocations.
pub struct Engine<B: Backend> {
    backend: B,
    config: EngineConfig,
}

impl<B: Backend> Engine<B> {
    pub fn new(backend: B, config: EngineConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn render(
        &mut self,
        source: &RgbaImage,
        profile: &ProfileConfig,
        strength: f32,
    ) -> PipelineResult<Rendered> {
        validate_strength(strength)?;
        profile.validate()?;

        let (width, height) = source.dimensions();
        if width == 0 || height == 0 {
            return Ok(Rendered {
                image: source.clone(),
                source_width: width,
                source_height: height,
                stages: Vec::new(),
            });
        }

        let key = fingerprint(source);
        let stages = plan(profile, self.config.grain_seed.unwrap_or(key));
        debug!(
            backend = self.backend.name(),
            stages = stages.len(),
            strength,
            "planned pipeline"
        );

        let src = self.backend.upload_source(source, key)?;
        let image = self.execute(&src, &stages, strength)?;

        Ok(Rendered {
            image,
            source_width: width,
            source_height: height,
            stages: stages.iter().map(Stage::name).collect(),
        })
    }

    fn execute(
        &mut self,
        src: &B::Handle,
        stages: &[Stage],
        strength: f32,
    ) -> PipelineResult<RgbaImage> {
        let mut current = src.clone();

        for stage in stages {
            let started = Instant::now();
            let next = match self.backend.run_stage(stage, &current) {
                Ok(next) => next,
                Err(e) => return Err(self.abort(src, current, e)),
            };
            debug!(
                stage = stage.name(),
                elapsed_us = started.elapsed().as_micros() as u64,
                "stage done"
            );
            let superseded = mem::replace(&mut current, next);
            self.retire(src, superseded);
        }

        if strength < 1.0 && !stages.is_empty() {
            let blended = match self.backend.blend(src, &current, strength) {
                Ok(blended) => blended,
                Err(e) => return Err(self.abort(src, current, e)),
            };
            let superseded = mem::replace(&mut current, blended);
            self.retire(src, superseded);
        }

        // One barrier for the whole chain.
        if let Err(e) = self.backend.work_done() {
            return Err(self.abort(src, current, e));
        }
        let freed = self.backend.reclaim();
        debug!(freed, "reclaimed intermediates");

        let image = match self.backend.download(&current) {
            Ok(image) => image,
            Err(e) => return Err(self.abort(src, current, e)),
        };
        self.retire(src, current);
        self.backend.reclaim();
        Ok(image)
    }

    /// Hands a superseded handle back to the backend. The source is pinned.
    fn retire(&mut self, src: &B::Handle, handle: B::Handle) {
        if handle != *src {
            self.backend.release(handle);
        }
    }

    fn abort(&mut self, src: &B::Handle, current: B::Handle, err: PipelineError) -> PipelineError {
        self.retire(src, current);
        self.backend.reclaim_all();
        err
    }
}

/// Engine with its backend chosen once from [`EngineConfig::backend`].
pub enum Renderer {
    Cpu(Engine<CpuBackend>),
    Gpu(Engine<GpuBackend>),
}

impl Renderer {
    pub fn new(config: EngineConfig) -> PipelineResult<Self> {
        let renderer = match config.backend {
            BackendKind::Cpu => Renderer::Cpu(Engine::new(CpuBackend::new(), config)),
            BackendKind::Gpu => {
                let backend = GpuBackend::new(&config)?;
                Renderer::Gpu(Engine::new(backend, config))
            }
            BackendKind::Auto => match GpuBackend::new(&config) {
                Ok(backend) => Renderer::Gpu(Engine::new(backend, config)),
                Err(e) => {
                    warn!(error = %e, "GPU backend unavailable, using CPU");
                    Renderer::Cpu(Engine::new(CpuBackend::new(), config))
                }
            },
        };
        info!(backend = renderer.backend_name(), "renderer ready");
        Ok(renderer)
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Renderer::Cpu(engine) => engine.backend().name(),
            Renderer::Gpu(engine) => engine.backend().name(),
        }
    }

    pub fn render(
        &mut self,
        source: &RgbaImage,
        profile: &ProfileConfig,
        strength: f32,
    ) -> PipelineResult<Rendered> {
        match self {
            Renderer::Cpu(engine) => engine.render(source, profile, strength),
            Renderer::Gpu(engine) => engine.render(source, profile, strength),
        }
    }

    pub fn process(
        &mut self,
        source: &RgbaImage,
        profile: &ProfileConfig,
        strength: f32,
    ) -> PipelineResult<RgbaImage> {
        self.render(source, profile, strength).map(|rendered| rendered.image)
    }
}

/// One-shot CPU run: `process(image, profile, strength)`.
pub fn process(
    source: &RgbaImage,
    profile: &ProfileConfig,
    strength: f32,
) -> PipelineResult<RgbaImage> {
    Engine::new(CpuBackend::new(), EngineConfig::default())
        .render(source, profile, strength)
        .map(|rendered| rendered.image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Grain;

    fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            image::Rgba([(x * 255 / w.max(1)) as u8, (y * 255 / h.max(1)) as u8, 90, 255])
        })
    }

    /// Counts calls so the orchestration order can be checked without pixels.
    #[derive(Default)]
    struct Recorder {
        next: u32,
        released: Vec<u32>,
        events: Vec<String>,
        fail_on: Option<&'static str>,
    }

    impl Backend for Recorder {
        type Handle = u32;

        fn name(&self) -> &'static str {
            "recorder"
        }

        fn upload_source(&mut self, _: &RgbaImage, _: u64) -> PipelineResult<u32> {
            self.events.push("upload".into());
            Ok(0)
        }

        fn run_stage(&mut self, stage: &Stage, _: &u32) -> PipelineResult<u32> {
            if self.fail_on == Some(stage.name()) {
                return Err(PipelineError::BackendInternal("boom".into()));
            }
            self.next += 1;
            self.events.push(stage.name().into());
            Ok(self.next)
        }

        fn blend(&mut self, _: &u32, _: &u32, _: f32) -> PipelineResult<u32> {
            self.next += 1;
            self.events.push("blend".into());
            Ok(self.next)
        }

        fn release(&mut self, handle: u32) {
            self.released.push(handle);
        }

        fn work_done(&mut self) -> PipelineResult<()> {
            self.events.push("work-done".into());
            Ok(())
        }

        fn reclaim(&mut self) -> usize {
            self.events.push("reclaim".into());
            0
        }

        fn reclaim_all(&mut self) {
            self.events.push("reclaim-all".into());
        }

        fn download(&mut self, _: &u32) -> PipelineResult<RgbaImage> {
            self.events.push("download".into());
            Ok(RgbaImage::new(1, 1))
        }
    }

    fn busy_profile() -> ProfileConfig {
        let mut profile = ProfileConfig::default();
        profile.adjustments.exposure = Some(0.2);
        profile.grain = Some(Grain::with_amount(10.0));
        profile
    }

    #[test]
    fn single_barrier_after_all_stages() {
        let mut engine = Engine::new(Recorder::default(), EngineConfig::default());
        engine.render(&gradient(4, 4), &busy_profile(), 0.5).unwrap();
        let events = &engine.backend().events;
        assert_eq!(
            events,
            &[
                "upload",
                "basic-tone",
                "grain",
                "blend",
                "work-done",
                "reclaim",
                "download",
                "reclaim"
            ]
        );
        // Source (0) is never released; every intermediate is.
        assert_eq!(engine.backend().released, vec![1, 2, 3]);
    }

    #[test]
    fn stage_failure_releases_and_reclaims_everything() {
        let backend = Recorder {
            fail_on: Some("grain"),
            ..Default::default()
        };
        let mut engine = Engine::new(backend, EngineConfig::default());
        let err = engine.render(&gradient(4, 4), &busy_profile(), 1.0).unwrap_err();
        assert!(matches!(err, PipelineError::BackendInternal(_)));
        assert_eq!(engine.backend().released, vec![1]);
        assert_eq!(engine.backend().events.last().map(String::as_str), Some("reclaim-all"));
    }

    #[test]
    fn invalid_input_fails_before_upload() {
        let mut engine = Engine::new(Recorder::default(), EngineConfig::default());
        let err = engine.render(&gradient(4, 4), &ProfileConfig::default(), 1.5).unwrap_err();
        assert_eq!(err, PipelineError::InvalidStrength(1.5));
        assert!(engine.backend().events.is_empty());
    }

    #[test]
    fn empty_image_short_circuits() {
        let mut engine = Engine::new(Recorder::default(), EngineConfig::default());
        let rendered = engine
            .render(&RgbaImage::new(0, 7), &busy_profile(), 1.0)
            .unwrap();
        assert_eq!((rendered.source_width, rendered.source_height), (0, 7));
        assert!(rendered.stages.is_empty());
        assert!(engine.backend().events.is_empty());
    }

    #[test]
    fn cpu_renderer_reports_stages() {
        let mut renderer = Renderer::new(EngineConfig::default().with_backend(BackendKind::Cpu)).unwrap();
        assert_eq!(renderer.backend_name(), "cpu");
        let rendered = renderer.render(&gradient(8, 8), &busy_profile(), 1.0).unwrap();
        assert_eq!(rendered.stages, vec!["basic-tone", "grain"]);
        assert_eq!(rendered.image.dimensions(), (8, 8));
    }
}
