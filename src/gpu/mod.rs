//! Asynchronous wgpu compute backend.
//!
//! Every stage records its kernels into one command encoder and submits it
//! immediately. Intermediate textures live in a [`ResourceArena`] and are
//! destroyed only after a work-done callback has retired the submission that
//! last used them.

mod arena;
mod kernels;

use std::panic::catch_unwind;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use image::RgbaImage;
use once_cell::sync::OnceCell;
use pollster::block_on;
use tracing::{debug, info};
use wgpu::util::DeviceExt;

pub use arena::{Destroy, ResourceArena};

use self::kernels::{
    BandUniform, BlurUniform, DetailUniform, FinishUniform, GrainUniform, Kernel, Kernels,
    ScalarUniform, SplitToneUniform, ToneUniform, VignetteUniform, WORKGROUP_SIZE,
};
use crate::backend::Backend;
use crate::cache::SourceCache;
use crate::config::EngineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::noise::NoiseField;
use crate::stages::{DetailPass, Stage};

/// Byte stage outputs; every stage hands the next one an RGBA8 texture.
const BYTE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Unquantized intermediates inside the tone and sharpen stages.
const FLOAT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

struct GpuContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    kernels: Kernels,
    adapter_name: String,
    max_texture_dim: u32,
    max_storage_bytes: u64,
}

static GPU_CONTEXT: OnceCell<Result<Arc<GpuContext>, String>> = OnceCell::new();

fn init_gpu_context() -> Result<Arc<GpuContext>, String> {
    // Headless instance; use all backends to maximize compatibility.
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .ok_or_else(|| "No suitable GPU adapter found".to_string())?;

    // Full adapter limits so large sources fit on capable devices.
    let adapter_limits = adapter.limits();
    let (device, queue) = block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("lumen-gpu-device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter_limits,
        },
        None,
    ))
    .map_err(|e| format!("Failed to create GPU device: {e:?}"))?;

    let kernels = Kernels::new(&device);
    let limits = device.limits();
    let max_texture_dim = limits.max_texture_dimension_2d;
    let max_storage_bytes = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);

    Ok(Arc::new(GpuContext {
        device: Arc::new(device),
        queue: Arc::new(queue),
        kernels,
        adapter_name: adapter.get_info().name,
        max_texture_dim,
        max_storage_bytes,
    }))
}

fn gpu_context() -> Result<Arc<GpuContext>, String> {
    GPU_CONTEXT
        .get_or_init(|| {
            catch_unwind(init_gpu_context).unwrap_or_else(|_| {
                Err("GPU context init panicked; GPU path disabled for this session".to_string())
            })
        })
        .clone()
}

/// True when a device could be created (initialises the shared context).
pub fn available() -> bool {
    gpu_context().is_ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub name: String,
    pub backend: String,
    pub device_type: String,
}

/// Lists every adapter wgpu can see, without creating a device.
pub fn detect_adapters() -> Vec<AdapterInfo> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    instance
        .enumerate_adapters(wgpu::Backends::all())
        .into_iter()
        .map(|adapter: wgpu::Adapter| {
            let info = adapter.get_info();
            AdapterInfo {
                name: info.name,
                backend: format!("{:?}", info.backend),
                device_type: format!("{:?}", info.device_type),
            }
        })
        .collect()
}

/// Runs `f` inside out-of-memory and validation error scopes.
fn with_error_scope<T>(
    device: &wgpu::Device,
    f: impl FnOnce() -> PipelineResult<T>,
) -> PipelineResult<T> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let result = f();
    let validation = block_on(device.pop_error_scope());
    let oom = block_on(device.pop_error_scope());
    if let Some(e) = oom {
        return Err(PipelineError::BackendResourceExhaustion(e.to_string()));
    }
    if let Some(e) = validation {
        return Err(PipelineError::BackendInternal(e.to_string()));
    }
    result
}

fn padded_bytes_per_row(bytes_per_row: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    bytes_per_row.div_ceil(align) * align
}

/// Handle to a texture owned by the backend's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuImage {
    pub id: u64,
    pub width: u32,
    pub height: u32,
}

/// Textures a submission reads or creates.
#[derive(Default)]
struct ResourceLog {
    touched: Vec<u64>,
    temporaries: Vec<u64>,
    outputs: Vec<u64>,
}

pub struct GpuBackend {
    ctx: Arc<GpuContext>,
    arena: ResourceArena<wgpu::Texture>,
    source: SourceCache<GpuImage>,
    max_dim: u32,
    max_pixels: u64,
}

impl GpuBackend {
    pub fn new(config: &EngineConfig) -> PipelineResult<Self> {
        let ctx = gpu_context().map_err(PipelineError::BackendUnavailable)?;
        info!(adapter = %ctx.adapter_name, "GPU backend ready");
        Ok(Self {
            max_dim: ctx.max_texture_dim.min(config.max_texture_dimension),
            max_pixels: config.max_pixels,
            ctx,
            arena: ResourceArena::new(),
            source: SourceCache::new(),
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.ctx.adapter_name
    }

    /// Largest accepted width or height.
    pub fn max_dimension(&self) -> u32 {
        self.max_dim
    }

    /// Released textures still waiting for their epoch to retire.
    pub fn pending_destroy(&self) -> usize {
        self.arena.pending_len()
    }

    pub fn live_textures(&self) -> usize {
        self.arena.live_len()
    }

    fn check_limits(&self, width: u32, height: u32) -> PipelineResult<()> {
        if width > self.max_dim || height > self.max_dim {
            return Err(PipelineError::BackendResourceExhaustion(format!(
                "{width}x{height} exceeds the {} px texture limit",
                self.max_dim
            )));
        }
        let pixels = width as u64 * height as u64;
        if pixels > self.max_pixels {
            return Err(PipelineError::BackendResourceExhaustion(format!(
                "{pixels} pixels exceeds the {} pixel limit",
                self.max_pixels
            )));
        }
        Ok(())
    }

    fn view(&self, id: u64) -> PipelineResult<wgpu::TextureView> {
        self.arena
            .get(id)
            .map(|texture| texture.create_view(&wgpu::TextureViewDescriptor::default()))
            .ok_or_else(|| PipelineError::BackendInternal(format!("unknown texture handle {id}")))
    }

    fn alloc(
        &mut self,
        log: &mut ResourceLog,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        temporary: bool,
    ) -> u64 {
        let texture = self.ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(if temporary {
                "lumen-gpu-scratch"
            } else {
                "lumen-gpu-stage"
            }),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let id = self.arena.insert(texture);
        log.touched.push(id);
        if temporary {
            log.temporaries.push(id);
        } else {
            log.outputs.push(id);
        }
        id
    }

    /// Binds `inputs…, output, uniform?, storage?` in that order and
    /// dispatches one thread per pixel.
    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        log: &mut ResourceLog,
        kernel: &Kernel,
        inputs: &[u64],
        output: u64,
        uniform: Option<&[u8]>,
        storage: Option<&[u8]>,
        (width, height): (u32, u32),
    ) -> PipelineResult<()> {
        let device = &self.ctx.device;
        let mut views = Vec::with_capacity(inputs.len() + 1);
        for &id in inputs.iter().chain(std::iter::once(&output)) {
            views.push(self.view(id)?);
            log.touched.push(id);
        }

        let uniform_buffer = uniform.map(|contents| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("lumen-gpu-uniform"),
                contents,
                usage: wgpu::BufferUsages::UNIFORM,
            })
        });
        let storage_buffer = storage.map(|contents| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("lumen-gpu-storage"),
                contents,
                usage: wgpu::BufferUsages::STORAGE,
            })
        });

        let mut entries: Vec<wgpu::BindGroupEntry> = views
            .iter()
            .enumerate()
            .map(|(binding, view)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        for buffer in [&uniform_buffer, &storage_buffer].into_iter().flatten() {
            entries.push(wgpu::BindGroupEntry {
                binding: entries.len() as u32,
                resource: buffer.as_entire_binding(),
            });
        }

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel.label),
            layout: &kernel.layout,
            entries: &entries,
        });

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(kernel.label),
            timestamp_writes: None,
        });
        pass.set_pipeline(&kernel.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(
            width.div_ceil(WORKGROUP_SIZE),
            height.div_ceil(WORKGROUP_SIZE),
            1,
        );
        Ok(())
    }

    /// Records one neighbourhood pass on `src` and returns the float result.
    fn record_detail(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        log: &mut ResourceLog,
        src: u64,
        pass: &DetailPass,
        size: (u32, u32),
    ) -> PipelineResult<u64> {
        let ctx = Arc::clone(&self.ctx);
        let weights = pass.kernel();
        let weight_bytes: &[u8] = bytemuck::cast_slice(&weights);

        let horizontal = self.alloc(log, size.0, size.1, FLOAT_FORMAT, true);
        let blur_h = BlurUniform::new(pass, true);
        self.dispatch(
            encoder,
            log,
            &ctx.kernels.blur,
            &[src],
            horizontal,
            Some(bytemuck::bytes_of(&blur_h)),
            Some(weight_bytes),
            size,
        )?;

        let blurred = self.alloc(log, size.0, size.1, FLOAT_FORMAT, true);
        let blur_v = BlurUniform::new(pass, false);
        self.dispatch(
            encoder,
            log,
            &ctx.kernels.blur,
            &[horizontal],
            blurred,
            Some(bytemuck::bytes_of(&blur_v)),
            Some(weight_bytes),
            size,
        )?;

        let Some(detail) = DetailUniform::for_pass(pass) else {
            return Ok(blurred);
        };
        let combined = self.alloc(log, size.0, size.1, FLOAT_FORMAT, true);
        self.dispatch(
            encoder,
            log,
            &ctx.kernels.detail,
            &[src, blurred],
            combined,
            Some(bytemuck::bytes_of(&detail)),
            None,
            size,
        )?;
        Ok(combined)
    }

    fn record_finish(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        log: &mut ResourceLog,
        src: u64,
        dehaze: f32,
        size: (u32, u32),
    ) -> PipelineResult<u64> {
        let ctx = Arc::clone(&self.ctx);
        let out = self.alloc(log, size.0, size.1, BYTE_FORMAT, false);
        let uniform = FinishUniform::new(dehaze);
        self.dispatch(
            encoder,
            log,
            &ctx.kernels.finish,
            &[src],
            out,
            Some(bytemuck::bytes_of(&uniform)),
            None,
            size,
        )?;
        Ok(out)
    }

    fn record_stage(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        log: &mut ResourceLog,
        stage: &Stage,
        input: &GpuImage,
    ) -> PipelineResult<u64> {
        let ctx = Arc::clone(&self.ctx);
        let kernels = &ctx.kernels;
        let size = (input.width, input.height);

        match stage {
            Stage::BasicTone(params) => {
                let mut current = self.alloc(log, size.0, size.1, FLOAT_FORMAT, true);
                let uniform = ToneUniform::from(params);
                self.dispatch(
                    encoder,
                    log,
                    &kernels.tone,
                    &[input.id],
                    current,
                    Some(bytemuck::bytes_of(&uniform)),
                    None,
                    size,
                )?;
                for pass in params.detail_passes() {
                    current = self.record_detail(encoder, log, current, &pass, size)?;
                }
                self.record_finish(encoder, log, current, params.dehaze, size)
            }
            Stage::Sharpen(pass) => {
                let sharpened = self.record_detail(encoder, log, input.id, pass, size)?;
                self.record_finish(encoder, log, sharpened, 0.0, size)
            }
            Stage::Curves(luts) => {
                let out = self.alloc(log, size.0, size.1, BYTE_FORMAT, false);
                let packed = luts.packed();
                self.dispatch(
                    encoder,
                    log,
                    &kernels.curves,
                    &[input.id],
                    out,
                    None,
                    Some(bytemuck::cast_slice(&packed)),
                    size,
                )?;
                Ok(out)
            }
            Stage::Selective(bands) => {
                let out = self.alloc(log, size.0, size.1, BYTE_FORMAT, false);
                let packed: Vec<BandUniform> = bands.iter().map(BandUniform::from).collect();
                self.dispatch(
                    encoder,
                    log,
                    &kernels.hsl,
                    &[input.id],
                    out,
                    None,
                    Some(bytemuck::cast_slice(&packed)),
                    size,
                )?;
                Ok(out)
            }
            Stage::SplitTone(params) => {
                let out = self.alloc(log, size.0, size.1, BYTE_FORMAT, false);
                let uniform = SplitToneUniform::from(params);
                self.dispatch(
                    encoder,
                    log,
                    &kernels.split_tone,
                    &[input.id],
                    out,
                    Some(bytemuck::bytes_of(&uniform)),
                    None,
                    size,
                )?;
                Ok(out)
            }
            Stage::Grain(params) => {
                let field = NoiseField::generate(params, size.0, size.1);
                let noise = field.packed();
                let noise_bytes = noise.len() as u64 * 4;
                if noise_bytes > ctx.max_storage_bytes {
                    return Err(PipelineError::BackendResourceExhaustion(format!(
                        "{}x{} noise field exceeds the {} byte storage limit",
                        field.width, field.height, ctx.max_storage_bytes
                    )));
                }
                let out = self.alloc(log, size.0, size.1, BYTE_FORMAT, false);
                let uniform = GrainUniform::new(params.opacity(), &field);
                self.dispatch(
                    encoder,
                    log,
                    &kernels.grain,
                    &[input.id],
                    out,
                    Some(bytemuck::bytes_of(&uniform)),
                    Some(bytemuck::cast_slice(&noise)),
                    size,
                )?;
                Ok(out)
            }
            Stage::Vignette(params) => {
                let out = self.alloc(log, size.0, size.1, BYTE_FORMAT, false);
                let uniform = VignetteUniform::from(params);
                self.dispatch(
                    encoder,
                    log,
                    &kernels.vignette,
                    &[input.id],
                    out,
                    Some(bytemuck::bytes_of(&uniform)),
                    None,
                    size,
                )?;
                Ok(out)
            }
        }
    }

    /// Records with `record`, submits, and stamps every touched texture with
    /// the new epoch. Scratch textures go straight to pending destroy; on
    /// failure the outputs follow them.
    fn submit_scoped<F>(&mut self, label: &str, record: F) -> PipelineResult<u64>
    where
        F: FnOnce(&mut Self, &mut wgpu::CommandEncoder, &mut ResourceLog) -> PipelineResult<u64>,
    {
        let device = Arc::clone(&self.ctx.device);
        let queue = Arc::clone(&self.ctx.queue);
        let mut log = ResourceLog::default();

        let recorded = with_error_scope(&device, || {
            let mut encoder =
                device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
            let out = record(self, &mut encoder, &mut log)?;
            queue.submit(Some(encoder.finish()));
            Ok(out)
        });

        let epoch = self.arena.begin_submission();
        for &id in &log.touched {
            self.arena.stamp(id, epoch);
        }
        for id in log.temporaries {
            self.arena.release(id);
        }
        if recorded.is_err() {
            for id in log.outputs {
                self.arena.release(id);
            }
        }
        recorded
    }
}

impl Backend for GpuBackend {
    type Handle = GpuImage;

    fn name(&self) -> &'static str {
        "gpu"
    }

    fn upload_source(&mut self, image: &RgbaImage, fingerprint: u64) -> PipelineResult<GpuImage> {
        if let Some(cached) = self.source.get(fingerprint) {
            debug!(fingerprint, "source texture cache hit");
            return Ok(*cached);
        }
        let (width, height) = image.dimensions();
        self.check_limits(width, height)?;

        let device = Arc::clone(&self.ctx.device);
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = with_error_scope(&device, || {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("lumen-gpu-src"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: BYTE_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_DST
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            });
            self.ctx.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                image.as_raw(),
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * width),
                    rows_per_image: Some(height),
                },
                size,
            );
            Ok(texture)
        })?;

        let handle = GpuImage {
            id: self.arena.insert(texture),
            width,
            height,
        };
        if let Some(evicted) = self.source.replace(fingerprint, handle) {
            debug!(id = evicted.id, "evicting previous source texture");
            self.arena.release(evicted.id);
        }
        Ok(handle)
    }

    fn run_stage(&mut self, stage: &Stage, input: &GpuImage) -> PipelineResult<GpuImage> {
        let id = self.submit_scoped(stage.name(), |backend, encoder, log| {
            backend.record_stage(encoder, log, stage, input)
        })?;
        Ok(GpuImage {
            id,
            width: input.width,
            height: input.height,
        })
    }

    fn blend(
        &mut self,
        original: &GpuImage,
        processed: &GpuImage,
        strength: f32,
    ) -> PipelineResult<GpuImage> {
        let size = (original.width, original.height);
        let id = self.submit_scoped("strength-blend", |backend, encoder, log| {
            let ctx = Arc::clone(&backend.ctx);
            let out = backend.alloc(log, size.0, size.1, BYTE_FORMAT, false);
            let uniform = ScalarUniform::new(strength);
            backend.dispatch(
                encoder,
                log,
                &ctx.kernels.blend,
                &[original.id, processed.id],
                out,
                Some(bytemuck::bytes_of(&uniform)),
                None,
                size,
            )?;
            Ok(out)
        })?;
        Ok(GpuImage {
            id,
            width: original.width,
            height: original.height,
        })
    }

    fn release(&mut self, handle: GpuImage) {
        self.arena.release(handle.id);
    }

    fn work_done(&mut self) -> PipelineResult<()> {
        let epoch = self.arena.submitted_epoch();
        let retired = self.arena.retire_marker();
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel::<()>();
        self.ctx.queue.on_submitted_work_done(move || {
            retired.fetch_max(epoch, Ordering::AcqRel);
            let _ = tx.send(());
        });
        self.ctx.device.poll(wgpu::Maintain::Wait);
        block_on(rx.receive()).ok_or_else(|| {
            PipelineError::BackendInternal("work-done callback was dropped".to_string())
        })
    }

    fn reclaim(&mut self) -> usize {
        self.arena.reclaim()
    }

    fn reclaim_all(&mut self) {
        if let Err(e) = self.work_done() {
            debug!(error = %e, "work-done wait failed during cleanup");
        }
        let freed = self.arena.reclaim_all();
        debug!(freed, "released all pending textures");
    }

    fn download(&mut self, handle: &GpuImage) -> PipelineResult<RgbaImage> {
        let (width, height) = (handle.width, handle.height);
        let bytes_per_row = 4 * width;
        let padded = padded_bytes_per_row(bytes_per_row);
        let device = Arc::clone(&self.ctx.device);
        let queue = Arc::clone(&self.ctx.queue);

        let output_buffer = with_error_scope(&device, || {
            let texture = self.arena.get(handle.id).ok_or_else(|| {
                PipelineError::BackendInternal(format!("unknown texture handle {}", handle.id))
            })?;
            let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("lumen-gpu-readback"),
                size: padded as u64 * height as u64,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lumen-gpu-readback"),
            });
            encoder.copy_texture_to_buffer(
                wgpu::ImageCopyTexture {
                    texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::ImageCopyBuffer {
                    buffer: &output_buffer,
                    layout: wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(padded),
                        rows_per_image: Some(height),
                    },
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
            queue.submit(Some(encoder.finish()));
            Ok(output_buffer)
        })?;
        let epoch = self.arena.begin_submission();
        self.arena.stamp(handle.id, epoch);

        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel::<
            Result<(), wgpu::BufferAsyncError>,
        >();
        buffer_slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        device.poll(wgpu::Maintain::Wait);
        match block_on(rx.receive()) {
            Some(Ok(())) => {}
            Some(Err(e)) => return Err(PipelineError::BackendInternal(format!("readback failed: {e}"))),
            None => {
                return Err(PipelineError::BackendInternal(
                    "readback callback was dropped".to_string(),
                ))
            }
        }
        // The queue is in order: the mapped copy completing retires everything before it.
        self.arena.mark_retired(epoch);

        let data = buffer_slice.get_mapped_range();
        let mut out = RgbaImage::new(width, height);
        let row_len = bytes_per_row as usize;
        for y in 0..height as usize {
            let src_start = y * padded as usize;
            let dst_start = y * row_len;
            out.as_mut()[dst_start..dst_start + row_len]
                .copy_from_slice(&data[src_start..src_start + row_len]);
        }
        drop(data);
        output_buffer.unmap();
        Ok(out)
    }
}
