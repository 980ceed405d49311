use bytemuck::{Pod, Zeroable};

use crate::models::ColorBand;
use crate::noise::NoiseField;
use crate::stages::{BandShift, DetailMode, DetailPass, SplitToneParams, ToneParams, VignetteParams};

pub(super) const WORKGROUP_SIZE: u32 = 16;

macro_rules! kernel_source {
    ($file:literal) => {
        concat!(
            include_str!("../shaders/common.wgsl"),
            "\n",
            include_str!(concat!("../shaders/", $file))
        )
    };
}

/// One compute pipeline plus the bind group layout derived from its shader.
pub(super) struct Kernel {
    pub label: &'static str,
    pub pipeline: wgpu::ComputePipeline,
    pub layout: wgpu::BindGroupLayout,
}

impl Kernel {
    fn new(device: &wgpu::Device, label: &'static str, source: &'static str) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: None,
            module: &module,
            entry_point: "main",
        });
        let layout = pipeline.get_bind_group_layout(0);
        Self {
            label,
            pipeline,
            layout,
        }
    }
}

pub(super) struct Kernels {
    pub tone: Kernel,
    pub blur: Kernel,
    pub detail: Kernel,
    pub finish: Kernel,
    pub curves: Kernel,
    pub hsl: Kernel,
    pub split_tone: Kernel,
    pub grain: Kernel,
    pub vignette: Kernel,
    pub blend: Kernel,
}

impl Kernels {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            tone: Kernel::new(device, "lumen-gpu-tone", kernel_source!("tone.wgsl")),
            blur: Kernel::new(device, "lumen-gpu-blur", kernel_source!("blur.wgsl")),
            detail: Kernel::new(device, "lumen-gpu-detail", kernel_source!("detail.wgsl")),
            finish: Kernel::new(device, "lumen-gpu-finish", kernel_source!("finish.wgsl")),
            curves: Kernel::new(device, "lumen-gpu-curves", kernel_source!("curves.wgsl")),
            hsl: Kernel::new(device, "lumen-gpu-hsl", kernel_source!("hsl.wgsl")),
            split_tone: Kernel::new(device, "lumen-gpu-split-tone", kernel_source!("split_tone.wgsl")),
            grain: Kernel::new(device, "lumen-gpu-grain", kernel_source!("grain.wgsl")),
            vignette: Kernel::new(device, "lumen-gpu-vignette", kernel_source!("vignette.wgsl")),
            blend: Kernel::new(device, "lumen-gpu-blend", kernel_source!("blend.wgsl")),
        }
    }
}

// Uniform blocks below mirror the WGSL structs field for field; every block
// is padded to a multiple of 16 bytes.

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct ToneUniform {
    exposure: f32,
    temperature: f32,
    tint: f32,
    contrast: f32,
    saturation: f32,
    vibrance: f32,
    shadows: f32,
    highlights: f32,
    whites: f32,
    blacks: f32,
    _pad: [f32; 2],
}

impl From<&ToneParams> for ToneUniform {
    fn from(p: &ToneParams) -> Self {
        Self {
            exposure: p.exposure,
            temperature: p.temperature,
            tint: p.tint,
            contrast: p.contrast,
            saturation: p.saturation,
            vibrance: p.vibrance,
            shadows: p.shadows,
            highlights: p.highlights,
            whites: p.whites,
            blacks: p.blacks,
            _pad: [0.0; 2],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct BlurUniform {
    radius: i32,
    horizontal: u32,
    _pad: [u32; 2],
}

impl BlurUniform {
    pub fn new(pass: &DetailPass, horizontal: bool) -> Self {
        Self {
            radius: pass.radius() as i32,
            horizontal: horizontal as u32,
            _pad: [0; 2],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct DetailUniform {
    amount: f32,
    gain: f32,
    offset: f32,
    _pad: f32,
}

impl DetailUniform {
    /// `None` for a plain blur, which needs no combine kernel.
    pub fn for_pass(pass: &DetailPass) -> Option<Self> {
        match pass.mode {
            DetailMode::Blur => None,
            DetailMode::Unsharp {
                amount,
                gain,
                offset,
            } => Some(Self {
                amount,
                gain,
                offset,
                _pad: 0.0,
            }),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct FinishUniform {
    dehaze: f32,
    _pad: [f32; 3],
}

impl FinishUniform {
    pub fn new(dehaze: f32) -> Self {
        Self {
            dehaze,
            _pad: [0.0; 3],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct BandUniform {
    lo: f32,
    hi: f32,
    wraps: u32,
    _pad0: u32,
    hue_shift: f32,
    sat_factor: f32,
    lum_delta: f32,
    _pad1: f32,
}

impl From<&BandShift> for BandUniform {
    fn from(shift: &BandShift) -> Self {
        let (lo, hi) = shift.band.hue_range();
        Self {
            lo,
            hi,
            wraps: (shift.band == ColorBand::Red) as u32,
            _pad0: 0,
            hue_shift: shift.hue_shift,
            sat_factor: shift.sat_factor,
            lum_delta: shift.lum_delta,
            _pad1: 0.0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct SplitToneUniform {
    shadow_color: [f32; 4],
    highlight_color: [f32; 4],
    shadow_strength: f32,
    highlight_strength: f32,
    threshold: f32,
    _pad: f32,
}

impl From<&SplitToneParams> for SplitToneUniform {
    fn from(p: &SplitToneParams) -> Self {
        let [sr, sg, sb] = p.shadow_color;
        let [hr, hg, hb] = p.highlight_color;
        Self {
            shadow_color: [sr, sg, sb, 0.0],
            highlight_color: [hr, hg, hb, 0.0],
            shadow_strength: p.shadow_strength,
            highlight_strength: p.highlight_strength,
            threshold: p.threshold,
            _pad: 0.0,
        }
    }
}

/// Single scalar plus padding; the blend kernel's strength.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct ScalarUniform {
    value: f32,
    _pad: [f32; 3],
}

impl ScalarUniform {
    pub fn new(value: f32) -> Self {
        Self {
            value,
            _pad: [0.0; 3],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct GrainUniform {
    opacity: f32,
    noise_width: u32,
    noise_height: u32,
    _pad: u32,
}

impl GrainUniform {
    pub fn new(opacity: f32, field: &NoiseField) -> Self {
        Self {
            opacity,
            noise_width: field.width,
            noise_height: field.height,
            _pad: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct VignetteUniform {
    amount: f32,
    radius_pct: f32,
    feather_start: f32,
    scale_x: f32,
    scale_y: f32,
    highlight_boost: f32,
    _pad: [f32; 2],
}

impl From<&VignetteParams> for VignetteUniform {
    fn from(p: &VignetteParams) -> Self {
        Self {
            amount: p.amount,
            radius_pct: p.radius_pct,
            feather_start: p.feather_start,
            scale_x: p.scale_x,
            scale_y: p.scale_y,
            highlight_boost: p.highlight_boost,
            _pad: [0.0; 2],
        }
    }
}
