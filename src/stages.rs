//! Stage planning: turns a validated profile into the ordered list of stages
//! that actually change pixels, with every parameter resolved to the form the
//! kernels consume. Both backends execute the same `Stage` values.

use crate::color::tint_color;
use crate::lut::CurveLuts;
use crate::models::{Adjustments, ColorBand, Grain, ProfileConfig, Sharpening, SplitToning, Vignette};

/// Below this distance from neutral an adjustment counts as untouched.
pub const NEUTRAL_EPSILON: f32 = 1e-3;

const MAX_BLUR_RADIUS: u32 = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    BasicTone(ToneParams),
    Curves(CurveLuts),
    Selective(Vec<BandShift>),
    SplitTone(SplitToneParams),
    Sharpen(DetailPass),
    Grain(GrainParams),
    Vignette(VignetteParams),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::BasicTone(_) => "basic-tone",
            Stage::Curves(_) => "curves",
            Stage::Selective(_) => "hsl",
            Stage::SplitTone(_) => "split-toning",
            Stage::Sharpen(_) => "sharpen",
            Stage::Grain(_) => "grain",
            Stage::Vignette(_) => "vignette",
        }
    }
}

/// Ordered subset of stages with an effect. `grain_seed` feeds the noise field.
pub fn plan(profile: &ProfileConfig, grain_seed: u64) -> Vec<Stage> {
    let mut stages = Vec::new();

    let tone = ToneParams::from_adjustments(&profile.adjustments);
    if tone.needs_processing() {
        stages.push(Stage::BasicTone(tone));
    }

    if let Some(curves) = &profile.curves {
        let luts = CurveLuts::from_curves(curves);
        if !luts.is_empty() {
            stages.push(Stage::Curves(luts));
        }
    }

    if !profile.hsl.is_empty() {
        stages.push(Stage::Selective(
            profile.hsl.iter().map(BandShift::from).collect(),
        ));
    }

    if let Some(split) = &profile.split_toning {
        let params = SplitToneParams::from(split);
        if params.has_effect() {
            stages.push(Stage::SplitTone(params));
        }
    }

    if let Some(pass) = profile.sharpening.as_ref().and_then(DetailPass::sharpen) {
        stages.push(Stage::Sharpen(pass));
    }

    if let Some(grain) = &profile.grain {
        if grain.amount > 0.0 {
            stages.push(Stage::Grain(GrainParams::new(grain, grain_seed)));
        }
    }

    if let Some(vignette) = &profile.vignette {
        if vignette.amount != 0.0 {
            stages.push(Stage::Vignette(VignetteParams::from(vignette)));
        }
    }

    stages
}

/// Fused tone/colour parameter block, neutral values filled in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneParams {
    pub exposure: f32,
    pub temperature: f32,
    pub tint: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub vibrance: f32,
    pub shadows: f32,
    pub highlights: f32,
    pub whites: f32,
    pub blacks: f32,
    pub clarity: f32,
    pub texture: f32,
    pub dehaze: f32,
}

impl ToneParams {
    pub const NEUTRAL: ToneParams = ToneParams {
        exposure: 0.0,
        temperature: 0.0,
        tint: 0.0,
        contrast: 1.0,
        saturation: 1.0,
        vibrance: 0.0,
        shadows: 0.0,
        highlights: 0.0,
        whites: 0.0,
        blacks: 0.0,
        clarity: 0.0,
        texture: 0.0,
        dehaze: 0.0,
    };

    pub fn from_adjustments(adj: &Adjustments) -> Self {
        let n = Self::NEUTRAL;
        Self {
            exposure: adj.exposure.unwrap_or(n.exposure),
            temperature: adj.temperature.unwrap_or(n.temperature),
            tint: adj.tint.unwrap_or(n.tint),
            contrast: adj.contrast.unwrap_or(n.contrast),
            saturation: adj.saturation.unwrap_or(n.saturation),
            vibrance: adj.vibrance.unwrap_or(n.vibrance),
            shadows: adj.shadows.unwrap_or(n.shadows),
            highlights: adj.highlights.unwrap_or(n.highlights),
            whites: adj.whites.unwrap_or(n.whites),
            blacks: adj.blacks.unwrap_or(n.blacks),
            clarity: adj.clarity.unwrap_or(n.clarity),
            texture: adj.texture.unwrap_or(n.texture),
            dehaze: adj.dehaze.unwrap_or(n.dehaze),
        }
    }

    fn as_array(&self) -> [f32; 13] {
        [
            self.exposure,
            self.temperature,
            self.tint,
            self.contrast,
            self.saturation,
            self.vibrance,
            self.shadows,
            self.highlights,
            self.whites,
            self.blacks,
            self.clarity,
            self.texture,
            self.dehaze,
        ]
    }

    /// False when every field sits within `NEUTRAL_EPSILON` of neutral; the
    /// stage is then skipped and no buffer is allocated for it.
    pub fn needs_processing(&self) -> bool {
        self.as_array()
            .iter()
            .zip(Self::NEUTRAL.as_array())
            .any(|(v, n)| (v - n).abs() > NEUTRAL_EPSILON)
    }

    /// Clarity then texture, each one neighbourhood pass.
    pub fn detail_passes(&self) -> Vec<DetailPass> {
        let mut passes = Vec::new();
        if self.clarity.abs() > NEUTRAL_EPSILON {
            let k = self.clarity.abs() / 100.0;
            passes.push(if self.clarity > 0.0 {
                DetailPass::unsharp(0.5 + k, k, 1.0 + 0.2 * k, -10.0 * k / 255.0)
            } else {
                DetailPass::blur(2.0 * k)
            });
        }
        if self.texture.abs() > NEUTRAL_EPSILON {
            let k = self.texture.abs() / 100.0;
            passes.push(if self.texture > 0.0 {
                DetailPass::unsharp(0.3 + 0.3 * k, k, 1.0, 0.0)
            } else {
                DetailPass::blur(0.5 * k)
            });
        }
        passes
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetailMode {
    /// `(c + amount·(c − blur(c)))·gain + offset`
    Unsharp { amount: f32, gain: f32, offset: f32 },
    Blur,
}

/// One Gaussian-based neighbourhood operation on RGB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetailPass {
    pub sigma: f32,
    pub mode: DetailMode,
}

impl DetailPass {
    pub fn unsharp(sigma: f32, amount: f32, gain: f32, offset: f32) -> Self {
        Self {
            sigma: sigma.max(NEUTRAL_EPSILON),
            mode: DetailMode::Unsharp {
                amount,
                gain,
                offset,
            },
        }
    }

    pub fn blur(sigma: f32) -> Self {
        Self {
            sigma: sigma.max(NEUTRAL_EPSILON),
            mode: DetailMode::Blur,
        }
    }

    /// Output sharpening: `sigma = amount/150 · radius · 2`, floored at 0.5.
    pub fn sharpen(sharpening: &Sharpening) -> Option<Self> {
        let sigma = (sharpening.amount / 150.0) * (sharpening.radius * 2.0);
        (sigma > 0.0).then(|| Self::unsharp(sigma.max(0.5), 1.0, 1.0, 0.0))
    }

    pub fn radius(&self) -> u32 {
        ((self.sigma * 3.0).ceil() as u32).clamp(1, MAX_BLUR_RADIUS)
    }

    /// Normalized 1-D Gaussian weights, `2·radius + 1` taps.
    pub fn kernel(&self) -> Vec<f32> {
        let radius = self.radius() as i32;
        let two_sigma_sq = 2.0 * self.sigma * self.sigma;
        let mut weights: Vec<f32> = (-radius..=radius)
            .map(|i| (-((i * i) as f32) / two_sigma_sq).exp())
            .collect();
        let sum: f32 = weights.iter().sum();
        weights.iter_mut().for_each(|w| *w /= sum);
        weights
    }
}

/// One selective-colour rule, absent fields resolved to no-ops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandShift {
    pub band: ColorBand,
    pub hue_shift: f32,
    pub sat_factor: f32,
    pub lum_delta: f32,
}

impl From<&crate::models::HslAdjustment> for BandShift {
    fn from(adj: &crate::models::HslAdjustment) -> Self {
        Self {
            band: adj.color_band,
            hue_shift: adj.hue_shift.unwrap_or(0.0),
            sat_factor: 1.0 + adj.sat_scale.unwrap_or(0.0) / 100.0,
            lum_delta: adj.lum_offset.unwrap_or(0.0) / 100.0 * 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitToneParams {
    /// Byte-scale tint colours.
    pub shadow_color: [f32; 3],
    pub highlight_color: [f32; 3],
    /// `sat/100 · 0.3`, multiplied by the per-pixel blend factor.
    pub shadow_strength: f32,
    pub highlight_strength: f32,
    /// Luma split point on `[0, 1]`.
    pub threshold: f32,
}

impl SplitToneParams {
    pub fn has_effect(&self) -> bool {
        self.shadow_strength.abs() > 0.0 || self.highlight_strength.abs() > 0.0
    }
}

impl From<&SplitToning> for SplitToneParams {
    fn from(st: &SplitToning) -> Self {
        let balance = (st.balance / 100.0).clamp(-1.0, 1.0);
        Self {
            shadow_color: tint_color(st.shadow_hue, st.shadow_sat),
            highlight_color: tint_color(st.highlight_hue, st.highlight_sat),
            shadow_strength: st.shadow_sat / 100.0 * 0.3,
            highlight_strength: st.highlight_sat / 100.0 * 0.3,
            threshold: 0.5 + balance * 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainParams {
    pub amount: f32,
    pub size: f32,
    pub roughness: f32,
    pub seed: u64,
}

impl GrainParams {
    pub fn new(grain: &Grain, seed: u64) -> Self {
        Self {
            amount: grain.amount,
            size: grain.size,
            roughness: grain.roughness,
            seed,
        }
    }

    pub fn opacity(&self) -> f32 {
        (self.amount / 100.0) * 0.3
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VignetteParams {
    pub amount: f32,
    /// Percent of the half-extent where the mask reaches full alpha.
    pub radius_pct: f32,
    /// Percent where the mask starts rising from zero.
    pub feather_start: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    /// RGB multiplier applied after a darkening vignette, 1.0 when unused.
    pub highlight_boost: f32,
}

impl From<&Vignette> for VignetteParams {
    fn from(v: &Vignette) -> Self {
        let radius_pct = 50.0 + v.midpoint / 2.0;
        Self {
            amount: v.amount,
            radius_pct,
            feather_start: (radius_pct - v.feather / 2.0).max(0.0),
            scale_x: if v.roundness < 0.0 {
                1.0 + v.roundness.abs() / 100.0
            } else {
                1.0
            },
            scale_y: if v.roundness > 0.0 {
                1.0 + v.roundness / 100.0
            } else {
                1.0
            },
            highlight_boost: if v.highlights != 0.0 && v.amount < 0.0 {
                1.0 + v.highlights / 100.0 * 0.2
            } else {
                1.0
            },
        }
    }
}

impl VignetteParams {
    /// Gradient position `t ∈ [0, 1]` of pixel `(x, y)`.
    pub fn ramp(&self, x: u32, y: u32, width: u32, height: u32) -> f32 {
        let u = (x as f32 + 0.5) / width as f32 - 0.5;
        let v = (y as f32 + 0.5) / height as f32 - 0.5;
        let du = u / (0.5 * self.scale_x);
        let dv = v / (0.5 * self.scale_y);
        let pct = 100.0 * (du * du + dv * dv).sqrt();
        let span = self.radius_pct - self.feather_start;
        if span <= 0.0 {
            if pct >= self.radius_pct {
                1.0
            } else {
                0.0
            }
        } else {
            ((pct - self.feather_start) / span).clamp(0.0, 1.0)
        }
    }

    /// Mask alpha and normalized mask grey at gradient position `t`.
    pub fn mask(&self, t: f32) -> (f32, f32) {
        let alpha = self.amount.abs() / 100.0 * t;
        let target = if self.amount < 0.0 { 0.0 } else { 1.0 };
        let mid = 128.0 / 255.0;
        (alpha, mid + (target - mid) * t)
    }
}
